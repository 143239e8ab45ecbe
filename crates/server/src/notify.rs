//! Relays sync pass events to the MCP client as logging notifications.
//!
//! Passes started by connectivity changes or at startup have no tool call
//! to report through, so their completion and failure reach the host here.

use rmcp::model::{LoggingLevel, LoggingMessageNotificationParam};
use rmcp::{Peer, RoleServer};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use roamsync_client::SyncEvent;

const LOGGER: &str = "roamsync.sync";

/// Notification for a pass event, or None for events the host is not told about.
pub fn sync_notification(event: &SyncEvent) -> Option<LoggingMessageNotificationParam> {
    let level = match event {
        SyncEvent::Started => return None,
        SyncEvent::Completed(_) => LoggingLevel::Info,
        SyncEvent::Failed { .. } => LoggingLevel::Error,
    };
    let data = serde_json::to_value(event).ok()?;
    Some(LoggingMessageNotificationParam { level, logger: Some(LOGGER.into()), data })
}

/// Forward events from `events` to `peer` until the engine's channel closes.
pub fn spawn_event_relay(mut events: broadcast::Receiver<SyncEvent>, peer: Peer<RoleServer>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "sync event relay lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let Some(notification) = sync_notification(&event) else { continue };
            if let Err(err) = peer.notify_logging_message(notification).await {
                tracing::debug!(error = %err, "failed to notify client of sync event");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use roamsync_client::SyncReport;

    #[test]
    fn test_started_is_not_relayed() {
        assert!(sync_notification(&SyncEvent::Started).is_none());
    }

    #[test]
    fn test_completed_pass_is_info() {
        let report = SyncReport { replayed: 2, failed: 1, ..Default::default() };
        let notification = sync_notification(&SyncEvent::Completed(report)).unwrap();

        assert_eq!(notification.level, LoggingLevel::Info);
        assert_eq!(notification.logger.as_deref(), Some("roamsync.sync"));
        assert_eq!(notification.data["event"], "completed");
        assert_eq!(notification.data["replayed"], 2);
    }

    #[test]
    fn test_failed_pass_is_error() {
        let event = SyncEvent::Failed { reason: "reading queue mirror: timeout".into() };
        let notification = sync_notification(&event).unwrap();

        assert_eq!(notification.level, LoggingLevel::Error);
        assert_eq!(notification.data["reason"], "reading queue mirror: timeout");
    }
}
