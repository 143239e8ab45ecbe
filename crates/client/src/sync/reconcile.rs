//! One reconciliation pass.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

use roamsync_core::action::is_mirror_row_id;
use roamsync_core::{Error, FailedActionPolicy, LoggedAction, QueuedAction};

use super::{SyncEngine, SyncReport};
use crate::dispatcher::decode_action;
use crate::mirror::MirrorRow;

/// Where a merged action was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// An entry of the deduplicated replay list.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedAction {
    pub id: String,
    pub action_type: String,
    pub action_data: Value,
    pub created_at: DateTime<Utc>,
    pub origin: Origin,
    /// The remote mirror holds an unsynced row with this id.
    pub in_mirror: bool,
}

/// Concatenate local then remote entries, keeping the first occurrence of each id.
pub fn merge_queues(local: Vec<LoggedAction>, remote: Vec<MirrorRow>) -> Vec<MergedAction> {
    let mirrored: HashSet<String> = remote.iter().map(|row| row.id.clone()).collect();
    let mut seen = HashSet::new();

    let local = local.into_iter().map(|a| MergedAction {
        in_mirror: mirrored.contains(&a.id),
        id: a.id,
        action_type: a.action_type,
        action_data: a.action_data,
        created_at: a.created_at,
        origin: Origin::Local,
    });
    let remote = remote.into_iter().map(|row| MergedAction {
        id: row.id,
        action_type: row.action_type,
        action_data: row.action_data,
        created_at: row.created_at,
        origin: Origin::Remote,
        in_mirror: true,
    });

    local.chain(remote).filter(|entry| seen.insert(entry.id.clone())).collect()
}

enum Replay {
    Done,
    Dropped,
    Failed(String),
}

/// A failed replay that still counts against its attempt budget.
struct Failure {
    id: String,
    reason: String,
    /// The mirror row to retire once the action is dead-lettered.
    mirror_row: bool,
    /// Remote-only action to take into the local log so its attempts are counted.
    adopt: Option<QueuedAction>,
}

impl SyncEngine {
    /// Run steps 1 through 6 of a pass. The caller holds the reentrancy guard.
    pub(super) async fn run_pass(&self) -> Result<SyncReport, Error> {
        let local = self
            .db
            .pending_actions()
            .await
            .map_err(|e| Error::SyncPassFailed(format!("reading local log: {e}")))?;
        let dead: HashSet<String> = self
            .db
            .dead_letters()
            .await
            .map_err(|e| Error::SyncPassFailed(format!("reading dead letters: {e}")))?
            .into_iter()
            .map(|a| a.id)
            .collect();

        let remote = match self.mirror.pending().await {
            Ok(rows) => rows,
            Err(err) if err.is_relation_missing() => {
                tracing::debug!("queue mirror unavailable, merging local log only");
                Vec::new()
            }
            Err(err) => return Err(Error::SyncPassFailed(format!("reading queue mirror: {err}"))),
        };

        let mut to_mark = Vec::new();
        let (buried, remote): (Vec<MirrorRow>, Vec<MirrorRow>) =
            remote.into_iter().partition(|row| dead.contains(&row.id));
        for row in buried {
            tracing::debug!(id = %row.id, "mirror row already dead-lettered, retiring it");
            if is_mirror_row_id(&row.id) {
                to_mark.push(row.id);
            }
        }

        let merged = merge_queues(local, remote);
        tracing::info!(actions = merged.len(), "replaying merged queue");

        let discard_failed = self.options.failed_actions == FailedActionPolicy::Discard;
        let mut report = SyncReport::default();
        let mut settled = Vec::new();
        let mut failed = Vec::new();

        for entry in &merged {
            if entry.origin == Origin::Remote {
                report.remote_merged += 1;
            }
            let mirror_row = entry.in_mirror && is_mirror_row_id(&entry.id);

            let (replay, action) =
                match decode_action(&entry.id, &entry.action_type, &entry.action_data, entry.created_at) {
                    None => {
                        report.dropped += 1;
                        (Replay::Dropped, None)
                    }
                    Some(action) => match self.dispatcher.dispatch(&action).await {
                        Ok(()) => {
                            report.replayed += 1;
                            (Replay::Done, None)
                        }
                        Err(err) => {
                            report.failed += 1;
                            let failure = Error::ActionReplayFailed { id: entry.id.clone(), reason: err.to_string() };
                            tracing::warn!(error = %failure, "action replay failed, continuing pass");
                            (Replay::Failed(err.to_string()), Some(action))
                        }
                    },
                };

            match replay {
                Replay::Failed(reason) if !discard_failed => {
                    let adopt = if entry.origin == Origin::Remote { action } else { None };
                    failed.push(Failure { id: entry.id.clone(), reason, mirror_row, adopt });
                }
                _ => {
                    if mirror_row {
                        to_mark.push(entry.id.clone());
                    }
                    if entry.origin == Origin::Local {
                        settled.push(entry.id.clone());
                    }
                }
            }
        }

        self.mark_mirror_synced(&to_mark, &mut report).await;

        self.settle(&settled, failed, &mut report)
            .await
            .map_err(|e| Error::SyncPassFailed(format!("settling local log: {e}")))?;

        Ok(report)
    }

    /// Step 5. Failures are logged; the row is retried on a later pass.
    async fn mark_mirror_synced(&self, ids: &[String], report: &mut SyncReport) {
        let synced_at = Utc::now();
        for id in ids {
            match self.mirror.mark_synced(id, synced_at).await {
                Ok(()) => report.marked_synced += 1,
                Err(err) => tracing::warn!(id, error = %err, "failed to mark queue mirror row synced"),
            }
        }
    }

    /// Step 6: remove settled ids and count failures against the rest.
    ///
    /// A dead-lettered action also retires its mirror row, so the mirror
    /// cannot bring it back on a later pass.
    async fn settle(&self, settled: &[String], failed: Vec<Failure>, report: &mut SyncReport) -> Result<(), Error> {
        let removed = self.db.remove_actions(settled).await?;
        tracing::debug!(removed, "removed settled actions from local log");

        let mut retired = Vec::new();
        for failure in failed {
            if let Some(action) = &failure.adopt
                && self.db.append_action(action).await?
            {
                tracing::debug!(id = %failure.id, "remote-only action taken into local log");
            }
            let Some(attempts) = self.db.record_action_failure(&failure.id, &failure.reason).await? else {
                continue;
            };
            if attempts >= self.options.max_replay_attempts && self.db.dead_letter_action(&failure.id).await? {
                report.dead_lettered += 1;
                tracing::warn!(id = %failure.id, attempts, reason = %failure.reason, "action moved to dead letters");
                if failure.mirror_row {
                    retired.push(failure.id);
                }
            }
        }

        self.mark_mirror_synced(&retired, report).await;
        Ok(())
    }
}
