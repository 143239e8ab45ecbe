//! Queued user actions.
//!
//! An action is a recorded intent to mutate remote state. Its payload is a
//! tagged union keyed by action type, serialized as
//! `{ "action_type": ..., "action_data": { ... } }` so the same shape is
//! used in the local log and in the remote queue mirror.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::Error;

/// Length of a row id in the remote queue mirror.
pub const MIRROR_ROW_ID_LEN: usize = 36;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_RANDOM_LEN: usize = 22;

/// Discriminant of an [`ActionPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Favorite,
    Unfavorite,
    Visit,
    MissionStart,
    MissionProgress,
    ProfileUpdate,
}

impl ActionType {
    pub const ALL: [ActionType; 6] = [
        ActionType::Favorite,
        ActionType::Unfavorite,
        ActionType::Visit,
        ActionType::MissionStart,
        ActionType::MissionProgress,
        ActionType::ProfileUpdate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Favorite => "favorite",
            ActionType::Unfavorite => "unfavorite",
            ActionType::Visit => "visit",
            ActionType::MissionStart => "mission_start",
            ActionType::MissionProgress => "mission_progress",
            ActionType::ProfileUpdate => "profile_update",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnknownActionType(s.to_string()))
    }
}

/// The mutation an action carries, one variant per action type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action_type", content = "action_data", rename_all = "snake_case")]
pub enum ActionPayload {
    Favorite {
        place_id: String,
    },
    Unfavorite {
        place_id: String,
    },
    Visit {
        place_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mission_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        visited_at: Option<DateTime<Utc>>,
    },
    MissionStart {
        mission_id: String,
    },
    MissionProgress {
        mission_id: String,
        progress: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        completed: Option<bool>,
    },
    /// Profile columns to overwrite, last write wins per field.
    ProfileUpdate(Map<String, Value>),
}

impl ActionPayload {
    pub fn action_type(&self) -> ActionType {
        match self {
            ActionPayload::Favorite { .. } => ActionType::Favorite,
            ActionPayload::Unfavorite { .. } => ActionType::Unfavorite,
            ActionPayload::Visit { .. } => ActionType::Visit,
            ActionPayload::MissionStart { .. } => ActionType::MissionStart,
            ActionPayload::MissionProgress { .. } => ActionType::MissionProgress,
            ActionPayload::ProfileUpdate(_) => ActionType::ProfileUpdate,
        }
    }

    /// The `action_data` half of the serialized payload.
    pub fn data(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut doc)) => doc.remove("action_data").unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Rebuild a payload from its stored type tag and data.
    ///
    /// Fails with `UnknownActionType` for tags this build does not know and
    /// `Serialization` when the data does not match the tag's shape.
    pub fn from_parts(action_type: &str, data: Value) -> Result<Self, Error> {
        action_type.parse::<ActionType>()?;
        serde_json::from_value(json!({ "action_type": action_type, "action_data": data })).map_err(Error::from)
    }
}

/// An action waiting to be replayed against the remote backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueuedAction {
    /// Client-generated, globally unique; the sole deduplication key.
    pub id: String,
    pub payload: ActionPayload,
    pub created_at: DateTime<Utc>,
}

impl QueuedAction {
    /// Record a new action now, with a fresh id.
    pub fn new(payload: ActionPayload) -> Self {
        let created_at = Utc::now();
        Self { id: generate_action_id(created_at), payload, created_at }
    }

    pub fn with_id(id: impl Into<String>, payload: ActionPayload, created_at: DateTime<Utc>) -> Self {
        Self { id: id.into(), payload, created_at }
    }

    pub fn action_type(&self) -> ActionType {
        self.payload.action_type()
    }
}

/// Generate an action id of the form `{unix_millis}_{random}`.
///
/// The random suffix is sized so the id has the mirror's row-id length.
pub fn generate_action_id(at: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_RANDOM_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{:013}_{suffix}", at.timestamp_millis())
}

/// Whether `id` has the shape of a remote queue mirror row id.
pub fn is_mirror_row_id(id: &str) -> bool {
    id.len() == MIRROR_ROW_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
