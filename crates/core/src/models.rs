//! Domain records mirrored locally for offline reads.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::store::{StoreName, StoreRecord};

/// A mission from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub place_ids: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A place that can be visited or favorited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: String,
    pub name: String,
    pub city: String,
    pub category: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A user's progress through a mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub id: String,
    pub mission_id: String,
    pub user_id: String,
    pub progress: u32,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StoreRecord for Mission {
    const STORE: StoreName = StoreName::Missions;

    fn id(&self) -> &str {
        &self.id
    }
}

impl StoreRecord for Place {
    const STORE: StoreName = StoreName::Places;

    fn id(&self) -> &str {
        &self.id
    }
}

impl StoreRecord for UserProgress {
    const STORE: StoreName = StoreName::UserProgress;

    fn id(&self) -> &str {
        &self.id
    }
}
