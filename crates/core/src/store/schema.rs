//! Named object stores and their secondary indexes.

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A named record store in the local schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreName {
    Missions,
    Places,
    UserProgress,
}

impl StoreName {
    pub const ALL: [StoreName; 3] = [StoreName::Missions, StoreName::Places, StoreName::UserProgress];

    pub fn as_str(self) -> &'static str {
        match self {
            StoreName::Missions => "missions",
            StoreName::Places => "places",
            StoreName::UserProgress => "userProgress",
        }
    }

    /// Index names declared for this store. Each index projects the record
    /// field of the same name.
    pub fn indexes(self) -> &'static [&'static str] {
        match self {
            StoreName::Missions => &["city", "country", "updatedAt"],
            StoreName::Places => &["city", "category"],
            StoreName::UserProgress => &["missionId", "userId"],
        }
    }

    /// Resolve an index name, failing if the store does not declare it.
    pub fn index(self, name: &str) -> Result<&'static str, Error> {
        self.indexes()
            .iter()
            .copied()
            .find(|index| *index == name)
            .ok_or_else(|| Error::UnknownIndex { store: self.as_str().to_string(), index: name.to_string() })
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StoreName::ALL
            .into_iter()
            .find(|store| store.as_str() == s)
            .ok_or_else(|| Error::UnknownStore(s.to_string()))
    }
}
