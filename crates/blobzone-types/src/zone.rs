use std::fmt;

use serde::{Deserialize, Serialize};

use crate::content_id::ContentId;
use crate::staging::StagingKey;

/// One of the three namespaces inside a storage container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    /// Uploaded content whose identifier has not been accepted yet.
    Staging,
    /// Committed content, keyed by identifier.
    Store,
    /// Content withdrawn from the store pending review.
    Quarantine,
}

impl Zone {
    /// Path prefix for objects in this zone.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Staging => "tmp",
            Self::Store => "blocks",
            Self::Quarantine => "quarantine",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Staging => write!(f, "staging"),
            Self::Store => write!(f, "store"),
            Self::Quarantine => write!(f, "quarantine"),
        }
    }
}

/// Location of an object inside the container.
///
/// Always derived from the key or identifier it addresses; never stored.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ZonePath {
    zone: Zone,
    path: String,
}

impl ZonePath {
    /// `tmp/{key}`
    pub fn staging(key: &StagingKey) -> Self {
        Self::new(Zone::Staging, key.as_str())
    }

    /// `blocks/{id}`
    pub fn stored(id: &ContentId) -> Self {
        Self::new(Zone::Store, &id.to_string())
    }

    /// `quarantine/{id}`
    pub fn quarantined(id: &ContentId) -> Self {
        Self::new(Zone::Quarantine, &id.to_string())
    }

    fn new(zone: Zone, name: &str) -> Self {
        Self {
            zone,
            path: format!("{}/{}", zone.prefix(), name),
        }
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for ZonePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl AsRef<str> for ZonePath {
    fn as_ref(&self) -> &str {
        &self.path
    }
}
