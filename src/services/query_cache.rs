//! Query cache invalidation
//!
//! The sync coordinator decides when cached aggregates are stale; how they are
//! refetched is up to whoever owns the cache.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::Clock;

/// Cached aggregate views refreshed by background sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryKey {
    MovementLastSets,
    PersonalRecords,
    UserProfile,
}

impl QueryKey {
    pub const ALL: [QueryKey; 3] = [
        QueryKey::MovementLastSets,
        QueryKey::PersonalRecords,
        QueryKey::UserProfile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MovementLastSets => "movement-last-sets",
            Self::PersonalRecords => "personal-records",
            Self::UserProfile => "user-profile",
        }
    }
}

pub trait QueryInvalidator: Send + Sync {
    fn invalidate(&self, key: QueryKey);
}

/// Generation counter for one query key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invalidation {
    pub generation: u64,
    pub last_invalidated: Option<DateTime<Utc>>,
}

/// In-process invalidator that bumps a generation per key
///
/// Consumers compare generations to decide whether to refetch.
pub struct InvalidationLog {
    entries: Mutex<BTreeMap<QueryKey, Invalidation>>,
    clock: Arc<dyn Clock>,
}

impl InvalidationLog {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            clock,
        }
    }

    pub fn generation(&self, key: QueryKey) -> u64 {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(&key).map(|e| e.generation))
            .unwrap_or(0)
    }

    /// Snapshot keyed by the query's string name
    pub fn snapshot(&self) -> BTreeMap<String, Invalidation> {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .iter()
                    .map(|(key, entry)| (key.as_str().to_string(), entry.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl QueryInvalidator for InvalidationLog {
    fn invalidate(&self, key: QueryKey) {
        let now = self.clock.now();
        if let Ok(mut entries) = self.entries.lock() {
            let entry = entries.entry(key).or_default();
            entry.generation += 1;
            entry.last_invalidated = Some(now);
            debug!("Invalidated {} (generation {})", key.as_str(), entry.generation);
        }
    }
}
