//! Storage seams for readings and model snapshots.
//!
//! The engine talks to storage through narrow traits so the core stays free
//! of persistence concerns. The in-memory implementations here are the
//! default backing; histories come back ascending by timestamp with one
//! entry per `(user_id, timestamp)` key.

use crate::core::trainer::ModelSnapshot;
use crate::types::GlucoseReading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Result of an idempotent upsert.
///
/// `Duplicate` is a successful no-op. `Corrected` is a deliberate overwrite
/// of an existing key with a different value; it is reported explicitly so
/// conflicting re-syncs are never silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Duplicate,
    Corrected,
}

/// Append-only reading storage keyed by `(user_id, timestamp)`.
pub trait ReadingStore: Send + Sync {
    /// Idempotent upsert; see [`UpsertOutcome`] for the conflict policy.
    fn append_or_update(&self, reading: GlucoseReading) -> UpsertOutcome;

    /// Full history for one user, ascending by timestamp.
    fn history_for(&self, user_id: i64) -> Vec<GlucoseReading>;

    /// History restricted to readings strictly before `before`.
    fn history_before(&self, user_id: i64, before: DateTime<Utc>) -> Vec<GlucoseReading>;

    /// Every user's history, ascending per user, in stable user order.
    fn all_histories(&self) -> BTreeMap<i64, Vec<GlucoseReading>>;

    /// Total stored readings across all users.
    fn total_readings(&self) -> usize;
}

/// In-memory reading store backed by nested ordered maps.
///
/// Reads clone a consistent per-user snapshot under the read lock, so a
/// feature computation never observes a half-applied batch.
#[derive(Debug, Default)]
pub struct InMemoryReadingStore {
    users: RwLock<BTreeMap<i64, BTreeMap<DateTime<Utc>, GlucoseReading>>>,
}

impl InMemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReadingStore for InMemoryReadingStore {
    fn append_or_update(&self, reading: GlucoseReading) -> UpsertOutcome {
        let mut users = self.users.write().expect("reading store lock poisoned");
        let history = users.entry(reading.user_id).or_default();

        match history.get(&reading.timestamp) {
            Some(existing) if existing.same_value(&reading) => UpsertOutcome::Duplicate,
            Some(_) => {
                history.insert(reading.timestamp, reading);
                UpsertOutcome::Corrected
            }
            None => {
                history.insert(reading.timestamp, reading);
                UpsertOutcome::Inserted
            }
        }
    }

    fn history_for(&self, user_id: i64) -> Vec<GlucoseReading> {
        let users = self.users.read().expect("reading store lock poisoned");
        users
            .get(&user_id)
            .map(|history| history.values().cloned().collect())
            .unwrap_or_default()
    }

    fn history_before(&self, user_id: i64, before: DateTime<Utc>) -> Vec<GlucoseReading> {
        let users = self.users.read().expect("reading store lock poisoned");
        users
            .get(&user_id)
            .map(|history| {
                history
                    .range(..before)
                    .map(|(_, reading)| reading.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn all_histories(&self) -> BTreeMap<i64, Vec<GlucoseReading>> {
        let users = self.users.read().expect("reading store lock poisoned");
        users
            .iter()
            .map(|(&user_id, history)| (user_id, history.values().cloned().collect()))
            .collect()
    }

    fn total_readings(&self) -> usize {
        let users = self.users.read().expect("reading store lock poisoned");
        users.values().map(|history| history.len()).sum()
    }
}

/// Storage for the current model snapshot.
pub trait ModelStore: Send + Sync {
    /// The currently published snapshot, if any.
    fn load_current(&self) -> Option<Arc<ModelSnapshot>>;

    /// Publish a complete snapshot as current. Single atomic slot swap:
    /// readers see the old snapshot in full or the new one in full.
    fn publish(&self, snapshot: ModelSnapshot) -> Arc<ModelSnapshot>;
}

/// In-memory single-slot model store.
#[derive(Debug, Default)]
pub struct InMemoryModelStore {
    current: RwLock<Option<Arc<ModelSnapshot>>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for InMemoryModelStore {
    fn load_current(&self) -> Option<Arc<ModelSnapshot>> {
        self.current
            .read()
            .expect("model store lock poisoned")
            .clone()
    }

    fn publish(&self, snapshot: ModelSnapshot) -> Arc<ModelSnapshot> {
        let snapshot = Arc::new(snapshot);
        let mut current = self.current.write().expect("model store lock poisoned");
        *current = Some(snapshot.clone());
        snapshot
    }
}
