//! Tombstone reconciliation: fold two deletion logs into one map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use recon_types::{normalize, DeletionEntry, Identity, Timestamp};

use crate::error::MergeResult;

/// The most recent recorded deletion of one record.
///
/// `Untimed` is a deletion whose stored time was null or blank. It orders
/// below every timed deletion, so any timed entry for the same record
/// replaces it during reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tombstone {
    Untimed,
    At(Timestamp),
}

impl Tombstone {
    fn from_time(at: Option<Timestamp>) -> Self {
        at.map_or(Self::Untimed, Self::At)
    }

    /// The deletion time, if one was recorded.
    pub fn deleted_at(&self) -> Option<Timestamp> {
        match self {
            Self::Untimed => None,
            Self::At(t) => Some(*t),
        }
    }
}

/// Latest deletion per (table, identity), built once per merge.
///
/// There is no public way to add entries after construction: the map is
/// read-only input to every table merge.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TombstoneMap {
    by_table: BTreeMap<String, BTreeMap<Identity, Tombstone>>,
}

impl TombstoneMap {
    /// An empty map (no deletions recorded).
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile the deletion logs of both sources.
    pub fn reconcile(primary: &[DeletionEntry], secondary: &[DeletionEntry]) -> MergeResult<Self> {
        Self::from_entries(primary.iter().chain(secondary))
    }

    /// Fold any sequence of deletion entries.
    ///
    /// Each entry's time is normalized (a malformed time aborts). For each
    /// (table, identity) pair the latest time is kept; equal times leave the
    /// map unchanged. The result does not depend on entry order.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a DeletionEntry>) -> MergeResult<Self> {
        let mut map = Self::new();
        let mut seen = 0usize;
        for entry in entries {
            let tombstone = Tombstone::from_time(normalize(&entry.deleted_at)?);
            map.record(entry.table.clone(), entry.identity.identity(), tombstone);
            seen += 1;
        }
        debug!(entries = seen, tombstones = map.len(), "reconciled deletion logs");
        Ok(map)
    }

    fn record(&mut self, table: String, identity: Identity, tombstone: Tombstone) {
        self.by_table
            .entry(table)
            .or_default()
            .entry(identity)
            .and_modify(|existing| {
                if tombstone > *existing {
                    *existing = tombstone;
                }
            })
            .or_insert(tombstone);
    }

    /// Latest deletion of `identity` in `table`, if any.
    pub fn get(&self, table: &str, identity: &Identity) -> Option<Tombstone> {
        self.by_table.get(table)?.get(identity).copied()
    }

    /// Total number of tombstoned records across all tables.
    pub fn len(&self) -> usize {
        self.by_table.values().map(BTreeMap::len).sum()
    }

    /// Returns `true` if no deletions were recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tombstoned records in one table.
    pub fn count_for(&self, table: &str) -> usize {
        self.by_table.get(table).map_or(0, BTreeMap::len)
    }

    /// Every tombstone, ordered by table then identity.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Identity, Tombstone)> + '_ {
        self.by_table.iter().flat_map(|(table, ids)| {
            ids.iter()
                .map(move |(identity, tombstone)| (table.as_str(), identity, *tombstone))
        })
    }
}
