//! Row-level merge of one table present in both sources.
//!
//! The merge is an explicit two-phase fold over a map keyed by identity:
//!
//! 1. [`TableMerger::seed_from_primary`] admits every primary row that is
//!    not outranked by a tombstone.
//! 2. [`TableMerger::reduce_with_secondary`] folds each secondary row into
//!    the seeded map, applying tombstone precedence and newer-wins.
//!
//! When the primary schema has no modification-time column the table is
//! copied whole from the primary source instead.

use std::collections::BTreeMap;

use tracing::debug;

use recon_types::{normalize, Identity, Row, TableSchema, Timestamp};

use crate::config::{AbsentTimestampPolicy, MergeConfig};
use crate::error::{MergeError, MergeResult};
use crate::report::{TableMergeKind, TableOutcome};
use crate::tombstone::{Tombstone, TombstoneMap};

/// Which source a surviving row came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Primary,
    Secondary,
}

/// The row currently occupying an identity during the fold.
#[derive(Clone, Debug, PartialEq)]
pub struct Slot {
    pub row: Row,
    pub side: Side,
    /// Normalized modification time of `row` (`None` when absent).
    pub modified: Option<Timestamp>,
}

/// Working state of the fold: identity → surviving row.
pub type RowsById = BTreeMap<Identity, Slot>;

/// One table as read from a store.
#[derive(Clone, Debug, PartialEq)]
pub struct TableData {
    pub schema: TableSchema,
    pub rows: Vec<Row>,
}

impl TableData {
    pub fn new(schema: TableSchema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }
}

/// The merge result for one table, ready to be written.
#[derive(Clone, Debug, PartialEq)]
pub struct MergedTable {
    /// Destination schema (always the primary's column definitions).
    pub schema: TableSchema,
    pub rows: Vec<Row>,
    pub outcome: TableOutcome,
}

impl MergedTable {
    /// A verbatim copy of one source table.
    pub fn copied(data: TableData, kind: TableMergeKind) -> Self {
        let count = data.rows.len();
        let outcome = TableOutcome::new(&data.schema.name, kind, count, count, 0);
        Self {
            schema: data.schema,
            rows: data.rows,
            outcome,
        }
    }
}

/// Column positions shared by both phases.
#[derive(Clone, Copy, Debug)]
struct Layout<'s> {
    schema: &'s TableSchema,
    modified_idx: usize,
}

/// Merges one table at a time against a fixed tombstone map.
pub struct TableMerger<'a> {
    tombstones: &'a TombstoneMap,
    config: &'a MergeConfig,
}

impl<'a> TableMerger<'a> {
    pub fn new(tombstones: &'a TombstoneMap, config: &'a MergeConfig) -> Self {
        Self { tombstones, config }
    }

    /// Merge a table that exists in both sources.
    ///
    /// Fails with [`MergeError::SchemaMismatch`] if the primary table has no
    /// columns, or the secondary's column list differs from the primary's.
    pub fn merge(&self, primary: TableData, secondary: TableData) -> MergeResult<MergedTable> {
        let table = primary.schema.name.clone();
        check_rows(&primary)?;

        let Some(modified_idx) = primary
            .schema
            .column_index(&self.config.modification_column)
        else {
            debug!(
                table = %table,
                column = %self.config.modification_column,
                "no modification column; copying primary table"
            );
            return Ok(MergedTable::copied(primary, TableMergeKind::FallbackCopied));
        };

        if !primary.schema.same_columns(&secondary.schema) {
            return Err(MergeError::SchemaMismatch {
                table,
                reason: format!(
                    "primary columns [{}] differ from secondary columns [{}]",
                    primary.schema.column_names().collect::<Vec<_>>().join(", "),
                    secondary.schema.column_names().collect::<Vec<_>>().join(", "),
                ),
            });
        }
        check_rows(&secondary)?;

        let layout = Layout {
            schema: &primary.schema,
            modified_idx,
        };
        let primary_count = primary.rows.len();
        let secondary_count = secondary.rows.len();

        let seeded = self.seed_in(layout, primary.rows)?;
        let merged = self.reduce_in(layout, seeded, secondary.rows)?;

        let from_primary = merged.values().filter(|s| s.side == Side::Primary).count();
        let from_secondary = merged.len() - from_primary;
        let mut outcome = TableOutcome::new(
            &table,
            TableMergeKind::Merged,
            merged.len(),
            from_primary,
            from_secondary,
        );
        outcome.input_rows = primary_count + secondary_count;

        debug!(
            table = %table,
            rows = merged.len(),
            from_primary,
            from_secondary,
            "merged table"
        );

        Ok(MergedTable {
            rows: merged.into_values().map(|slot| slot.row).collect(),
            schema: primary.schema,
            outcome,
        })
    }

    /// Phase one: seed the fold with the primary's rows.
    ///
    /// A row is admitted unless a tombstone for its identity is strictly
    /// newer than the row's modification time. A later row with the same
    /// identity replaces an earlier one.
    pub fn seed_from_primary(&self, primary: &TableData) -> MergeResult<RowsById> {
        let layout = self.layout(&primary.schema)?;
        check_rows(primary)?;
        self.seed_in(layout, primary.rows.clone())
    }

    /// Phase two: fold the secondary's rows into the seeded map.
    ///
    /// For a tombstoned identity the secondary row enters only if it is
    /// strictly newer than the tombstone; otherwise an occupant older than
    /// the tombstone is evicted. For any other identity the newer row wins
    /// and ties keep the occupant.
    pub fn reduce_with_secondary(
        &self,
        schema: &TableSchema,
        seeded: RowsById,
        secondary: &TableData,
    ) -> MergeResult<RowsById> {
        let layout = self.layout(schema)?;
        check_rows(secondary)?;
        self.reduce_in(layout, seeded, secondary.rows.clone())
    }

    fn layout<'s>(&self, schema: &'s TableSchema) -> MergeResult<Layout<'s>> {
        let modified_idx = schema
            .column_index(&self.config.modification_column)
            .ok_or_else(|| MergeError::SchemaMismatch {
                table: schema.name.clone(),
                reason: format!("no {} column", self.config.modification_column),
            })?;
        Ok(Layout {
            schema,
            modified_idx,
        })
    }

    fn seed_in(&self, layout: Layout<'_>, rows: Vec<Row>) -> MergeResult<RowsById> {
        let mut out = RowsById::new();
        for row in rows {
            let slot = self.slot(layout, row, Side::Primary)?;
            let identity = slot.row[0].identity();
            let admitted = match self.tombstones.get(&layout.schema.name, &identity) {
                None => true,
                Some(tombstone) => !self.outranks(layout, &identity, tombstone, slot.modified)?,
            };
            if admitted {
                out.insert(identity, slot);
            }
        }
        Ok(out)
    }

    fn reduce_in(&self, layout: Layout<'_>, mut out: RowsById, rows: Vec<Row>) -> MergeResult<RowsById> {
        for row in rows {
            let slot = self.slot(layout, row, Side::Secondary)?;
            let identity = slot.row[0].identity();

            if let Some(tombstone) = self.tombstones.get(&layout.schema.name, &identity) {
                if self.survives(layout, &identity, tombstone, slot.modified)? {
                    self.offer(layout, &mut out, identity, slot)?;
                } else if let Some(occupant) = out.get(&identity) {
                    if self.outranks(layout, &identity, tombstone, occupant.modified)? {
                        out.remove(&identity);
                    }
                }
            } else {
                self.offer(layout, &mut out, identity, slot)?;
            }
        }
        Ok(out)
    }

    /// Insert `slot` if the identity is free, or if it is strictly newer than
    /// the occupant.
    fn offer(
        &self,
        layout: Layout<'_>,
        out: &mut RowsById,
        identity: Identity,
        slot: Slot,
    ) -> MergeResult<()> {
        match out.get(&identity) {
            None => {
                out.insert(identity, slot);
            }
            Some(occupant) => {
                let incoming = self.effective(layout, &identity, slot.modified)?;
                let current = self.effective(layout, &identity, occupant.modified)?;
                if incoming > current {
                    out.insert(identity, slot);
                }
            }
        }
        Ok(())
    }

    /// A tombstone outranks a row whose modification time is strictly older.
    /// An untimed tombstone outranks every row.
    fn outranks(
        &self,
        layout: Layout<'_>,
        identity: &Identity,
        tombstone: Tombstone,
        modified: Option<Timestamp>,
    ) -> MergeResult<bool> {
        match tombstone {
            Tombstone::Untimed => Ok(true),
            Tombstone::At(deleted) => Ok(self.effective(layout, identity, modified)? < deleted),
        }
    }

    /// A row survives a tombstone only if it is strictly newer than it.
    fn survives(
        &self,
        layout: Layout<'_>,
        identity: &Identity,
        tombstone: Tombstone,
        modified: Option<Timestamp>,
    ) -> MergeResult<bool> {
        match tombstone {
            Tombstone::Untimed => Ok(false),
            Tombstone::At(deleted) => Ok(self.effective(layout, identity, modified)? > deleted),
        }
    }

    /// Resolve an absent modification time according to the policy.
    fn effective(
        &self,
        layout: Layout<'_>,
        identity: &Identity,
        modified: Option<Timestamp>,
    ) -> MergeResult<Timestamp> {
        match (modified, self.config.absent_timestamp) {
            (Some(t), _) => Ok(t),
            (None, AbsentTimestampPolicy::TreatAsNewest) => Ok(Timestamp(i64::MAX)),
            (None, AbsentTimestampPolicy::TreatAsOldest) => Ok(Timestamp(i64::MIN)),
            (None, AbsentTimestampPolicy::Error) => Err(MergeError::MissingTimestamp {
                table: layout.schema.name.clone(),
                identity: identity.to_string(),
                column: self.config.modification_column.clone(),
            }),
        }
    }

    fn slot(&self, layout: Layout<'_>, row: Row, side: Side) -> MergeResult<Slot> {
        let modified = normalize(&row[layout.modified_idx])?;
        Ok(Slot {
            row,
            side,
            modified,
        })
    }
}

/// Every row must carry one value per column, and there must be at least
/// one column to serve as identity.
fn check_rows(data: &TableData) -> MergeResult<()> {
    let table = &data.schema.name;
    if data.schema.identity_column().is_none() {
        return Err(MergeError::SchemaMismatch {
            table: table.clone(),
            reason: "table has no identity column".to_string(),
        });
    }
    let arity = data.schema.arity();
    if let Some((index, row)) = data.rows.iter().enumerate().find(|(_, r)| r.len() != arity) {
        return Err(MergeError::SchemaMismatch {
            table: table.clone(),
            reason: format!("row {index} has {} values, expected {arity}", row.len()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_types::{Column, DeletionEntry, Value};

    fn items_schema() -> TableSchema {
        TableSchema::new(
            "items",
            vec![
                Column::new("id", "INTEGER"),
                Column::new("name", "TEXT"),
                Column::new("updatedAt", "INTEGER"),
            ],
        )
    }

    fn row(id: i64, name: &str, at: impl Into<Value>) -> Row {
        vec![Value::Integer(id), Value::from(name), at.into()]
    }

    fn items(rows: Vec<Row>) -> TableData {
        TableData::new(items_schema(), rows)
    }

    fn tombstones(entries: &[(i64, i64)]) -> TombstoneMap {
        let log: Vec<_> = entries
            .iter()
            .map(|(id, at)| DeletionEntry::new(*id, "items", *at))
            .collect();
        TombstoneMap::reconcile(&log, &[]).unwrap()
    }

    fn merge(a: Vec<Row>, b: Vec<Row>, tombs: &TombstoneMap, config: &MergeConfig) -> MergedTable {
        TableMerger::new(tombs, config).merge(items(a), items(b)).unwrap()
    }

    // -----------------------------------------------------------------------
    // Scenarios
    // -----------------------------------------------------------------------

    #[test]
    fn newer_secondary_row_wins_without_tombstones() {
        let config = MergeConfig::default();
        let tombs = TombstoneMap::new();
        let merged = merge(vec![row(1, "a", 50i64)], vec![row(1, "b", 80i64)], &tombs, &config);
        assert_eq!(merged.rows, vec![row(1, "b", 80i64)]);
        assert_eq!(merged.outcome.kind, TableMergeKind::Merged);
        assert_eq!(merged.outcome.from_secondary, 1);
    }

    #[test]
    fn tombstone_newer_than_both_versions_deletes_record() {
        let config = MergeConfig::default();
        let tombs = tombstones(&[(1, 90)]);
        let merged = merge(vec![row(1, "a", 50i64)], vec![row(1, "b", 80i64)], &tombs, &config);
        assert!(merged.rows.is_empty());
    }

    #[test]
    fn secondary_row_newer_than_tombstone_survives() {
        let config = MergeConfig::default();
        let tombs = tombstones(&[(1, 70)]);
        let merged = merge(vec![row(1, "a", 50i64)], vec![row(1, "b", 80i64)], &tombs, &config);
        assert_eq!(merged.rows, vec![row(1, "b", 80i64)]);
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    #[test]
    fn ties_favor_primary() {
        let config = MergeConfig::default();
        let tombs = TombstoneMap::new();
        let merged = merge(vec![row(1, "a", 60i64)], vec![row(1, "b", 60i64)], &tombs, &config);
        assert_eq!(merged.rows, vec![row(1, "a", 60i64)]);
    }

    #[test]
    fn newer_primary_row_is_kept() {
        let config = MergeConfig::default();
        let tombs = TombstoneMap::new();
        let merged = merge(vec![row(1, "a", 90i64)], vec![row(1, "b", 10i64)], &tombs, &config);
        assert_eq!(merged.rows, vec![row(1, "a", 90i64)]);
        assert_eq!(merged.outcome.from_primary, 1);
    }

    #[test]
    fn rows_from_either_side_are_unioned() {
        let config = MergeConfig::default();
        let tombs = TombstoneMap::new();
        let merged = merge(
            vec![row(1, "a", 1i64), row(3, "c", 1i64)],
            vec![row(2, "b", 1i64)],
            &tombs,
            &config,
        );
        let ids: Vec<_> = merged.rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(ids, vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
    }

    #[test]
    fn tombstone_outranks_stale_rows_on_either_side() {
        let config = MergeConfig::default();
        let tombs = tombstones(&[(1, 100), (2, 100)]);
        let merged = merge(
            vec![row(1, "a", 99i64)],
            vec![row(2, "b", 99i64)],
            &tombs,
            &config,
        );
        assert!(merged.rows.is_empty());
    }

    #[test]
    fn primary_row_equal_to_tombstone_survives_secondary_does_not() {
        let config = MergeConfig::default();
        let tombs = tombstones(&[(1, 100), (2, 100)]);
        let merged = merge(
            vec![row(1, "a", 100i64)],
            vec![row(2, "b", 100i64)],
            &tombs,
            &config,
        );
        assert_eq!(merged.rows, vec![row(1, "a", 100i64)]);
    }

    #[test]
    fn surviving_secondary_row_still_competes_with_occupant() {
        let config = MergeConfig::default();
        let tombs = tombstones(&[(1, 70)]);
        let merged = merge(vec![row(1, "a", 95i64)], vec![row(1, "b", 80i64)], &tombs, &config);
        assert_eq!(merged.rows, vec![row(1, "a", 95i64)]);
    }

    #[test]
    fn tombstones_for_other_tables_do_not_apply() {
        let config = MergeConfig::default();
        let log = vec![DeletionEntry::new(1i64, "orders", 1_000i64)];
        let tombs = TombstoneMap::reconcile(&log, &[]).unwrap();
        let merged = merge(vec![row(1, "a", 50i64)], vec![], &tombs, &config);
        assert_eq!(merged.rows.len(), 1);
    }

    #[test]
    fn text_and_numeric_times_compare_after_normalization() {
        let config = MergeConfig::default();
        let tombs = TombstoneMap::new();
        // 2024-01-01 00:00:00 UTC is 1_704_067_200_000 ms.
        let merged = merge(
            vec![row(1, "a", "2024-01-01 00:00:00")],
            vec![row(1, "b", 1_704_067_200_001i64)],
            &tombs,
            &config,
        );
        assert_eq!(merged.rows[0][1], Value::from("b"));
    }

    #[test]
    fn malformed_row_time_aborts() {
        let config = MergeConfig::default();
        let tombs = TombstoneMap::new();
        let err = TableMerger::new(&tombs, &config)
            .merge(items(vec![row(1, "a", "not a date")]), items(vec![]))
            .unwrap_err();
        assert!(matches!(err, MergeError::Type(_)));
    }

    // -----------------------------------------------------------------------
    // Fallback and schema checks
    // -----------------------------------------------------------------------

    #[test]
    fn table_without_modification_column_is_copied_from_primary() {
        let config = MergeConfig::default();
        let tombs = tombstones(&[(1, 1_000)]);
        let schema = TableSchema::new("tags", vec![Column::new("id", ""), Column::new("label", "")]);
        let a_rows = vec![
            vec![Value::Integer(1), Value::from("red")],
            vec![Value::Integer(2), Value::from("blue")],
        ];
        let b_rows = vec![vec![Value::Integer(3), Value::from("green")]];

        let merged = TableMerger::new(&tombs, &config)
            .merge(
                TableData::new(schema.clone(), a_rows.clone()),
                TableData::new(schema, b_rows),
            )
            .unwrap();
        assert_eq!(merged.rows, a_rows);
        assert_eq!(merged.outcome.kind, TableMergeKind::FallbackCopied);
    }

    #[test]
    fn fallback_ignores_secondary_schema() {
        let config = MergeConfig::default();
        let tombs = TombstoneMap::new();
        let a = TableData::new(
            TableSchema::new("tags", vec![Column::new("id", "")]),
            vec![vec![Value::Integer(1)]],
        );
        let b = TableData::new(
            TableSchema::new("tags", vec![Column::new("id", ""), Column::new("x", "")]),
            vec![],
        );
        let merged = TableMerger::new(&tombs, &config).merge(a, b).unwrap();
        assert_eq!(merged.rows.len(), 1);
    }

    #[test]
    fn table_without_columns_is_a_schema_mismatch() {
        let config = MergeConfig::default();
        let tombs = TombstoneMap::new();
        let empty = TableData::new(TableSchema::new("broken", vec![]), vec![]);
        let err = TableMerger::new(&tombs, &config)
            .merge(empty.clone(), empty)
            .unwrap_err();
        assert!(matches!(err, MergeError::SchemaMismatch { table, .. } if table == "broken"));
    }

    #[test]
    fn divergent_columns_are_a_schema_mismatch() {
        let config = MergeConfig::default();
        let tombs = TombstoneMap::new();
        let mut other = items_schema();
        other.columns.push(Column::new("extra", "TEXT"));
        let err = TableMerger::new(&tombs, &config)
            .merge(items(vec![]), TableData::new(other, vec![]))
            .unwrap_err();
        assert!(matches!(err, MergeError::SchemaMismatch { .. }));
    }

    #[test]
    fn short_row_is_a_schema_mismatch() {
        let config = MergeConfig::default();
        let tombs = TombstoneMap::new();
        let err = TableMerger::new(&tombs, &config)
            .merge(items(vec![vec![Value::Integer(1)]]), items(vec![]))
            .unwrap_err();
        assert!(matches!(err, MergeError::SchemaMismatch { .. }));
    }

    // -----------------------------------------------------------------------
    // Absent timestamps
    // -----------------------------------------------------------------------

    #[test]
    fn absent_time_treated_as_newest_by_default() {
        let config = MergeConfig::default();
        let tombs = tombstones(&[(2, 1_000)]);
        let merged = merge(
            vec![row(1, "a", 50i64), row(2, "a", Value::Null)],
            vec![row(1, "b", Value::Null)],
            &tombs,
            &config,
        );
        assert_eq!(merged.rows, vec![row(1, "b", Value::Null), row(2, "a", Value::Null)]);
    }

    #[test]
    fn two_absent_times_keep_the_primary() {
        let config = MergeConfig::default();
        let tombs = TombstoneMap::new();
        let merged = merge(
            vec![row(1, "a", Value::Null)],
            vec![row(1, "b", "")],
            &tombs,
            &config,
        );
        assert_eq!(merged.rows, vec![row(1, "a", Value::Null)]);
    }

    #[test]
    fn absent_time_treated_as_oldest() {
        let config = MergeConfig {
            absent_timestamp: AbsentTimestampPolicy::TreatAsOldest,
            ..MergeConfig::default()
        };
        let tombs = tombstones(&[(2, 1)]);
        let merged = merge(
            vec![row(1, "a", Value::Null), row(2, "a", Value::Null)],
            vec![row(1, "b", 5i64)],
            &tombs,
            &config,
        );
        assert_eq!(merged.rows, vec![row(1, "b", 5i64)]);
    }

    #[test]
    fn absent_time_errors_when_policy_demands() {
        let config = MergeConfig {
            absent_timestamp: AbsentTimestampPolicy::Error,
            ..MergeConfig::default()
        };
        let tombs = TombstoneMap::new();
        let err = TableMerger::new(&tombs, &config)
            .merge(items(vec![row(1, "a", 5i64)]), items(vec![row(1, "b", Value::Null)]))
            .unwrap_err();
        assert!(matches!(err, MergeError::MissingTimestamp { identity, .. } if identity == "1"));
    }

    #[test]
    fn absent_time_is_fine_when_nothing_is_compared() {
        let config = MergeConfig {
            absent_timestamp: AbsentTimestampPolicy::Error,
            ..MergeConfig::default()
        };
        let tombs = TombstoneMap::new();
        let merged = merge(vec![row(1, "a", Value::Null)], vec![row(2, "b", Value::Null)], &tombs, &config);
        assert_eq!(merged.rows.len(), 2);
    }

    #[test]
    fn untimed_tombstone_deletes_every_version() {
        let config = MergeConfig::default();
        let log = vec![DeletionEntry::new(1i64, "items", Value::Null)];
        let tombs = TombstoneMap::reconcile(&log, &[]).unwrap();
        let merged = merge(vec![row(1, "a", 50i64)], vec![row(1, "b", 80i64)], &tombs, &config);
        assert!(merged.rows.is_empty());
    }

    // -----------------------------------------------------------------------
    // Phases in isolation
    // -----------------------------------------------------------------------

    #[test]
    fn seed_phase_filters_only_by_tombstone() {
        let config = MergeConfig::default();
        let tombs = tombstones(&[(2, 100)]);
        let merger = TableMerger::new(&tombs, &config);
        let seeded = merger
            .seed_from_primary(&items(vec![row(1, "a", 1i64), row(2, "b", 99i64), row(3, "c", 100i64)]))
            .unwrap();
        let ids: Vec<_> = seeded.keys().cloned().collect();
        assert_eq!(ids, vec![Identity::Integer(1), Identity::Integer(3)]);
        assert!(seeded.values().all(|s| s.side == Side::Primary));
    }

    #[test]
    fn reduce_phase_evicts_occupant_older_than_tombstone() {
        let config = MergeConfig::default();
        let tombs = tombstones(&[(1, 100)]);
        let merger = TableMerger::new(&tombs, &config);

        // An occupant that never went through the seed filter.
        let mut seeded = RowsById::new();
        seeded.insert(
            Identity::Integer(1),
            Slot {
                row: row(1, "stale", 10i64),
                side: Side::Primary,
                modified: Some(Timestamp(10)),
            },
        );

        let reduced = merger
            .reduce_with_secondary(&items_schema(), seeded, &items(vec![row(1, "b", 50i64)]))
            .unwrap();
        assert!(reduced.is_empty());
    }

    #[test]
    fn reduce_phase_requires_modification_column() {
        let config = MergeConfig::default();
        let tombs = TombstoneMap::new();
        let schema = TableSchema::new("tags", vec![Column::new("id", "")]);
        let err = TableMerger::new(&tombs, &config)
            .reduce_with_secondary(&schema, RowsById::new(), &TableData::new(schema.clone(), vec![]))
            .unwrap_err();
        assert!(matches!(err, MergeError::SchemaMismatch { .. }));
    }
}
