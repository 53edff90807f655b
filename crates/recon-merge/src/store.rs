//! Whole-store merge: drive the table merger over every primary table.

use std::path::Path;

use tracing::{debug, info, warn};

use recon_store::{SqliteStore, Store, StoreError};
use recon_types::{DeletionEntry, Row, TableSchema, Value};

use crate::config::MergeConfig;
use crate::error::{MergeError, MergeResult};
use crate::report::{StoreMergeReport, TableMergeKind, TableOutcome};
use crate::table::{MergedTable, TableData, TableMerger};
use crate::tombstone::{Tombstone, TombstoneMap};

/// Merges a primary and a secondary store into a fresh output store.
///
/// The primary is canonical for table enumeration: every primary table
/// reaches the output, tables only the secondary has do not.
#[derive(Clone, Debug, Default)]
pub struct StoreMerger {
    config: MergeConfig,
}

impl StoreMerger {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merge `primary` and `secondary` into `output`.
    ///
    /// Every table is merged in memory first; then all destination tables
    /// are created, then each is filled with one bulk insert. A failure
    /// leaves `output` partially written.
    pub fn merge(
        &self,
        primary: &dyn Store,
        secondary: &dyn Store,
        output: &mut dyn Store,
    ) -> MergeResult<StoreMergeReport> {
        let tombstones = TombstoneMap::reconcile(
            &self.read_deletion_log(primary)?,
            &self.read_deletion_log(secondary)?,
        )?;
        let merger = TableMerger::new(&tombstones, &self.config);

        let primary_tables = primary.table_names()?;
        let mut merged = Vec::with_capacity(primary_tables.len());

        for name in &primary_tables {
            let data = TableData::new(primary.schema(name)?, primary.rows(name)?);

            let table = if self.config.merge_deletion_log && *name == self.config.deletion_log.table {
                deletion_log_union(data, &tombstones, &self.config)?
            } else if secondary.has_table(name)? {
                let other = TableData::new(secondary.schema(name)?, secondary.rows(name)?);
                merger.merge(data, other)?
            } else {
                debug!(table = %name, "table only in primary; copying");
                MergedTable::copied(data, TableMergeKind::Copied)
            };
            merged.push(table);
        }

        let ignored_tables: Vec<String> = secondary
            .table_names()?
            .into_iter()
            .filter(|name| !primary_tables.contains(name))
            .collect();
        for name in &ignored_tables {
            warn!(table = %name, "table only in secondary; not copied");
        }

        for table in &merged {
            output.create_table(&table.schema)?;
        }
        for table in &merged {
            output.insert_rows(&table.schema.name, &table.rows)?;
        }

        let report = StoreMergeReport {
            primary: primary.location().display().to_string(),
            secondary: secondary.location().display().to_string(),
            output: output.location().display().to_string(),
            tombstones: tombstones.len(),
            tables: merged.into_iter().map(|t| t.outcome).collect(),
            ignored_tables,
        };

        info!(
            primary = %report.primary,
            secondary = %report.secondary,
            output = %report.output,
            tables = report.tables.len(),
            rows = report.rows_written(),
            tombstones = report.tombstones,
            "store merge complete"
        );
        Ok(report)
    }

    fn read_deletion_log(&self, store: &dyn Store) -> MergeResult<Vec<DeletionEntry>> {
        match store.deletion_log(&self.config.deletion_log) {
            Ok(entries) => Ok(entries),
            Err(StoreError::MissingTable(table)) if !self.config.require_deletion_log => {
                debug!(
                    store = %store.location().display(),
                    table = %table,
                    "no deletion log; treating as empty"
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Merge two SQLite files into a new SQLite file at `output`.
///
/// Both sources are opened read-only; all handles are closed before
/// returning, on success and on error.
pub fn merge_store_files(
    primary: &Path,
    secondary: &Path,
    output: &Path,
    config: &MergeConfig,
) -> MergeResult<StoreMergeReport> {
    let a = SqliteStore::open_read_only(primary)?;
    let b = SqliteStore::open_read_only(secondary)?;
    let mut out = SqliteStore::create(output)?;

    let report = StoreMerger::new(config.clone()).merge(&a, &b, &mut out)?;
    out.close()?;
    Ok(report)
}

/// Render the reconciled tombstones as rows of the primary's deletion log.
///
/// Columns other than identity, table name and deletion time are null.
fn deletion_log_union(
    primary: TableData,
    tombstones: &TombstoneMap,
    config: &MergeConfig,
) -> MergeResult<MergedTable> {
    let log = &config.deletion_log;
    let schema: TableSchema = primary.schema;
    let locate = |column: &str| {
        schema
            .column_index(column)
            .ok_or_else(|| MergeError::SchemaMismatch {
                table: schema.name.clone(),
                reason: format!("deletion log has no {column} column"),
            })
    };
    let id_idx = locate(&log.identity_column)?;
    let table_idx = locate(&log.table_column)?;
    let at_idx = locate(&log.deleted_at_column)?;

    let rows: Vec<Row> = tombstones
        .iter()
        .map(|(table, identity, tombstone)| {
            let mut row = vec![Value::Null; schema.arity()];
            row[id_idx] = Value::from(identity);
            row[table_idx] = Value::from(table);
            row[at_idx] = match tombstone {
                Tombstone::At(t) => Value::Text(t.to_string()),
                Tombstone::Untimed => Value::Null,
            };
            row
        })
        .collect();

    let mut outcome = TableOutcome::new(
        &schema.name,
        TableMergeKind::DeletionLogUnion,
        rows.len(),
        0,
        0,
    );
    outcome.input_rows = primary.rows.len();

    Ok(MergedTable {
        schema,
        rows,
        outcome,
    })
}
