use serde::{Deserialize, Serialize};

/// How a table reached the output store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableMergeKind {
    /// Row-level merge of both sources.
    Merged,
    /// Present only in the primary; copied verbatim.
    Copied,
    /// Present in both, but without a modification column; primary copied.
    FallbackCopied,
    /// Deletion log rewritten from the reconciled tombstones.
    DeletionLogUnion,
}

/// Per-table summary of a store merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOutcome {
    pub table: String,
    pub kind: TableMergeKind,
    /// Rows read from both sources (only the primary for copies).
    pub input_rows: usize,
    /// Rows written to the output table.
    pub rows_written: usize,
    pub from_primary: usize,
    pub from_secondary: usize,
}

impl TableOutcome {
    pub fn new(
        table: &str,
        kind: TableMergeKind,
        rows_written: usize,
        from_primary: usize,
        from_secondary: usize,
    ) -> Self {
        Self {
            table: table.to_string(),
            kind,
            input_rows: rows_written,
            rows_written,
            from_primary,
            from_secondary,
        }
    }

    /// Input rows that did not make it into the output (superseded by a
    /// newer version or outranked by a tombstone).
    pub fn discarded(&self) -> usize {
        self.input_rows.saturating_sub(self.rows_written)
    }
}

/// Summary of one store merge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMergeReport {
    pub primary: String,
    pub secondary: String,
    pub output: String,
    /// Reconciled tombstone count.
    pub tombstones: usize,
    pub tables: Vec<TableOutcome>,
    /// Tables present only in the secondary, which were not copied.
    pub ignored_tables: Vec<String>,
}

impl StoreMergeReport {
    /// Total rows written across all tables.
    pub fn rows_written(&self) -> usize {
        self.tables.iter().map(|t| t.rows_written).sum()
    }

    pub fn count(&self, kind: TableMergeKind) -> usize {
        self.tables.iter().filter(|t| t.kind == kind).count()
    }

    pub fn table(&self, name: &str) -> Option<&TableOutcome> {
        self.tables.iter().find(|t| t.table == name)
    }
}
