use serde::{Deserialize, Serialize};

use recon_types::DeletionLogSchema;

/// What to do when a row's modification time is null or blank and the
/// merge has to compare it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentTimestampPolicy {
    /// Treat the row as modified "now": newer than anything stored.
    /// Two absent times tie, and ties keep the row already in place.
    #[default]
    TreatAsNewest,
    /// Treat the row as older than anything stored.
    TreatAsOldest,
    /// Abort the merge with [`MergeError::MissingTimestamp`](crate::MergeError::MissingTimestamp).
    Error,
}

/// Settings for a store merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Column holding each row's last-modification time. Tables without it
    /// are copied whole from the primary source.
    pub modification_column: String,
    /// Location of the deletion log in every store.
    pub deletion_log: DeletionLogSchema,
    /// Policy for rows with no modification time.
    pub absent_timestamp: AbsentTimestampPolicy,
    /// Write the reconciled union of both deletion logs instead of copying
    /// the primary's log table.
    pub merge_deletion_log: bool,
    /// Fail when a store has no deletion log. When `false`, a missing log
    /// reads as empty.
    pub require_deletion_log: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            modification_column: "updatedAt".to_string(),
            deletion_log: DeletionLogSchema::default(),
            absent_timestamp: AbsentTimestampPolicy::default(),
            merge_deletion_log: false,
            require_deletion_log: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = MergeConfig::default();
        assert_eq!(c.modification_column, "updatedAt");
        assert_eq!(c.deletion_log.table, "deleted_records_logs");
        assert_eq!(c.absent_timestamp, AbsentTimestampPolicy::TreatAsNewest);
        assert!(!c.merge_deletion_log);
        assert!(c.require_deletion_log);
    }

    #[test]
    fn policy_names_are_snake_case() {
        let c: MergeConfig =
            serde_json::from_str(r#"{ "absent_timestamp": "treat_as_oldest" }"#).unwrap();
        assert_eq!(c.absent_timestamp, AbsentTimestampPolicy::TreatAsOldest);
        assert_eq!(c.modification_column, "updatedAt");
    }
}
