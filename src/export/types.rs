use crate::flatten::FlattenConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity columns written before the discovered payload columns, in
/// header order
pub const FIXED_FIELDS: [&str; 3] = ["id", "device", "timestamp"];

/// One row of a probe record dump: the envelope plus the raw JSON payload
///
/// Mirrors the `(id, device, probe, timestamp, value)` tuple of the sensor
/// database's data table. The payload stays as text until the export parses
/// it, so a malformed payload is a per-record failure rather than a failure
/// to read the dump at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub id: i64,
    pub device: String,
    pub probe: String,
    pub timestamp: f64,
    pub value: String,
}

/// What to do when a single record fails to parse, flatten, or emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadRecordPolicy {
    /// Log a warning, collect the failure in the summary, keep going
    Skip,
    /// Abort the whole export with the failing record's error
    Fail,
}

/// Configuration for one export run
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub flatten: FlattenConfig,
    pub bad_records: BadRecordPolicy,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            flatten: FlattenConfig::default(),
            bad_records: BadRecordPolicy::Skip,
        }
    }
}

/// Per-record export failures, tagged with the offending record's identity
#[derive(Debug, Error)]
pub enum ExportError {
    /// The payload is not valid JSON, is not a top-level object, or expands
    /// past the row limit. Always safe to skip: the record never produced
    /// any output.
    #[error("record {record_id} (probe {probe}): malformed payload: {reason}")]
    MalformedInput {
        record_id: i64,
        probe: String,
        reason: String,
    },

    /// Emission saw a key that discovery never did. Only possible when the
    /// two passes observe different data, so it points at a caller bug and
    /// is never dropped silently.
    #[error("record {record_id} (probe {probe}): column {column:?} missing from the discovered schema")]
    SchemaViolation {
        record_id: i64,
        probe: String,
        column: String,
    },
}

/// Counters and collected failures for one export run
#[derive(Debug, Default)]
pub struct ExportSummary {
    pub probes: usize,
    pub records: usize,
    pub rows_written: usize,
    pub failures: Vec<ExportError>,
}
