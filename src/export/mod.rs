//! Per-probe CSV export driver
//!
//! Thin driver around the flattener and schema collector: group probe
//! records by probe name, discover each probe's column set, then write one
//! CSV file per probe with a header of the identity fields followed by the
//! sorted discovered columns.

pub mod types;
pub mod writer;
pub mod runner;

pub use types::{BadRecordPolicy, ExportConfig, ExportError, ExportSummary, ProbeRecord, FIXED_FIELDS};
pub use writer::ProbeCsvWriter;
pub use runner::export_records;
