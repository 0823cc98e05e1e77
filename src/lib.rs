//! # Probetab - Probe Record Tabulation
//!
//! A library for converting mobile-sensing probe records (arbitrarily nested
//! JSON payloads) into fixed-column tabular exports, one CSV file per probe.
//!
//! ## Modules
//!
//! - **flatten**: Flatten one nested payload into ordered flat rows
//! - **schema**: Two-pass column discovery so headers are fixed before rows
//! - **export**: Group records by probe and drive the per-probe CSV output
//!
//! ## Quick Start
//!
//! ### Flattening
//!
//! ```rust
//! use probetab::flatten::{Flattener, FlattenConfig};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let flattener = Flattener::new(FlattenConfig::default());
//!
//! // Same-length arrays alongside the anchor are one synchronized event
//! // stream: one row per index, scalars repeated.
//! let rows = flattener.flatten(&json!({
//!     "EVENT_TIMESTAMP": [100, 200],
//!     "TEMP": [30, 31],
//!     "UNIT": "C"
//! }))?;
//!
//! assert_eq!(rows.len(), 2);
//! assert_eq!(rows[1]["TEMP"], json!(31));
//! assert_eq!(rows[1]["UNIT"], json!("C"));
//! # Ok(())
//! # }
//! ```
//!
//! ### Exporting
//!
//! ```rust,no_run
//! use probetab::{export_records, ExportConfig, ProbeRecord};
//!
//! # fn main() -> anyhow::Result<()> {
//! let records = vec![ProbeRecord {
//!     id: 1,
//!     device: "phone-1".into(),
//!     probe: "battery".into(),
//!     timestamp: 1234.5,
//!     value: r#"{"level": 87}"#.into(),
//! }];
//!
//! let summary = export_records(&records, "./out", &ExportConfig::default())?;
//! println!("{} rows written", summary.rows_written);
//! # Ok(())
//! # }
//! ```

pub mod flatten;
pub mod schema;
pub mod export;

// Re-export commonly used types for convenience
pub use export::{export_records, BadRecordPolicy, ExportConfig, ExportError, ExportSummary, ProbeRecord};
pub use flatten::{FlattenConfig, FlattenError, Flattener, Row, RowSet};
pub use schema::{ColumnSet, EmitError, SchemaCollector};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_flatten_and_discovery() {
        let flattener = Flattener::new(FlattenConfig::default());
        let collector = SchemaCollector::new(flattener);

        let values = vec![
            json!({"A": 1, "B": [2, 3]}),
            json!({"A": 1, "C": {"d": 4}}),
        ];

        let (columns, failures) = collector.discover_columns(&values);
        assert!(failures.is_empty());
        assert_eq!(
            columns.iter().collect::<Vec<_>>(),
            vec![&"A".to_string(), &"B".to_string(), &"C_d".to_string()]
        );

        let rows = collector
            .emit_rows(&values[0], &columns, &Row::new())
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["B"], json!(2));
        assert_eq!(rows[1]["B"], json!(3));
    }
}
