use crate::export::types::{BadRecordPolicy, ExportConfig, ExportError, ExportSummary, ProbeRecord};
use crate::export::writer::ProbeCsvWriter;
use crate::flatten::{Flattener, Row};
use crate::schema::{EmitError, SchemaCollector};
use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Convert a probe record dump into one CSV file per probe
///
/// Records are grouped by probe name. For each probe the payloads are
/// flattened once to discover the column set, the probe's sink is opened with
/// that set as header, then every payload is flattened again and its rows
/// written with the identity fields populated.
///
/// Per-record failures are handled according to
/// [`ExportConfig::bad_records`]: skipped records are logged and collected in
/// the returned [`ExportSummary`], or the first failure aborts the export.
pub fn export_records<P: AsRef<Path>>(
    records: &[ProbeRecord],
    output_dir: P,
    config: &ExportConfig,
) -> Result<ExportSummary> {
    let collector = SchemaCollector::new(Flattener::new(config.flatten.clone()));
    let mut writer = ProbeCsvWriter::new(output_dir)?;

    let mut by_probe: BTreeMap<&str, Vec<&ProbeRecord>> = BTreeMap::new();
    for record in records {
        by_probe.entry(record.probe.as_str()).or_default().push(record);
    }

    let mut summary = ExportSummary {
        probes: by_probe.len(),
        records: records.len(),
        ..ExportSummary::default()
    };

    for (probe, probe_records) in &by_probe {
        // Pass 1: parse every payload and union its flat keys. Parse and
        // flatten failures knock the record out of both passes.
        let mut parsed: Vec<Option<Value>> = Vec::with_capacity(probe_records.len());
        for record in probe_records {
            match serde_json::from_str::<Value>(&record.value) {
                Ok(value) => parsed.push(Some(value)),
                Err(err) => {
                    let failure = ExportError::MalformedInput {
                        record_id: record.id,
                        probe: probe.to_string(),
                        reason: err.to_string(),
                    };
                    handle_failure(failure, config.bad_records, &mut summary.failures)?;
                    parsed.push(None);
                }
            }
        }

        let ok_positions: Vec<usize> = parsed
            .iter()
            .enumerate()
            .filter(|(_, value)| value.is_some())
            .map(|(pos, _)| pos)
            .collect();
        let (columns, flatten_failures) = collector.discover_columns(parsed.iter().flatten());
        for (index, err) in flatten_failures {
            let pos = ok_positions[index];
            let failure = ExportError::MalformedInput {
                record_id: probe_records[pos].id,
                probe: probe.to_string(),
                reason: err.to_string(),
            };
            handle_failure(failure, config.bad_records, &mut summary.failures)?;
            parsed[pos] = None;
        }

        log::debug!(
            "probe {}: {} records, {} columns",
            probe,
            probe_records.len(),
            columns.len()
        );
        writer.open_probe(probe, &columns)?;

        // Pass 2: re-flatten each surviving payload against the fixed
        // column set and write its rows.
        for (record, value) in probe_records.iter().zip(&parsed) {
            let value = match value {
                Some(value) => value,
                None => continue,
            };

            match collector.emit_rows(value, &columns, &fixed_fields(record)) {
                Ok(rows) => {
                    for row in &rows {
                        writer.write_row(probe, row)?;
                    }
                    summary.rows_written += rows.len();
                }
                Err(EmitError::SchemaViolation { column }) => {
                    let failure = ExportError::SchemaViolation {
                        record_id: record.id,
                        probe: probe.to_string(),
                        column,
                    };
                    handle_failure(failure, config.bad_records, &mut summary.failures)?;
                }
                Err(EmitError::Flatten(err)) => {
                    let failure = ExportError::MalformedInput {
                        record_id: record.id,
                        probe: probe.to_string(),
                        reason: err.to_string(),
                    };
                    handle_failure(failure, config.bad_records, &mut summary.failures)?;
                }
            }
        }
    }

    writer.flush()?;
    log::info!(
        "exported {} rows across {} probes ({} records, {} skipped)",
        summary.rows_written,
        summary.probes,
        summary.records,
        summary.failures.len()
    );
    Ok(summary)
}

/// Identity columns populating every row of one record
fn fixed_fields(record: &ProbeRecord) -> Row {
    let mut fixed = Row::new();
    fixed.insert("id".to_string(), Value::from(record.id));
    fixed.insert("device".to_string(), Value::String(record.device.clone()));
    fixed.insert("timestamp".to_string(), Value::from(record.timestamp));
    fixed
}

fn handle_failure(
    failure: ExportError,
    policy: BadRecordPolicy,
    failures: &mut Vec<ExportError>,
) -> Result<()> {
    match policy {
        BadRecordPolicy::Fail => Err(failure.into()),
        BadRecordPolicy::Skip => {
            log::warn!("skipping record: {}", failure);
            failures.push(failure);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, probe: &str, value: &str) -> ProbeRecord {
        ProbeRecord {
            id,
            device: String::from("phone-1"),
            probe: probe.to_string(),
            timestamp: 1000.0 + id as f64,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_export_writes_one_file_per_probe() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            record(1, "battery", r#"{"level": 87}"#),
            record(2, "wifi", r#"{"ssid": "lab", "rssi": [-40, -42]}"#),
            record(3, "battery", r#"{"level": 85, "plugged": true}"#),
        ];

        let summary = export_records(&records, dir.path(), &ExportConfig::default()).unwrap();

        assert_eq!(summary.probes, 2);
        assert_eq!(summary.records, 3);
        assert_eq!(summary.rows_written, 4);
        assert!(summary.failures.is_empty());

        let battery = std::fs::read_to_string(dir.path().join("battery.csv")).unwrap();
        let lines: Vec<&str> = battery.lines().collect();
        assert_eq!(lines[0], "id,device,timestamp,level,plugged");
        assert_eq!(lines[1], "1,phone-1,1001.0,87,");
        assert_eq!(lines[2], "3,phone-1,1003.0,85,true");

        let wifi = std::fs::read_to_string(dir.path().join("wifi.csv")).unwrap();
        let lines: Vec<&str> = wifi.lines().collect();
        assert_eq!(lines[0], "id,device,timestamp,rssi,ssid");
        assert_eq!(lines[1], "2,phone-1,1002.0,-40,lab");
        assert_eq!(lines[2], "2,phone-1,1002.0,-42,lab");
    }

    #[test]
    fn test_skip_policy_records_failure_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            record(1, "battery", "not json at all"),
            record(2, "battery", r#"{"level": 85}"#),
        ];

        let summary = export_records(&records, dir.path(), &ExportConfig::default()).unwrap();

        assert_eq!(summary.rows_written, 1);
        assert_eq!(summary.failures.len(), 1);
        match &summary.failures[0] {
            ExportError::MalformedInput { record_id, probe, .. } => {
                assert_eq!(*record_id, 1);
                assert_eq!(probe, "battery");
            }
            other => panic!("expected MalformedInput, got {other:?}"),
        }
    }

    #[test]
    fn test_fail_policy_aborts_on_first_bad_record() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            record(1, "battery", r#"[1, 2, 3]"#),
            record(2, "battery", r#"{"level": 85}"#),
        ];
        let config = ExportConfig {
            bad_records: BadRecordPolicy::Fail,
            ..ExportConfig::default()
        };

        let err = export_records(&records, dir.path(), &config).unwrap_err();

        assert!(err.to_string().contains("record 1"));
    }

    #[test]
    fn test_excluded_metadata_keys_stay_out_of_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record(
            1,
            "battery",
            r#"{"PROBE": "battery", "TIMESTAMP": 999, "level": 87}"#,
        )];

        export_records(&records, dir.path(), &ExportConfig::default()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("battery.csv")).unwrap();
        assert_eq!(content.lines().next().unwrap(), "id,device,timestamp,level");
    }

    #[test]
    fn test_correlated_event_stream_export() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record(
            1,
            "accel",
            r#"{"EVENT_TIMESTAMP": [100, 200], "X": [0.1, 0.2], "UNIT": "g"}"#,
        )];

        let summary = export_records(&records, dir.path(), &ExportConfig::default()).unwrap();

        assert_eq!(summary.rows_written, 2);
        let content = std::fs::read_to_string(dir.path().join("accel.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "id,device,timestamp,EVENT_TIMESTAMP,UNIT,X");
        assert_eq!(lines[1], "1,phone-1,1001.0,100,g,0.1");
        assert_eq!(lines[2], "1,phone-1,1001.0,200,g,0.2");
    }
}
