use crate::export::types::FIXED_FIELDS;
use crate::flatten::Row;
use crate::schema::ColumnSet;
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Writes probe rows to one CSV file per probe
///
/// Each probe's sink is opened exactly once, after column discovery for that
/// probe completes, with the header fixed to the identity fields followed by
/// the sorted discovered columns.
pub struct ProbeCsvWriter {
    output_dir: PathBuf,
    writers: HashMap<String, csv::Writer<File>>,
    headers: HashMap<String, Vec<String>>,
}

impl ProbeCsvWriter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        std::fs::create_dir_all(&output_dir).context("Failed to create output directory")?;

        Ok(ProbeCsvWriter {
            output_dir: output_dir.as_ref().to_path_buf(),
            writers: HashMap::new(),
            headers: HashMap::new(),
        })
    }

    /// Open the sink for one probe and write its header row
    pub fn open_probe(&mut self, probe: &str, columns: &ColumnSet) -> Result<()> {
        if self.writers.contains_key(probe) {
            bail!("probe {probe:?} is already open");
        }

        let mut header: Vec<String> = FIXED_FIELDS.iter().map(|f| f.to_string()).collect();
        header.extend(columns.iter().cloned());

        let path = self.output_dir.join(format!("{}.csv", file_stem(probe)));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to open output file: {}", path.display()))?;
        writer
            .write_record(&header)
            .context("Failed to write header row")?;

        self.writers.insert(probe.to_string(), writer);
        self.headers.insert(probe.to_string(), header);
        Ok(())
    }

    /// Write one row against the probe's fixed header, defaulting missing
    /// columns to an empty field
    pub fn write_row(&mut self, probe: &str, row: &Row) -> Result<()> {
        let header = match self.headers.get(probe) {
            Some(header) => header,
            None => bail!("no open sink for probe {probe:?}"),
        };

        let fields: Vec<String> = header
            .iter()
            .map(|col| row.get(col).map(field_text).unwrap_or_default())
            .collect();

        let writer = self.writers.get_mut(probe).expect("header without writer");
        writer.write_record(&fields).context("Failed to write row")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        for writer in self.writers.values_mut() {
            writer.flush().context("Failed to flush writer")?;
        }
        Ok(())
    }
}

/// Render one scalar as CSV field text. Strings are written bare (the csv
/// writer handles quoting); null becomes an empty field.
fn field_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Probe names are fully-qualified class names; keep them readable as file
/// names but strip anything the filesystem would treat as a path.
fn file_stem(probe: &str) -> String {
    probe
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}
