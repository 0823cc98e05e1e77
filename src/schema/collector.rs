use crate::flatten::{FlattenError, Flattener, Row, RowSet};
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

/// The fixed column set for one probe, discovered during pass 1.
///
/// A BTreeSet keeps the columns sorted, which is also the header order the
/// writer uses after the fixed identity fields.
pub type ColumnSet = BTreeSet<String>;

/// Errors produced while emitting rows against a fixed column set
#[derive(Debug, Error)]
pub enum EmitError {
    #[error(transparent)]
    Flatten(#[from] FlattenError),

    /// A flattened row contains a key that was never seen during discovery.
    /// Silently dropping it would produce misleading tabular output, so this
    /// is always a hard error.
    #[error("column {column:?} was not present during schema discovery")]
    SchemaViolation { column: String },
}

/// Drives the two-pass protocol over one probe's payloads
///
/// Pass 1 ([`discover_columns`](SchemaCollector::discover_columns)) unions the
/// flat keys seen across every payload to fix a stable column set before any
/// row is written. Pass 2 ([`emit_rows`](SchemaCollector::emit_rows))
/// re-flattens each payload against that fixed set. Two passes are required
/// because a streaming tabular writer needs its header first, yet the column
/// set is only known after inspecting every payload's shape.
pub struct SchemaCollector {
    flattener: Flattener,
}

impl SchemaCollector {
    pub fn new(flattener: Flattener) -> Self {
        SchemaCollector { flattener }
    }

    pub fn flattener(&self) -> &Flattener {
        &self.flattener
    }

    /// Pass 1: union the flat keys of every payload into one column set
    ///
    /// Visits every payload and never short-circuits: payloads that fail to
    /// flatten are returned alongside the column set, keyed by their position
    /// in the input, so the caller can apply its own skip-or-abort policy.
    /// An empty input yields an empty column set. The result depends only on
    /// payload content, never on input order.
    pub fn discover_columns<'a, I>(&self, values: I) -> (ColumnSet, Vec<(usize, FlattenError)>)
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut columns = ColumnSet::new();
        let mut failures = Vec::new();

        for (index, value) in values.into_iter().enumerate() {
            match self.flattener.flatten(value) {
                Ok(rows) => {
                    for row in &rows {
                        for key in row.keys() {
                            if !columns.contains(key) {
                                columns.insert(key.clone());
                            }
                        }
                    }
                }
                Err(err) => failures.push((index, err)),
            }
        }

        (columns, failures)
    }

    /// Pass 2: re-flatten one payload and decorate every row with the
    /// caller-supplied fixed identity fields
    ///
    /// Fixed fields (record id, device, timestamp) live outside the JSON
    /// payload and populate every row of the record. A payload key missing
    /// from a row is the writer's concern (defaulted to empty); a row key
    /// missing from `columns` is a [`EmitError::SchemaViolation`].
    pub fn emit_rows(
        &self,
        value: &Value,
        columns: &ColumnSet,
        fixed_fields: &Row,
    ) -> Result<RowSet, EmitError> {
        let mut rows = self.flattener.flatten(value)?;

        for row in &rows {
            for key in row.keys() {
                if !columns.contains(key) {
                    return Err(EmitError::SchemaViolation {
                        column: key.clone(),
                    });
                }
            }
        }

        // Fixed fields win on collision so a payload field can never corrupt
        // the identity columns.
        for row in &mut rows {
            for (key, val) in fixed_fields {
                row.insert(key.clone(), val.clone());
            }
        }

        Ok(rows)
    }
}
