use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

/// One flat output row: joined key path -> scalar JSON value
pub type Row = Map<String, Value>;

/// All rows produced from one probe payload, in array-index order
pub type RowSet = Vec<Row>;

// Record-type metadata fields the Funf framework repeats in every payload.
// They are carried in the record envelope instead, so they never become columns.
static DEFAULT_EXCLUDED_KEYS: Lazy<HashSet<String>> = Lazy::new(|| {
    ["PROBE", "TIMESTAMP"]
        .iter()
        .map(|s| s.to_string())
        .collect()
});

/// Configuration for the flattening process
#[derive(Debug, Clone)]
pub struct FlattenConfig {
    /// Separator joining nested object field names into column names
    pub separator: String,

    /// Key paths that are dropped during flattening and never become columns
    pub excluded_keys: HashSet<String>,

    /// Field whose array length marks its same-length array siblings as
    /// index-correlated (one conceptual event per index)
    pub anchor_key: String,

    /// Maximum rows a single payload may expand to before flattening fails
    pub max_rows: usize,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        FlattenConfig {
            separator: String::from("_"),
            excluded_keys: DEFAULT_EXCLUDED_KEYS.clone(),
            anchor_key: String::from("EVENT_TIMESTAMP"),
            max_rows: 10_000,
        }
    }
}

/// Errors produced while flattening a single payload
#[derive(Debug, Error)]
pub enum FlattenError {
    /// A payload must be a JSON object; bare scalars and arrays carry no
    /// field names to build columns from.
    #[error("top-level value must be a JSON object, got {kind}")]
    TopLevelNotObject { kind: &'static str },

    /// The cross-product of independent nested arrays exceeded the
    /// configured row limit for one payload.
    #[error("payload expands to more than {limit} rows")]
    RecordTooLarge { limit: usize },
}

/// Short type name for a JSON value, used in error messages
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
