use crate::flatten::types::{value_kind, FlattenConfig, FlattenError, Row, RowSet};
use serde_json::{Map, Value};

/// The core flattener that turns one nested probe payload into flat rows
///
/// Column names are built from the path of object field names joined by the
/// configured separator. A list-valued field keeps its own bare name: list
/// index position, not the containing path, distinguishes repeated entries.
/// Independent lists multiply (cartesian product); lists correlated through
/// the anchor key are zipped index-by-index instead.
pub struct Flattener {
    config: FlattenConfig,
}

impl Flattener {
    pub fn new(config: FlattenConfig) -> Self {
        Flattener { config }
    }

    pub fn config(&self) -> &FlattenConfig {
        &self.config
    }

    /// Flatten one payload into its row set
    ///
    /// Dispatches internally between the ordinary recursive path and the
    /// correlated path, which is taken when the anchor key holds a non-empty
    /// array. Object fields iterate in insertion order, so row order is
    /// reproducible across runs.
    pub fn flatten(&self, value: &Value) -> Result<RowSet, FlattenError> {
        let obj = match value {
            Value::Object(obj) => obj,
            other => {
                return Err(FlattenError::TopLevelNotObject {
                    kind: value_kind(other),
                })
            }
        };

        let anchor_len = obj
            .get(&self.config.anchor_key)
            .and_then(Value::as_array)
            .map(Vec::len)
            .filter(|len| *len > 0);

        match anchor_len {
            Some(len) => self.flatten_correlated(obj, len),
            None => self.flatten_inner(value, ""),
        }
    }

    /// Recursive flattening of one value under a key-path prefix
    fn flatten_inner(&self, value: &Value, prefix: &str) -> Result<RowSet, FlattenError> {
        match value {
            Value::Object(obj) => {
                // An empty object yields exactly one empty row, the identity
                // of the cross-product, so a parent row is never eliminated.
                let mut rows: RowSet = vec![Row::new()];
                for (key, val) in obj {
                    let child_prefix = self.child_prefix(prefix, key, val);
                    let inner = self.flatten_inner(val, &child_prefix)?;
                    if inner.is_empty() {
                        // Empty arrays contribute no rows and no columns
                        continue;
                    }
                    rows = self.cross_product(rows, inner)?;
                }
                Ok(rows)
            }
            Value::Array(arr) => {
                // List elements are alternative rows, not independent
                // dimensions: concatenate under the same prefix.
                let mut rows = RowSet::new();
                for elem in arr {
                    rows.extend(self.flatten_inner(elem, prefix)?);
                }
                Ok(rows)
            }
            scalar => {
                let mut row = Row::new();
                if !self.config.excluded_keys.contains(prefix) {
                    row.insert(prefix.to_string(), scalar.clone());
                }
                // An excluded key still yields one (empty) row so the
                // cardinality of the enclosing product is preserved.
                Ok(vec![row])
            }
        }
    }

    /// Zip-then-multiply path for payloads carrying the correlation anchor
    fn flatten_correlated(
        &self,
        obj: &Map<String, Value>,
        index_len: usize,
    ) -> Result<RowSet, FlattenError> {
        let mut correlated: Vec<(&String, &Vec<Value>)> = Vec::new();
        let mut uncorrelated = Map::new();
        for (key, val) in obj {
            match val.as_array() {
                Some(arr) if arr.len() == index_len => correlated.push((key, arr)),
                _ => {
                    uncorrelated.insert(key.clone(), val.clone());
                }
            }
        }

        // Values outside the correlated lists repeat identically across
        // every event index.
        let common = self.flatten_inner(&Value::Object(uncorrelated), "")?;

        // One synthetic row per event index. Correlated fields are taken as
        // scalar-per-index and keyed by their bare field name.
        let mut inner = RowSet::with_capacity(index_len);
        for i in 0..index_len {
            let mut row = Row::new();
            for (key, arr) in &correlated {
                if self.config.excluded_keys.contains(key.as_str()) {
                    continue;
                }
                row.insert((*key).clone(), arr[i].clone());
            }
            inner.push(row);
        }

        // Inner varies fastest: one output row per event index for every
        // combination of uncorrelated branching.
        self.cross_product(common, inner)
    }

    fn child_prefix(&self, prefix: &str, key: &str, val: &Value) -> String {
        if val.is_array() || prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}{}", prefix, self.config.separator, key)
        }
    }

    /// Merge two row sets pairwise, right-hand keys winning on collision
    fn cross_product(&self, left: RowSet, right: RowSet) -> Result<RowSet, FlattenError> {
        let combined = left.len().saturating_mul(right.len());
        if combined > self.config.max_rows {
            return Err(FlattenError::RecordTooLarge {
                limit: self.config.max_rows,
            });
        }

        let mut merged = RowSet::with_capacity(combined);
        for old in &left {
            for new in &right {
                let mut row = old.clone();
                for (k, v) in new {
                    row.insert(k.clone(), v.clone());
                }
                merged.push(row);
            }
        }
        Ok(merged)
    }
}
