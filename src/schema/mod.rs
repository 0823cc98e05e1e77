//! Two-pass schema discovery for fixed-column tabular output
//!
//! A probe's output columns must be fixed before the first row is written,
//! but the column set is only known after inspecting every payload. This
//! module coordinates the two passes: discover the union of flat keys, then
//! re-flatten each payload against the now-frozen column set.

pub mod collector;

pub use collector::{ColumnSet, EmitError, SchemaCollector};
