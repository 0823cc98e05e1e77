//! Nested-JSON flattening - turn one probe payload into flat tabular rows
//!
//! This module handles the pure, in-memory transform at the heart of the
//! exporter: an arbitrarily nested, heterogeneous JSON payload becomes an
//! ordered list of flat rows (joined key path -> scalar value) ready for a
//! fixed-column tabular writer.
//!
//! Arrays drive row multiplicity. Independent arrays are cartesian-multiplied;
//! arrays correlated through the anchor key (synchronized event streams sharing
//! one index) are zipped instead, one row per event index.

pub mod types;
pub mod flattener;

pub use types::{FlattenConfig, FlattenError, Row, RowSet};
pub use flattener::Flattener;
