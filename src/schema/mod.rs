//! Field-name inference
//!
//! Produces a column list from one sample record. This is a convenience for
//! getting started, not a schema: only the first element of every list is
//! looked at.

pub mod fieldnames;

pub use fieldnames::generate_field_names;
