//! Flattening nested records into rows
//!
//! Column names are parsed into field paths ([`path`]), arranged once into a
//! [`RowPlan`] of simple fields and array levels ([`plan`]), and then every
//! record is expanded by a [`NestedWriter`] into as many rows as its longest
//! arrays require ([`writer`]).

pub mod path;
pub mod plan;
pub(crate) mod resolver;
pub mod writer;

pub use path::parse;
pub use plan::{ArrayIdBinding, ArrayPrefix, Column, Level, RenderField, RowPlan};
pub use resolver::render_value;
pub use writer::{CsvSink, NestedWriter, RowBuffer, RowSink};
