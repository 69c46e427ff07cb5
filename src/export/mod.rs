//! Message export formats.

pub mod csv;
