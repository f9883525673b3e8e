//! # Core types for ClinVar release ingestion.
//!
//! This crate holds the pieces every other cvingest crate builds on: the generic
//! [XmlNode] tree produced by the streaming reader, the read-and-consume accessors the
//! domain constructors use to pick it apart, a handful of extraction helpers (date
//! sanitizing, flattening, count parsing) and the shared [IngestError] type.
//!
pub mod errors;
pub mod node;
pub mod utils;

// re-exports
pub use errors::{IngestError, Result};
pub use node::{ATTR_PREFIX, TEXT_KEY, XmlNode, XmlValue};
