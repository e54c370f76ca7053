//! A hand-rolled JSON value model, parser and serializer.
//!
//! This is deliberately not `serde_json`: LSP's framed transport needs a
//! parser that can report the byte offset of a malformed message (so the
//! caller can decide whether the connection is still recoverable) and a
//! value model that keeps `Integer`/`Decimal` disjoint the way the wire
//! format expects. See [`parse`] and [`stringify`].

mod error;
mod parser;
mod serializer;
mod value;

pub use error::ParseError;
pub use parser::parse;
pub use serializer::{stringify, stringify_pretty};
pub use value::{Object, Value};
