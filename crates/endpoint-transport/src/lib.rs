//! LSP `Content-Length`/`Content-Type` framing over any bidirectional
//! byte stream, plus a handful of concrete stream adapters for stdio,
//! TCP and child-process transports.

mod error;
mod framed;

#[cfg(feature = "transports")]
mod transports;

pub use error::{FramingError, DEFAULT_CONTENT_TYPE};
pub use framed::{read_message, write_message, FramedTransport};

#[cfg(feature = "transports")]
pub use transports::{accept_tcp, connect_tcp, spawn_child, stdio};
