//! Compile-time message descriptors: the seam between the untyped
//! dispatcher (`endpoint-rpc`, keyed by method name and
//! `endpoint_json::Value`) and a caller's typed params/result structs.
//!
//! The donor's `xeno-lsp-framework` generates this layer from the LSP
//! meta-model via a code generator, out of scope here. This crate ships
//! a small, hand-written, representative slice instead (see
//! [`crate::messages`]): the donor's C++ template/concept machinery
//! becomes a plain trait bound, with two adapter functions
//! (`to_json`/`from_json`) per message type.

use endpoint_json::Value;
use endpoint_rpc::DispatchError;

/// Which side of a connection originates a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	ClientToServer,
	ServerToClient,
	Bidirectional,
}

/// Whether a message expects a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
	Request,
	Notification,
}

/// Converts a typed payload to its wire `Value`.
pub trait ToJson {
	fn to_json(&self) -> Value;
}

/// Recovers a typed payload from a wire `Value`, the way a registered
/// handler decodes inbound `params` and a caller decodes an inbound
/// `result`.
pub trait FromJson: Sized {
	fn from_json(value: Value) -> Result<Self, DispatchError>;
}

/// The "no payload" marker: notifications with no `params` and (if any
/// existed) requests with no meaningful result use this rather than an
/// `Option<T>` at the trait level, so `LspMessage::Params`/`Result` are
/// never themselves optional — an absent payload is represented by the
/// unit type instead.
impl ToJson for () {
	fn to_json(&self) -> Value {
		Value::Null
	}
}

impl FromJson for () {
	fn from_json(_value: Value) -> Result<Self, DispatchError> {
		Ok(())
	}
}

/// The static identity every LSP message carries: its wire method name,
/// which side sends it, and whether it is a request or a notification.
pub trait LspMessage {
	const METHOD: &'static str;
	const DIRECTION: Direction;
	const KIND: Kind;
}

/// A message that expects a response. `Params`/`Result` are concrete
/// (possibly `()`) rather than `Option<T>`, matching [`LspMessage`].
pub trait LspRequest: LspMessage {
	type Params: ToJson + FromJson + Send + 'static;
	type Result: ToJson + FromJson + Send + 'static;
}

/// A one-way message. Has no `Result` at all — "notifications have no
/// result" is therefore enforced by the type system rather than checked
/// at runtime.
pub trait LspNotification: LspMessage {
	type Params: ToJson + FromJson + Send + 'static;
}
