//! A small, representative slice of LSP messages, hand-written in the
//! shape the donor's `lsp-types`-backed generator would have produced —
//! the full meta-model generator itself is out of scope here. Enough to
//! exercise every message-layer invariant: a request/response pair with a
//! structured params type ([`Initialize`]), a notification with an empty
//! payload ([`Initialized`]), a request with no params ([`Shutdown`]), a
//! notification that tears the connection down ([`Exit`]), a
//! notification with a nested struct payload
//! ([`DidOpenTextDocument`]), a request whose result is legitimately
//! absent ([`Hover`]), and the one notification every LSP endpoint
//! treats specially: cancellation ([`CancelRequest`]).

use endpoint_json::{Object, Value};
use endpoint_rpc::DispatchError;

use crate::message::{Direction, FromJson, Kind, LspMessage, LspNotification, LspRequest, ToJson};

fn require_object(value: Value, what: &str) -> Result<Object, DispatchError> {
	match value {
		Value::Object(object) => Ok(object),
		_ => Err(DispatchError::InvalidParams(format!("{what} must be an object"))),
	}
}

fn require_field(object: &Object, key: &str) -> Result<Value, DispatchError> {
	object
		.get(key)
		.cloned()
		.ok_or_else(|| DispatchError::InvalidParams(format!("missing field \"{key}\"")))
}

fn require_str(object: &Object, key: &str) -> Result<String, DispatchError> {
	require_field(object, key)?
		.as_str()
		.map(str::to_owned)
		.ok_or_else(|| DispatchError::InvalidParams(format!("field \"{key}\" must be a string")))
}

fn require_i64(object: &Object, key: &str) -> Result<i64, DispatchError> {
	require_field(object, key)?
		.as_i64()
		.ok_or_else(|| DispatchError::InvalidParams(format!("field \"{key}\" must be an integer")))
}

impl<T: ToJson> ToJson for Option<T> {
	fn to_json(&self) -> Value {
		match self {
			Some(value) => value.to_json(),
			None => Value::Null,
		}
	}
}

impl<T: FromJson> FromJson for Option<T> {
	fn from_json(value: Value) -> Result<Self, DispatchError> {
		if value.is_null() {
			Ok(None)
		} else {
			Ok(Some(T::from_json(value)?))
		}
	}
}

/// `{line, character}`, 0-based as LSP specifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
	pub line: i64,
	pub character: i64,
}

impl ToJson for Position {
	fn to_json(&self) -> Value {
		let mut object = Object::new();
		object.insert("line", Value::Integer(self.line));
		object.insert("character", Value::Integer(self.character));
		Value::Object(object)
	}
}

impl FromJson for Position {
	fn from_json(value: Value) -> Result<Self, DispatchError> {
		let object = require_object(value, "Position")?;
		Ok(Position {
			line: require_i64(&object, "line")?,
			character: require_i64(&object, "character")?,
		})
	}
}

/// `{uri}` — a document identified by its URI alone. URI parsing itself
/// is out of scope; the raw string is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocumentIdentifier {
	pub uri: String,
}

impl ToJson for TextDocumentIdentifier {
	fn to_json(&self) -> Value {
		let mut object = Object::new();
		object.insert("uri", Value::String(self.uri.clone()));
		Value::Object(object)
	}
}

impl FromJson for TextDocumentIdentifier {
	fn from_json(value: Value) -> Result<Self, DispatchError> {
		let object = require_object(value, "TextDocumentIdentifier")?;
		Ok(TextDocumentIdentifier {
			uri: require_str(&object, "uri")?,
		})
	}
}

/// `{uri, languageId, version, text}` — a document's full contents at
/// the moment it was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocumentItem {
	pub uri: String,
	pub language_id: String,
	pub version: i64,
	pub text: String,
}

impl ToJson for TextDocumentItem {
	fn to_json(&self) -> Value {
		let mut object = Object::new();
		object.insert("uri", Value::String(self.uri.clone()));
		object.insert("languageId", Value::String(self.language_id.clone()));
		object.insert("version", Value::Integer(self.version));
		object.insert("text", Value::String(self.text.clone()));
		Value::Object(object)
	}
}

impl FromJson for TextDocumentItem {
	fn from_json(value: Value) -> Result<Self, DispatchError> {
		let object = require_object(value, "TextDocumentItem")?;
		Ok(TextDocumentItem {
			uri: require_str(&object, "uri")?,
			language_id: require_str(&object, "languageId")?,
			version: require_i64(&object, "version")?,
			text: require_str(&object, "text")?,
		})
	}
}

/// `initialize` request params. `capabilities` is kept as an opaque
/// [`Value`] passthrough: the capabilities shape is the single largest
/// piece of the real LSP meta-model and not itself under test here.
#[derive(Debug, Clone, PartialEq)]
pub struct InitializeParams {
	pub root_uri: Option<String>,
	pub capabilities: Value,
}

impl ToJson for InitializeParams {
	fn to_json(&self) -> Value {
		let mut object = Object::new();
		if let Some(root_uri) = &self.root_uri {
			object.insert("rootUri", Value::String(root_uri.clone()));
		} else {
			object.insert("rootUri", Value::Null);
		}
		object.insert("capabilities", self.capabilities.clone());
		Value::Object(object)
	}
}

impl FromJson for InitializeParams {
	fn from_json(value: Value) -> Result<Self, DispatchError> {
		let object = require_object(value, "InitializeParams")?;
		let root_uri = match object.get("rootUri") {
			Some(Value::String(s)) => Some(s.clone()),
			_ => None,
		};
		let capabilities = require_field(&object, "capabilities")?;
		Ok(InitializeParams { root_uri, capabilities })
	}
}

/// `initialize` response. `capabilities` is again an opaque passthrough.
#[derive(Debug, Clone, PartialEq)]
pub struct InitializeResult {
	pub capabilities: Value,
}

impl ToJson for InitializeResult {
	fn to_json(&self) -> Value {
		let mut object = Object::new();
		object.insert("capabilities", self.capabilities.clone());
		Value::Object(object)
	}
}

impl FromJson for InitializeResult {
	fn from_json(value: Value) -> Result<Self, DispatchError> {
		let object = require_object(value, "InitializeResult")?;
		Ok(InitializeResult {
			capabilities: require_field(&object, "capabilities")?,
		})
	}
}

/// `initialize`: client-to-server request, sent exactly once at the
/// start of a session.
pub struct Initialize;

impl LspMessage for Initialize {
	const METHOD: &'static str = "initialize";
	const DIRECTION: Direction = Direction::ClientToServer;
	const KIND: Kind = Kind::Request;
}

impl LspRequest for Initialize {
	type Params = InitializeParams;
	type Result = InitializeResult;
}

/// `initialized`: client-to-server notification, sent once the client
/// has processed the `initialize` response. Carries an empty object.
pub struct Initialized;

impl LspMessage for Initialized {
	const METHOD: &'static str = "initialized";
	const DIRECTION: Direction = Direction::ClientToServer;
	const KIND: Kind = Kind::Notification;
}

impl LspNotification for Initialized {
	type Params = ();
}

/// `shutdown`: client-to-server request with no params, asking the
/// server to release resources without exiting yet.
pub struct Shutdown;

impl LspMessage for Shutdown {
	const METHOD: &'static str = "shutdown";
	const DIRECTION: Direction = Direction::ClientToServer;
	const KIND: Kind = Kind::Request;
}

impl LspRequest for Shutdown {
	type Params = ();
	type Result = ();
}

/// `exit`: client-to-server notification telling the server to
/// terminate. `endpoint-lsp`'s `Endpoint` treats this one method
/// specially (see [`crate::endpoint::EndpointConfig::shutdown_on_exit`]),
/// giving callers a typed conduit for session teardown without
/// prescribing what the server process itself does beyond that.
pub struct Exit;

impl LspMessage for Exit {
	const METHOD: &'static str = "exit";
	const DIRECTION: Direction = Direction::ClientToServer;
	const KIND: Kind = Kind::Notification;
}

impl LspNotification for Exit {
	type Params = ();
}

/// `textDocument/didOpen` params.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DidOpenTextDocumentParams {
	pub text_document: TextDocumentItem,
}

impl ToJson for DidOpenTextDocumentParams {
	fn to_json(&self) -> Value {
		let mut object = Object::new();
		object.insert("textDocument", self.text_document.to_json());
		Value::Object(object)
	}
}

impl FromJson for DidOpenTextDocumentParams {
	fn from_json(value: Value) -> Result<Self, DispatchError> {
		let object = require_object(value, "DidOpenTextDocumentParams")?;
		Ok(DidOpenTextDocumentParams {
			text_document: TextDocumentItem::from_json(require_field(&object, "textDocument")?)?,
		})
	}
}

/// `textDocument/didOpen`: client-to-server notification.
pub struct DidOpenTextDocument;

impl LspMessage for DidOpenTextDocument {
	const METHOD: &'static str = "textDocument/didOpen";
	const DIRECTION: Direction = Direction::ClientToServer;
	const KIND: Kind = Kind::Notification;
}

impl LspNotification for DidOpenTextDocument {
	type Params = DidOpenTextDocumentParams;
}

/// `textDocument/hover` params.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverParams {
	pub text_document: TextDocumentIdentifier,
	pub position: Position,
}

impl ToJson for HoverParams {
	fn to_json(&self) -> Value {
		let mut object = Object::new();
		object.insert("textDocument", self.text_document.to_json());
		object.insert("position", self.position.to_json());
		Value::Object(object)
	}
}

impl FromJson for HoverParams {
	fn from_json(value: Value) -> Result<Self, DispatchError> {
		let object = require_object(value, "HoverParams")?;
		Ok(HoverParams {
			text_document: TextDocumentIdentifier::from_json(require_field(&object, "textDocument")?)?,
			position: Position::from_json(require_field(&object, "position")?)?,
		})
	}
}

/// `textDocument/hover` result payload, present only when hover info
/// exists at the requested position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hover {
	pub contents: String,
}

impl ToJson for Hover {
	fn to_json(&self) -> Value {
		let mut object = Object::new();
		object.insert("contents", Value::String(self.contents.clone()));
		Value::Object(object)
	}
}

impl FromJson for Hover {
	fn from_json(value: Value) -> Result<Self, DispatchError> {
		let object = require_object(value, "Hover")?;
		Ok(Hover {
			contents: require_str(&object, "contents")?,
		})
	}
}

/// `textDocument/hover`: client-to-server request. A `null` result
/// (no hover info at this position) is legal, modeled as `Option<Hover>`
/// rather than a sentinel value.
pub struct HoverRequest;

impl LspMessage for HoverRequest {
	const METHOD: &'static str = "textDocument/hover";
	const DIRECTION: Direction = Direction::ClientToServer;
	const KIND: Kind = Kind::Request;
}

impl LspRequest for HoverRequest {
	type Params = HoverParams;
	type Result = Option<Hover>;
}

/// `$/cancelRequest` params: the id of the request to cancel. Carried
/// as an opaque [`Value`] (string or integer) rather than
/// `endpoint_rpc::jsonrpc::Id` directly, so this crate's message layer
/// does not need to depend on `endpoint-rpc`'s internal id
/// representation for what is, on the wire, just another JSON value.
#[derive(Debug, Clone, PartialEq)]
pub struct CancelParams {
	pub id: Value,
}

impl ToJson for CancelParams {
	fn to_json(&self) -> Value {
		let mut object = Object::new();
		object.insert("id", self.id.clone());
		Value::Object(object)
	}
}

impl FromJson for CancelParams {
	fn from_json(value: Value) -> Result<Self, DispatchError> {
		let object = require_object(value, "CancelParams")?;
		Ok(CancelParams {
			id: require_field(&object, "id")?,
		})
	}
}

/// `$/cancelRequest`: bidirectional notification. The dispatcher does
/// not interpret it — it merely conveys it; `endpoint-lsp` ships the
/// descriptor so callers get a typed `send_notification::<CancelRequest>`
/// / `register_notification::<CancelRequest>`, but applies no
/// cancellation logic of its own.
pub struct CancelRequest;

impl LspMessage for CancelRequest {
	const METHOD: &'static str = "$/cancelRequest";
	const DIRECTION: Direction = Direction::Bidirectional;
	const KIND: Kind = Kind::Notification;
}

impl LspNotification for CancelRequest {
	type Params = CancelParams;
}
