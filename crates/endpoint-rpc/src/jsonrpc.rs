//! The JSON-RPC 2.0 message envelope: ids, requests, responses, batches,
//! and the standard/LSP-reserved error codes, decoded from and encoded
//! to [`endpoint_json::Value`].

use endpoint_json::{Object, Value};
use thiserror::Error;

const JSONRPC_VERSION: &str = "2.0";

/// A request or response identifier. Notifications have no id at all
/// (modeled as `Request { id: None, .. }`), which is distinct from an
/// explicit `Id::Null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Id {
	String(String),
	Integer(i64),
	Null,
}

impl Id {
	fn to_value(&self) -> Value {
		match self {
			Id::String(s) => Value::String(s.clone()),
			Id::Integer(n) => Value::Integer(*n),
			Id::Null => Value::Null,
		}
	}

	fn from_value(value: &Value) -> Result<Id, ProtocolError> {
		match value {
			Value::String(s) => Ok(Id::String(s.clone())),
			Value::Integer(n) => Ok(Id::Integer(*n)),
			Value::Null => Ok(Id::Null),
			_ => Err(ProtocolError::InvalidId),
		}
	}
}

/// One of the ten JSON-RPC/LSP-reserved error codes, or a user-defined
/// one. Kept as a transparent newtype (not an enum) so a peer's
/// unrecognized code round-trips instead of being coerced to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ErrorCode(pub i64);

impl ErrorCode {
	pub const PARSE_ERROR: ErrorCode = ErrorCode(-32700);
	pub const INVALID_REQUEST: ErrorCode = ErrorCode(-32600);
	pub const METHOD_NOT_FOUND: ErrorCode = ErrorCode(-32601);
	pub const INVALID_PARAMS: ErrorCode = ErrorCode(-32602);
	pub const INTERNAL_ERROR: ErrorCode = ErrorCode(-32603);
	pub const SERVER_NOT_INITIALIZED: ErrorCode = ErrorCode(-32002);
	pub const REQUEST_FAILED: ErrorCode = ErrorCode(-32803);
	pub const SERVER_CANCELLED: ErrorCode = ErrorCode(-32802);
	pub const CONTENT_MODIFIED: ErrorCode = ErrorCode(-32801);
	pub const REQUEST_CANCELLED: ErrorCode = ErrorCode(-32800);
}

impl From<i64> for ErrorCode {
	fn from(code: i64) -> Self {
		ErrorCode(code)
	}
}

/// `{code, message, data?}`, carried on a failed [`Response`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseError {
	pub code: ErrorCode,
	pub message: String,
	pub data: Option<Value>,
}

impl ResponseError {
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
			data: None,
		}
	}

	pub fn with_data(mut self, data: Value) -> Self {
		self.data = Some(data);
		self
	}
}

/// A request's outcome: exactly one of `result`/`error`, made
/// unrepresentable-otherwise by construction rather than by two
/// `Option` fields that could both be `Some` or both be `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
	Result(Value),
	Error(ResponseError),
}

/// `{jsonrpc, method, params?, id?}`. A `None` id marks this a
/// notification rather than a request expecting a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
	pub id: Option<Id>,
	pub method: String,
	pub params: Option<Value>,
}

/// A request with no id — kept as a type alias (rather than a distinct
/// struct) because the wire shape and decode path are identical; only
/// the presence of `id` distinguishes the two.
pub type Notification = Request;

/// `{jsonrpc, id, result?, error?}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
	pub id: Id,
	pub outcome: ResponseOutcome,
}

/// A homogeneous batch: all requests/notifications, or all responses.
#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
	Requests(Vec<Request>),
	Responses(Vec<Response>),
}

/// A single decoded inbound unit: a request/notification, a response,
/// or a batch of either.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
	Request(Request),
	Response(Response),
	Batch(Batch),
}

/// Failures decoding a [`Value`] as a JSON-RPC message. Distinct from
/// [`endpoint_json::ParseError`], which covers malformed JSON text —
/// these are well-formed JSON that is not a legal JSON-RPC envelope.
///
/// Variants that can plausibly be tied back to an in-flight request carry
/// a best-effort `id`, recovered from the input before the failure was
/// detected: `None` when the message had no `id` field, or the field
/// itself was not a legal id. Callers use this to decide between replying
/// `InvalidRequest` and silently dropping the message.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
	#[error("batch array mixes requests/notifications with responses")]
	MixedBatch,
	#[error("an empty array is not a valid batch")]
	EmptyBatch,
	#[error("top-level JSON-RPC message must be an object or array")]
	NotAnObjectOrArray,
	#[error("missing or wrong \"jsonrpc\" version field")]
	InvalidJsonRpcVersion { id: Option<Id> },
	#[error("\"id\" must be a string, integer or null")]
	InvalidId,
	#[error("response must carry exactly one of \"result\"/\"error\"")]
	AmbiguousResponseOutcome { id: Id },
	#[error("object is neither a request (\"method\") nor a response (\"result\"/\"error\")")]
	NotARequestOrResponse { id: Option<Id> },
	#[error("\"error\" object is missing \"code\" or \"message\"")]
	MalformedResponseError { id: Option<Id> },
}

impl ProtocolError {
	/// The id to reply `InvalidRequest` against, if this failure left one
	/// recoverable. `None` means the message carried no id (or an
	/// unparsable one), so there is nothing to correlate a reply with and
	/// the message is logged and dropped instead.
	pub fn known_id(&self) -> Option<Id> {
		match self {
			ProtocolError::InvalidJsonRpcVersion { id } => id.clone(),
			ProtocolError::NotARequestOrResponse { id } => id.clone(),
			ProtocolError::MalformedResponseError { id } => id.clone(),
			ProtocolError::AmbiguousResponseOutcome { id } => Some(id.clone()),
			ProtocolError::MixedBatch | ProtocolError::EmptyBatch | ProtocolError::NotAnObjectOrArray | ProtocolError::InvalidId => None,
		}
	}
}

/// Decodes a top-level wire [`Value`] into a [`Message`].
pub fn decode(value: Value) -> Result<Message, ProtocolError> {
	match value {
		Value::Object(object) => decode_single(object).map(|single| match single {
			Single::Request(r) => Message::Request(r),
			Single::Response(r) => Message::Response(r),
		}),
		Value::Array(items) => decode_batch(items).map(Message::Batch),
		_ => Err(ProtocolError::NotAnObjectOrArray),
	}
}

enum Single {
	Request(Request),
	Response(Response),
}

fn decode_single(object: Object) -> Result<Single, ProtocolError> {
	// Recovered best-effort, ahead of any other validation, so a reply can
	// still be correlated to the sender even when the envelope is otherwise
	// broken (wrong version, neither request nor response shape, ...).
	let best_effort_id = object.get("id").and_then(|value| Id::from_value(value).ok());

	let version_ok = object
		.get("jsonrpc")
		.and_then(Value::as_str)
		.map(|v| v == JSONRPC_VERSION)
		.unwrap_or(false);
	if !version_ok {
		return Err(ProtocolError::InvalidJsonRpcVersion { id: best_effort_id });
	}

	if let Some(method) = object.get("method").and_then(Value::as_str) {
		let id = match object.get("id") {
			Some(value) => Some(Id::from_value(value)?),
			None => None,
		};
		return Ok(Single::Request(Request {
			id,
			method: method.to_string(),
			params: object.get("params").cloned(),
		}));
	}

	if object.contains_key("result") || object.contains_key("error") {
		let id = match object.get("id") {
			Some(value) => Id::from_value(value)?,
			None => return Err(ProtocolError::InvalidId),
		};

		let outcome = match (object.get("result"), object.get("error")) {
			(Some(result), None) => ResponseOutcome::Result(result.clone()),
			(None, Some(error)) => ResponseOutcome::Error(decode_response_error(error, &id)?),
			_ => return Err(ProtocolError::AmbiguousResponseOutcome { id }),
		};

		return Ok(Single::Response(Response { id, outcome }));
	}

	Err(ProtocolError::NotARequestOrResponse { id: best_effort_id })
}

fn decode_response_error(value: &Value, id: &Id) -> Result<ResponseError, ProtocolError> {
	let malformed = || ProtocolError::MalformedResponseError { id: Some(id.clone()) };
	let object = value.as_object().ok_or_else(malformed)?;
	let code = object.get("code").and_then(Value::as_i64).ok_or_else(malformed)?;
	let message = object.get("message").and_then(Value::as_str).ok_or_else(malformed)?;
	Ok(ResponseError {
		code: ErrorCode(code),
		message: message.to_string(),
		data: object.get("data").cloned(),
	})
}

fn decode_batch(items: Vec<Value>) -> Result<Batch, ProtocolError> {
	if items.is_empty() {
		return Err(ProtocolError::EmptyBatch);
	}

	let mut requests = Vec::new();
	let mut responses = Vec::new();

	for item in items {
		let object = match item {
			Value::Object(object) => object,
			_ => return Err(ProtocolError::NotARequestOrResponse { id: None }),
		};
		match decode_single(object)? {
			Single::Request(r) => requests.push(r),
			Single::Response(r) => responses.push(r),
		}
	}

	match (requests.is_empty(), responses.is_empty()) {
		(false, true) => Ok(Batch::Requests(requests)),
		(true, false) => Ok(Batch::Responses(responses)),
		(true, true) => unreachable!("non-empty batch produced no items"),
		(false, false) => Err(ProtocolError::MixedBatch),
	}
}

/// Encodes a request (`id: Some(_)`) or notification (`id: None`).
pub fn encode_request(request: &Request) -> Value {
	let mut object = Object::new();
	object.insert("jsonrpc", Value::String(JSONRPC_VERSION.to_string()));
	object.insert("method", Value::String(request.method.clone()));
	if let Some(params) = &request.params {
		object.insert("params", params.clone());
	}
	if let Some(id) = &request.id {
		object.insert("id", id.to_value());
	}
	Value::Object(object)
}

/// Encodes a response.
pub fn encode_response(response: &Response) -> Value {
	let mut object = Object::new();
	object.insert("jsonrpc", Value::String(JSONRPC_VERSION.to_string()));
	object.insert("id", response.id.to_value());
	match &response.outcome {
		ResponseOutcome::Result(value) => {
			object.insert("result", value.clone());
		}
		ResponseOutcome::Error(error) => {
			let mut error_object = Object::new();
			error_object.insert("code", Value::Integer(error.code.0));
			error_object.insert("message", Value::String(error.message.clone()));
			if let Some(data) = &error.data {
				error_object.insert("data", data.clone());
			}
			object.insert("error", Value::Object(error_object));
		}
	}
	Value::Object(object)
}

pub fn encode_batch(batch: &Batch) -> Value {
	match batch {
		Batch::Requests(requests) => Value::Array(requests.iter().map(encode_request).collect()),
		Batch::Responses(responses) => Value::Array(responses.iter().map(encode_response).collect()),
	}
}

pub fn encode_message(message: &Message) -> Value {
	match message {
		Message::Request(r) => encode_request(r),
		Message::Response(r) => encode_response(r),
		Message::Batch(b) => encode_batch(b),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn obj(pairs: Vec<(&str, Value)>) -> Value {
		let mut object = Object::new();
		for (k, v) in pairs {
			object.insert(k, v);
		}
		Value::Object(object)
	}

	#[test]
	fn decodes_a_request_with_integer_id() {
		let value = obj(vec![
			("jsonrpc", Value::String("2.0".to_string())),
			("id", Value::Integer(1)),
			("method", Value::String("initialize".to_string())),
			("params", Value::Object(Object::new())),
		]);
		let message = decode(value).unwrap();
		match message {
			Message::Request(r) => {
				assert_eq!(r.id, Some(Id::Integer(1)));
				assert_eq!(r.method, "initialize");
			}
			_ => panic!("expected a request"),
		}
	}

	#[test]
	fn decodes_a_notification_without_id() {
		let value = obj(vec![
			("jsonrpc", Value::String("2.0".to_string())),
			("method", Value::String("initialized".to_string())),
		]);
		match decode(value).unwrap() {
			Message::Request(r) => assert_eq!(r.id, None),
			_ => panic!("expected a notification"),
		}
	}

	#[test]
	fn rejects_wrong_jsonrpc_version() {
		let value = obj(vec![
			("jsonrpc", Value::String("1.0".to_string())),
			("method", Value::String("x".to_string())),
		]);
		assert_eq!(decode(value).unwrap_err(), ProtocolError::InvalidJsonRpcVersion { id: None });
	}

	#[test]
	fn wrong_jsonrpc_version_recovers_the_id_for_a_reply() {
		let value = obj(vec![
			("jsonrpc", Value::String("1.0".to_string())),
			("id", Value::Integer(7)),
			("method", Value::String("x".to_string())),
		]);
		assert_eq!(decode(value).unwrap_err().known_id(), Some(Id::Integer(7)));
	}

	#[test]
	fn rejects_both_result_and_error() {
		let value = obj(vec![
			("jsonrpc", Value::String("2.0".to_string())),
			("id", Value::Integer(1)),
			("result", Value::Null),
			(
				"error",
				obj(vec![
					("code", Value::Integer(-32600)),
					("message", Value::String("bad".to_string())),
				]),
			),
		]);
		let err = decode(value).unwrap_err();
		assert_eq!(err, ProtocolError::AmbiguousResponseOutcome { id: Id::Integer(1) });
		assert_eq!(err.known_id(), Some(Id::Integer(1)));
	}

	#[test]
	fn rejects_mixed_batch() {
		let request = obj(vec![
			("jsonrpc", Value::String("2.0".to_string())),
			("method", Value::String("x".to_string())),
		]);
		let response = obj(vec![
			("jsonrpc", Value::String("2.0".to_string())),
			("id", Value::Integer(1)),
			("result", Value::Null),
		]);
		let value = Value::Array(vec![request, response]);
		assert_eq!(decode(value).unwrap_err(), ProtocolError::MixedBatch);
	}

	#[test]
	fn rejects_non_string_integer_null_id() {
		let value = obj(vec![
			("jsonrpc", Value::String("2.0".to_string())),
			("id", Value::Array(vec![])),
			("method", Value::String("x".to_string())),
		]);
		assert_eq!(decode(value).unwrap_err(), ProtocolError::InvalidId);
	}

	#[test]
	fn round_trips_a_request() {
		let request = Request {
			id: Some(Id::String("abc".to_string())),
			method: "textDocument/hover".to_string(),
			params: Some(Value::Integer(7)),
		};
		let encoded = encode_request(&request);
		match decode(encoded).unwrap() {
			Message::Request(decoded) => assert_eq!(decoded, request),
			_ => panic!("expected a request"),
		}
	}

	#[test]
	fn round_trips_an_error_response() {
		let response = Response {
			id: Id::Integer(9),
			outcome: ResponseOutcome::Error(ResponseError::new(ErrorCode::METHOD_NOT_FOUND, "nope")),
		};
		let encoded = encode_response(&response);
		match decode(encoded).unwrap() {
			Message::Response(decoded) => assert_eq!(decoded, response),
			_ => panic!("expected a response"),
		}
	}
}
