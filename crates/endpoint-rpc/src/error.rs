use endpoint_json::Value;
use thiserror::Error;

use crate::jsonrpc::{ErrorCode, ResponseError};

/// A handler-raised error with an explicit JSON-RPC error code, the
/// façade-level stand-in for the original's thrown exceptions (distilled
/// spec §9's "exceptions as control flow" note).
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message}")]
pub struct RequestError {
	pub code: ErrorCode,
	pub message: String,
	pub data: Option<Value>,
}

impl RequestError {
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
			data: None,
		}
	}

	pub fn invalid_params(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::INVALID_PARAMS, message)
	}

	pub fn method_not_found(method: &str) -> Self {
		Self::new(ErrorCode::METHOD_NOT_FOUND, format!("method not found: {method}"))
	}

	pub fn with_data(mut self, data: Value) -> Self {
		self.data = Some(data);
		self
	}
}

impl From<RequestError> for ResponseError {
	fn from(err: RequestError) -> Self {
		ResponseError {
			code: err.code,
			message: err.message,
			data: err.data,
		}
	}
}

/// Everything that can go wrong turning an inbound request into an
/// outbound response. Any variant other than [`DispatchError::Request`]
/// is mapped to a fixed JSON-RPC error code; `Request` carries its own.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
	#[error("method not found: {0}")]
	MethodNotFound(String),
	#[error("invalid params: {0}")]
	InvalidParams(String),
	#[error(transparent)]
	Request(#[from] RequestError),
	#[error("internal error: {0}")]
	Internal(String),
	#[error("request cancelled")]
	Cancelled,
}

impl DispatchError {
	pub fn into_response_error(self) -> ResponseError {
		match self {
			DispatchError::MethodNotFound(method) => {
				ResponseError::new(ErrorCode::METHOD_NOT_FOUND, format!("method not found: {method}"))
			}
			DispatchError::InvalidParams(message) => ResponseError::new(ErrorCode::INVALID_PARAMS, message),
			DispatchError::Request(err) => err.into(),
			DispatchError::Internal(message) => ResponseError::new(ErrorCode::INTERNAL_ERROR, message),
			DispatchError::Cancelled => ResponseError::new(ErrorCode::REQUEST_CANCELLED, "request cancelled"),
		}
	}
}

/// Top-level error surfaced by the dispatcher's public API (sending a
/// request, awaiting a response, driving the run loop).
#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Framing(#[from] endpoint_transport::FramingError),
	#[error(transparent)]
	Protocol(#[from] crate::jsonrpc::ProtocolError),
	#[error("the connection is shutting down or has already shut down")]
	Disconnected,
	#[error("peer responded with an error: {0:?}")]
	Remote(ResponseError),
}
