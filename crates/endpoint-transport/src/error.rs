use thiserror::Error;

/// The default `Content-Type` emitted on every outbound message and
/// accepted (case-insensitively, with any `charset=utf-8`/`utf8`) on
/// inbound ones.
pub const DEFAULT_CONTENT_TYPE: &str = "application/vscode-jsonrpc; charset=utf-8";

/// Failures reading or writing the `Content-Length` / `Content-Type`
/// framing envelope around a JSON-RPC body.
#[derive(Debug, Error)]
pub enum FramingError {
	#[error("connection lost")]
	ConnectionLost,

	#[error("header line not terminated by '\\r\\n'")]
	BadHeaderTermination,

	#[error("unexpected bare '\\n' in header field, expected '\\r\\n'")]
	BareNewlineInHeader,

	#[error("missing required 'Content-Length' header")]
	MissingContentLength,

	#[error("unsupported or invalid content type: {0}")]
	UnsupportedContentType(String),

	#[error("message body is not valid UTF-8")]
	InvalidUtf8,

	#[error("malformed JSON body: {0}")]
	Json(#[from] endpoint_json::ParseError),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}
