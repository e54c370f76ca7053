use thiserror::Error;

/// A JSON parse failure, recoverable by the caller: log it and keep
/// reading the next framed message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message} (at byte offset {text_offset})")]
pub struct ParseError {
	pub message: String,
	pub text_offset: usize,
}

impl ParseError {
	pub(crate) fn new(message: impl Into<String>, text_offset: usize) -> Self {
		Self {
			message: message.into(),
			text_offset,
		}
	}
}
