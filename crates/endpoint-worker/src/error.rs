use thiserror::Error;

/// Failure modes for a task submitted to a [`crate::WorkerPool`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
	/// The task panicked; the payload is the panic message when it could
	/// be downcast to a `&str` or `String`, else a generic placeholder.
	#[error("worker task panicked: {0}")]
	Panicked(String),

	/// The pool is draining and no longer accepts new work.
	#[error("worker pool is draining")]
	Draining,

	/// The pool has finished draining; it is permanently closed.
	#[error("worker pool is finalized")]
	Finalized,
}

/// Extracts a human-readable message from a `tokio::task::JoinError` that
/// represents a panic, mirroring the donor runtime's own panic-message
/// helper rather than leaking `Any` payloads past the pool boundary.
pub(crate) fn join_error_panic_message(err: tokio::task::JoinError) -> String {
	if err.is_cancelled() {
		return "worker task was cancelled".to_string();
	}

	match err.try_into_panic() {
		Ok(payload) => {
			if let Some(message) = payload.downcast_ref::<&str>() {
				(*message).to_string()
			} else if let Some(message) = payload.downcast_ref::<String>() {
				message.clone()
			} else {
				"worker task panicked with a non-string payload".to_string()
			}
		}
		Err(_) => "worker task panicked".to_string(),
	}
}
