use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::jsonrpc::{Id, ResponseError};

type CallbackOutcome = Result<endpoint_json::Value, ResponseError>;

/// How a pending outbound request wants its response delivered: either
/// through the `oneshot` a [`crate::mainloop::PeerSocket::send_request`]
/// caller is awaiting, or by invoking a callback directly on the read
/// task that received the response (`send_request_with_callback`'s
/// contract — no separate future for the caller to poll or drop).
pub enum Waiter {
	Oneshot(oneshot::Sender<CallbackOutcome>),
	Callback(Box<dyn FnOnce(CallbackOutcome) + Send>),
}

/// Outbound `Id -> Waiter` map. A waiter is inserted before the request
/// is written and removed either by a matching inbound response or, at
/// teardown, by [`PendingTable::cancel_all`].
#[derive(Default)]
pub struct PendingTable {
	waiters: Mutex<HashMap<Id, Waiter>>,
}

impl PendingTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, id: Id, tx: oneshot::Sender<CallbackOutcome>) {
		self.waiters.lock().insert(id, Waiter::Oneshot(tx));
	}

	pub fn insert_callback(&self, id: Id, callback: Box<dyn FnOnce(CallbackOutcome) + Send>) {
		self.waiters.lock().insert(id, Waiter::Callback(callback));
	}

	/// Completes and removes the waiter for `id`, if one is pending. A
	/// response with no matching waiter (already cancelled, or the peer
	/// echoed an id we never sent) is logged and dropped, never an error.
	pub fn complete(&self, id: &Id, outcome: CallbackOutcome) {
		let waiter = self.waiters.lock().remove(id);
		match waiter {
			Some(Waiter::Oneshot(tx)) => {
				let _ = tx.send(outcome);
			}
			Some(Waiter::Callback(callback)) => callback(outcome),
			None => {
				tracing::debug!(?id, "response for unknown or already-resolved request id");
			}
		}
	}

	pub fn len(&self) -> usize {
		self.waiters.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Drains every pending waiter, completing each with `REQUEST_CANCELLED`.
	pub fn cancel_all(&self) {
		let waiters = self.waiters.lock().drain().collect::<Vec<_>>();
		for (_, waiter) in waiters {
			let outcome = Err(ResponseError::new(crate::jsonrpc::ErrorCode::REQUEST_CANCELLED, "connection is shutting down"));
			match waiter {
				Waiter::Oneshot(tx) => {
					let _ = tx.send(outcome);
				}
				Waiter::Callback(callback) => callback(outcome),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn completes_a_matching_waiter() {
		let table = PendingTable::new();
		let (tx, rx) = oneshot::channel();
		table.insert(Id::Integer(1), tx);
		assert_eq!(table.len(), 1);

		table.complete(&Id::Integer(1), Ok(endpoint_json::Value::Null));
		assert_eq!(rx.await.unwrap(), Ok(endpoint_json::Value::Null));
		assert!(table.is_empty());
	}

	#[test]
	fn a_callback_waiter_runs_inline_instead_of_through_a_channel() {
		let table = PendingTable::new();
		let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
		let seen_in_callback = seen.clone();
		table.insert_callback(
			Id::Integer(1),
			Box::new(move |outcome| *seen_in_callback.lock().unwrap() = Some(outcome)),
		);
		assert_eq!(table.len(), 1);

		table.complete(&Id::Integer(1), Ok(endpoint_json::Value::Integer(7)));
		assert_eq!(*seen.lock().unwrap(), Some(Ok(endpoint_json::Value::Integer(7))));
		assert!(table.is_empty());
	}

	#[tokio::test]
	async fn cancel_all_resolves_every_waiter_with_request_cancelled() {
		let table = PendingTable::new();
		let (tx1, rx1) = oneshot::channel();
		let (tx2, rx2) = oneshot::channel();
		table.insert(Id::Integer(1), tx1);
		table.insert(Id::Integer(2), tx2);

		table.cancel_all();

		for rx in [rx1, rx2] {
			let outcome = rx.await.unwrap();
			let err = outcome.unwrap_err();
			assert_eq!(err.code, crate::jsonrpc::ErrorCode::REQUEST_CANCELLED);
		}
		assert!(table.is_empty());
	}
}
