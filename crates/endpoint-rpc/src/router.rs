use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use endpoint_json::Value;
use parking_lot::Mutex;

use crate::error::DispatchError;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A type-erased request handler: decode params, invoke, encode result.
/// `endpoint-lsp` adapts a typed `tower_service::Service` into one of
/// these per registered message; `MethodRouter` only ever sees the
/// erased form, keeping this crate free of any particular message
/// catalogue.
pub trait ErasedHandler: Send + Sync {
	fn call(&self, params: Option<Value>) -> BoxFuture<Result<Value, DispatchError>>;
}

impl<F, Fut> ErasedHandler for F
where
	F: Fn(Option<Value>) -> Fut + Send + Sync,
	Fut: Future<Output = Result<Value, DispatchError>> + Send + 'static,
{
	fn call(&self, params: Option<Value>) -> BoxFuture<Result<Value, DispatchError>> {
		Box::pin((self)(params))
	}
}

/// A type-erased notification handler. Notifications have no response
/// to encode and no error channel back to the peer; a handler that
/// wants to report trouble does so through `tracing`.
pub trait ErasedNotificationHandler: Send + Sync {
	fn call(&self, params: Option<Value>) -> BoxFuture<()>;
}

impl<F, Fut> ErasedNotificationHandler for F
where
	F: Fn(Option<Value>) -> Fut + Send + Sync,
	Fut: Future<Output = ()> + Send + 'static,
{
	fn call(&self, params: Option<Value>) -> BoxFuture<()> {
		Box::pin((self)(params))
	}
}

/// The handler table: `method name -> handler wrapper`. Requests and
/// notifications are registered and looked up independently, since LSP
/// allows (and this workspace's test suite exercises) the same method
/// name serving different purposes depending on whether the peer sent
/// an id.
#[derive(Default)]
pub struct MethodRouter {
	requests: Mutex<HashMap<String, Arc<dyn ErasedHandler>>>,
	notifications: Mutex<HashMap<String, Arc<dyn ErasedNotificationHandler>>>,
}

impl MethodRouter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register_request(&self, method: impl Into<String>, handler: impl ErasedHandler + 'static) {
		self.requests.lock().insert(method.into(), Arc::new(handler));
	}

	pub fn register_notification(&self, method: impl Into<String>, handler: impl ErasedNotificationHandler + 'static) {
		self.notifications.lock().insert(method.into(), Arc::new(handler));
	}

	/// Removes any request handler bound to `method`. A no-op if none is
	/// bound.
	pub fn unregister_request(&self, method: &str) {
		self.requests.lock().remove(method);
	}

	/// Removes any notification handler bound to `method`.
	pub fn unregister_notification(&self, method: &str) {
		self.notifications.lock().remove(method);
	}

	/// Looks up and returns the handler future for `method`, or
	/// `MethodNotFound` if nothing is registered.
	pub fn dispatch_request(&self, method: &str, params: Option<Value>) -> Result<BoxFuture<Result<Value, DispatchError>>, DispatchError> {
		let handler = self
			.requests
			.lock()
			.get(method)
			.cloned()
			.ok_or_else(|| DispatchError::MethodNotFound(method.to_string()))?;
		Ok(handler.call(params))
	}

	/// Looks up and returns the handler future for a notification, or
	/// `None` if nothing is registered — per the routing algorithm,
	/// an unhandled notification is dropped silently, never an error.
	pub fn dispatch_notification(&self, method: &str, params: Option<Value>) -> Option<BoxFuture<()>> {
		self.notifications.lock().get(method).cloned().map(|handler| handler.call(params))
	}

	pub fn has_request_handler(&self, method: &str) -> bool {
		self.requests.lock().contains_key(method)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn dispatches_to_a_registered_request_handler() {
		let router = MethodRouter::new();
		router.register_request("ping", |_params| async { Ok(Value::String("pong".to_string())) });

		let result = router.dispatch_request("ping", None).unwrap().await;
		assert_eq!(result, Ok(Value::String("pong".to_string())));
	}

	#[tokio::test]
	async fn missing_request_handler_is_method_not_found() {
		let router = MethodRouter::new();
		let err = router.dispatch_request("missing", None).unwrap_err();
		assert_eq!(err, DispatchError::MethodNotFound("missing".to_string()));
	}

	#[tokio::test]
	async fn missing_notification_handler_is_silently_absent() {
		let router = MethodRouter::new();
		assert!(router.dispatch_notification("missing", None).is_none());
	}
}
