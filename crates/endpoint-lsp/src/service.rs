//! The one concrete [`RpcService`] this workspace ships: a service that
//! dispatches every inbound request/notification through a shared
//! [`MethodRouter`], plus a small `tower_layer::Layer` that wraps it with
//! request/notification tracing, used the way
//! `broker/broker/src/service.rs` builds one `RpcService` per connection
//! rather than one per registered method.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::task::{Context, Poll};

use endpoint_json::Value;
use endpoint_rpc::router::BoxFuture;
use endpoint_rpc::{AnyEvent, AnyNotification, AnyRequest, DispatchError, Error, MethodRouter, PeerSocket, Protocol, RpcService};
use endpoint_worker::{TaskClass, WorkerPool};
use tower_layer::Layer;
use tower_service::Service;

/// Backs a connection's [`endpoint_rpc::MainLoop`]: requests are looked
/// up in `router` and invoked inline (the future runs on the worker pool
/// once `MainLoop::handle_request` submits it); notifications are looked
/// up and, if bound, submitted to `worker_pool` directly since nothing
/// downstream awaits their result.
pub struct RoutedService<P: Protocol> {
	router: Arc<MethodRouter>,
	worker_pool: WorkerPool,
	shutdown_on_exit: bool,
	_socket: PeerSocket<P>,
}

impl<P: Protocol> RoutedService<P> {
	pub(crate) fn new(router: Arc<MethodRouter>, worker_pool: WorkerPool, socket: PeerSocket<P>, shutdown_on_exit: bool) -> Self {
		Self {
			router,
			worker_pool,
			shutdown_on_exit,
			_socket: socket,
		}
	}
}

impl<P: Protocol> Service<AnyRequest> for RoutedService<P> {
	type Response = Value;
	type Error = DispatchError;
	type Future = BoxFuture<Result<Value, DispatchError>>;

	fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		Poll::Ready(Ok(()))
	}

	fn call(&mut self, req: AnyRequest) -> Self::Future {
		match self.router.dispatch_request(&req.method, req.params) {
			Ok(future) => future,
			Err(err) => Box::pin(async move { Err(err) }),
		}
	}
}

impl<P: Protocol> RpcService<P> for RoutedService<P> {
	/// `exit` is the one method this workspace's façade treats specially,
	/// giving callers a typed exit/shutdown conduit: if a handler is
	/// registered for it, that handler still runs, but regardless of
	/// whether one is registered the run loop is asked to stop once
	/// `shutdown_on_exit` is set (see [`crate::endpoint::EndpointConfig`]).
	fn notify(&mut self, notification: AnyNotification) -> ControlFlow<Result<(), Error>> {
		let is_exit = self.shutdown_on_exit && notification.method == "exit";

		if let Some(future) = self.router.dispatch_notification(&notification.method, notification.params) {
			let _ = self.worker_pool.submit(TaskClass::Interactive, future);
		}

		if is_exit {
			ControlFlow::Break(Ok(()))
		} else {
			ControlFlow::Continue(())
		}
	}

	fn emit(&mut self, event: AnyEvent) -> ControlFlow<Result<(), Error>> {
		let _ = event;
		ControlFlow::Continue(())
	}
}

/// A `tower_layer::Layer` that wraps any `Service<AnyRequest>` with
/// `tracing::debug!` spans around dispatch, matching the donor's general
/// practice of instrumenting the service seam (e.g.
/// `broker/lib/src/services/routing/service.rs`) rather than each
/// individual handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLayer;

impl<S> Layer<S> for TracingLayer {
	type Service = TracingService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		TracingService { inner }
	}
}

pub struct TracingService<S> {
	inner: S,
}

impl<S> Service<AnyRequest> for TracingService<S>
where
	S: Service<AnyRequest, Response = Value, Error = DispatchError>,
	S::Future: Send + 'static,
{
	type Response = Value;
	type Error = DispatchError;
	type Future = BoxFuture<Result<Value, DispatchError>>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, req: AnyRequest) -> Self::Future {
		let method = req.method.clone();
		let span = tracing::debug_span!("lsp_request", method = %method);
		let future = {
			let _enter = span.enter();
			self.inner.call(req)
		};
		Box::pin(async move {
			let result = future.await;
			match &result {
				Ok(_) => tracing::debug!(method = %method, "request handled"),
				Err(err) => tracing::debug!(method = %method, error = %err, "request failed"),
			}
			result
		})
	}
}

impl<P, S> RpcService<P> for TracingService<S>
where
	P: Protocol,
	S: RpcService<P>,
	S::Future: Send + 'static,
{
	fn notify(&mut self, notification: AnyNotification) -> ControlFlow<Result<(), Error>> {
		let method = notification.method.clone();
		let outcome = self.inner.notify(notification);
		tracing::debug!(method = %method, "notification handled");
		outcome
	}

	fn emit(&mut self, event: AnyEvent) -> ControlFlow<Result<(), Error>> {
		self.inner.emit(event)
	}
}
