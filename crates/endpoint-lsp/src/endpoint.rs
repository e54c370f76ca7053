//! [`Endpoint`]: the client-or-server-role-agnostic façade over a
//! [`MainLoop`]/[`PeerSocket`] pair, giving callers typed
//! `register`/`send_request`/`send_notification` operations instead of
//! the untyped `method: &str` / [`Value`] ones `endpoint-rpc` exposes
//! directly.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use endpoint_json::Value;
use endpoint_rpc::{
	current_request_id as rpc_current_request_id, CounterIdGen, DispatchError, Error, MainLoop, MethodRouter, PeerSocket, Protocol, RequestError, ResponseError,
};
use endpoint_worker::WorkerPool;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tower_layer::Layer;

use crate::message::{FromJson, LspNotification, LspRequest, ToJson};
use crate::service::{RoutedService, TracingLayer};

/// Worker-pool sizing plus the one behavioral knob this library leaves to
/// the caller: what an inbound `exit` should do to the run loop. No
/// config-file format of its own — this is a library, embedded into
/// whatever configuration story its host process already has.
#[derive(Debug, Clone, Copy)]
pub struct EndpointConfig {
	/// Mirrors `endpoint-worker`'s `initial_threads` (kept for API parity,
	/// no pre-warming cost under tokio — see `endpoint-worker`'s doc
	/// comment on `WorkerPool::new`).
	pub initial_threads: usize,
	/// Mirrors `endpoint-worker`'s `max_threads`; defaults to host
	/// parallelism.
	pub max_threads: usize,
	/// Whether an inbound `exit` notification stops this endpoint's run
	/// loop once any handler registered for it has run. `true` by default:
	/// a server that never stops on `exit` leaves its caller no typed way
	/// to react to the end of a session.
	pub shutdown_on_exit: bool,
}

impl Default for EndpointConfig {
	fn default() -> Self {
		Self {
			initial_threads: 1,
			max_threads: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
			shutdown_on_exit: true,
		}
	}
}

/// The one concrete [`Protocol`] this workspace ships: ids are assigned
/// by a process-wide monotonic counter. Uniqueness only needs to hold
/// within a connection's lifetime, so nothing stronger is required.
#[derive(Debug, Default)]
pub struct JsonRpcProtocol;

impl Protocol for JsonRpcProtocol {
	type IdGen = CounterIdGen;
}

/// A handle to an in-flight outbound request. Resolves once the matching
/// response arrives, the connection tears down (a cancellation
/// [`ResponseError`]), or the dispatcher is dropped before either
/// happens. Keeps the assigned [`endpoint_rpc::Id`] around so the caller
/// can fold it into a `$/cancelRequest` notification without having to
/// track request ids itself.
pub struct RequestHandle<T> {
	id: endpoint_rpc::Id,
	rx: tokio::sync::oneshot::Receiver<Result<Value, ResponseError>>,
	_marker: PhantomData<fn() -> T>,
}

impl<T: FromJson> RequestHandle<T> {
	/// The id this request was sent with.
	pub fn id(&self) -> &endpoint_rpc::Id {
		&self.id
	}

	/// Awaits the response, decoding a successful result into `T`. A
	/// result that fails to decode against `T` is surfaced as an
	/// `INTERNAL_ERROR` `ResponseError`, since by this point the peer has
	/// already answered — there is no protocol-legal way to turn this
	/// back into an outbound error.
	pub async fn wait(self) -> Result<T, ResponseError> {
		match self.rx.await {
			Ok(Ok(value)) => T::from_json(value).map_err(|err| response_error_from_dispatch(err)),
			Ok(Err(err)) => Err(err),
			Err(_) => Err(ResponseError::new(
				endpoint_rpc::ErrorCode::REQUEST_CANCELLED,
				"the endpoint was dropped before a response arrived",
			)),
		}
	}
}

fn response_error_from_dispatch(err: DispatchError) -> ResponseError {
	err.into_response_error()
}

fn decode_params<T: FromJson>(raw: Option<Value>) -> Result<T, DispatchError> {
	T::from_json(raw.unwrap_or(Value::Null))
}

/// A client-or-server-role-agnostic LSP endpoint: owns the connection's
/// read loop (spawned onto the tokio runtime by [`Endpoint::new`]) and
/// exposes typed `register`/`send_request`/`send_notification` built on
/// top of `endpoint-rpc`'s untyped dispatcher.
pub struct Endpoint<P: Protocol = JsonRpcProtocol> {
	router: Arc<MethodRouter>,
	socket: PeerSocket<P>,
	run_handle: Option<JoinHandle<Result<(), Error>>>,
}

impl Endpoint<JsonRpcProtocol> {
	/// Builds an endpoint over `reader`/`writer` using the default
	/// [`JsonRpcProtocol`], spawning its run loop onto the current tokio
	/// runtime immediately.
	pub fn new<R, W>(reader: R, writer: W, config: EndpointConfig) -> Self
	where
		R: AsyncRead + Unpin + Send + 'static,
		W: AsyncWrite + Unpin + Send + 'static,
	{
		Self::with_protocol(reader, writer, config)
	}
}

impl<P: Protocol> Endpoint<P> {
	/// As [`Endpoint::new`], but generic over the [`Protocol`] (in
	/// practice only useful for substituting a different `IdGen` — ids
	/// need not be stable across process restarts, just unique within a
	/// connection, so a counter that resets on every run is legal).
	pub fn with_protocol<R, W>(reader: R, writer: W, config: EndpointConfig) -> Self
	where
		R: AsyncRead + Unpin + Send + 'static,
		W: AsyncWrite + Unpin + Send + 'static,
	{
		let router = Arc::new(MethodRouter::new());
		let worker_pool = WorkerPool::new(config.initial_threads, config.max_threads);
		let shutdown_on_exit = config.shutdown_on_exit;
		let router_for_service = router.clone();
		let pool_for_service = worker_pool.clone();

		let (main_loop, socket) = MainLoop::<P, _>::new(
			move |socket| {
				let routed = RoutedService::new(router_for_service, pool_for_service, socket, shutdown_on_exit);
				TracingLayer.layer(routed)
			},
			worker_pool,
		);

		let run_handle = tokio::spawn(main_loop.run(reader, writer));

		Endpoint {
			router,
			socket,
			run_handle: Some(run_handle),
		}
	}

	/// Binds `handler` to `M::METHOD`. Replacing an existing binding for
	/// the same method is allowed.
	pub fn register<M, F, Fut>(&self, handler: F)
	where
		M: LspRequest,
		F: Fn(M::Params) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<M::Result, RequestError>> + Send + 'static,
	{
		let handler = Arc::new(handler);
		self.router.register_request(M::METHOD, move |params: Option<Value>| {
			let handler = handler.clone();
			Box::pin(async move {
				let params = decode_params::<M::Params>(params)?;
				match handler(params).await {
					Ok(result) => Ok(result.to_json()),
					Err(request_error) => Err(DispatchError::Request(request_error)),
				}
			}) as endpoint_rpc::router::BoxFuture<Result<Value, DispatchError>>
		});
	}

	/// Binds `handler` to the notification `M::METHOD`.
	pub fn register_notification<M, F, Fut>(&self, handler: F)
	where
		M: LspNotification,
		F: Fn(M::Params) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let handler = Arc::new(handler);
		self.router.register_notification(M::METHOD, move |params: Option<Value>| {
			let handler = handler.clone();
			Box::pin(async move {
				match decode_params::<M::Params>(params) {
					Ok(params) => handler(params).await,
					Err(err) => tracing::debug!(method = M::METHOD, error = %err, "dropping malformed notification"),
				}
			}) as endpoint_rpc::router::BoxFuture<()>
		});
	}

	/// Unbinds any handler registered for `M::METHOD`.
	pub fn unregister<M: LspRequest>(&self) {
		self.router.unregister_request(M::METHOD);
	}

	/// Unbinds any notification handler registered for `M::METHOD`.
	pub fn unregister_notification<M: LspNotification>(&self) {
		self.router.unregister_notification(M::METHOD);
	}

	/// Sends a request and returns a handle resolved once the matching
	/// response arrives.
	pub fn send_request<M: LspRequest>(&self, params: M::Params) -> Result<RequestHandle<M::Result>, Error> {
		let (id, rx) = self.socket.send_request(M::METHOD, Some(params.to_json()))?;
		Ok(RequestHandle { id, rx, _marker: PhantomData })
	}

	/// Sends a request whose result or error is delivered by invoking
	/// `on_result`/`on_error` on the read task, instead of returning a
	/// [`RequestHandle`] the caller awaits. Still returns the assigned id
	/// for cancellation. Exactly one of the two callbacks runs, so both
	/// are stashed behind the same `Mutex<Option<_>>` rather than each
	/// owning its own copy of `on_error`.
	pub fn send_request_with_callback<M, R, E>(&self, params: M::Params, on_result: R, on_error: E) -> Result<endpoint_rpc::Id, Error>
	where
		M: LspRequest,
		R: FnOnce(M::Result) + Send + 'static,
		E: FnOnce(ResponseError) + Send + 'static,
	{
		let on_error = Arc::new(std::sync::Mutex::new(Some(on_error)));
		let on_error_for_decode_failure = on_error.clone();
		self.socket.send_request_with_callback(
			M::METHOD,
			Some(params.to_json()),
			move |value| match M::Result::from_json(value) {
				Ok(result) => on_result(result),
				Err(err) => {
					if let Some(on_error) = on_error_for_decode_failure.lock().unwrap().take() {
						on_error(response_error_from_dispatch(err));
					}
				}
			},
			move |err| {
				if let Some(on_error) = on_error.lock().unwrap().take() {
					on_error(err);
				}
			},
		)
	}

	/// Sends a one-way notification; never produces a response.
	pub fn send_notification<M: LspNotification>(&self, params: M::Params) -> Result<(), Error> {
		self.socket.send_notification(M::METHOD, Some(params.to_json()))
	}

	/// The number of outbound requests awaiting a response.
	pub fn pending_request_count(&self) -> usize {
		self.socket.pending_count()
	}

	/// Requests an orderly shutdown of the run loop: stop accepting new
	/// sends, cancel pending waiters, drain the worker pool, close the
	/// transport.
	pub fn shutdown(&self) {
		self.socket.shutdown();
	}

	/// Waits for the run loop to finish (normally, via `shutdown`, or
	/// because the peer disconnected or a handler requested `exit`).
	pub async fn join(mut self) -> Result<(), Error> {
		match self.run_handle.take() {
			Some(handle) => handle.await.map_err(|_| Error::Disconnected)?,
			None => Ok(()),
		}
	}
}

/// The id of the request currently being serviced by the calling task,
/// or `None` if the caller is servicing a notification or is outside any
/// handler invocation.
pub fn current_request_id() -> Option<endpoint_rpc::Id> {
	rpc_current_request_id()
}
