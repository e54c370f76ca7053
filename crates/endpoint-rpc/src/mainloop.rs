//! The bidirectional message dispatcher: owns the connection's read
//! loop, routes inbound messages to a user-supplied [`RpcService`], and
//! multiplexes outbound writes (responses, requests, notifications)
//! through a single writer task via [`PeerSocket`].
//!
//! Modeled directly on the donor's `xeno_rpc::{MainLoop, PeerSocket,
//! Protocol, RpcService}` quartet: a service factory closure receives
//! its own outbound socket before the service is built, because a
//! service needs to be able to push notifications unprompted (not just
//! answer requests).

use std::any::Any;
use std::marker::PhantomData;
use std::ops::ControlFlow;
use std::sync::Arc;

use endpoint_json::Value;
use endpoint_worker::{TaskClass, WorkerPool};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tower_service::Service;

use crate::error::{DispatchError, Error};
use crate::id::IdGenerator;
use crate::jsonrpc::{self, Batch, Id, Message, Request, Response, ResponseError, ResponseOutcome};
use crate::pending::PendingTable;

tokio::task_local! {
	static CURRENT_REQUEST_ID: Option<Id>;
}

/// The id of the request currently being handled by the calling task, if
/// any. Valid only during a handler invocation (carried via
/// `tokio::task_local!`, the async substitute for the donor's real
/// `thread_local` — see the crate-level design notes on why a task-local
/// is the correct substitution once handlers run on tokio tasks rather
/// than dedicated OS threads).
pub fn current_request_id() -> Option<Id> {
	CURRENT_REQUEST_ID.try_with(|id| id.clone()).unwrap_or(None)
}

/// An untyped inbound request, handed to a connection's [`RpcService`].
#[derive(Debug, Clone)]
pub struct AnyRequest {
	pub method: String,
	pub params: Option<Value>,
}

/// An untyped inbound notification.
#[derive(Debug, Clone)]
pub struct AnyNotification {
	pub method: String,
	pub params: Option<Value>,
}

/// A type-erased event injected into a running connection from outside
/// the wire (a timer tick, a child process exiting, ...), delivered to
/// [`RpcService::emit`].
pub struct AnyEvent(Box<dyn Any + Send>);

impl AnyEvent {
	pub fn new<T: Any + Send>(event: T) -> Self {
		AnyEvent(Box::new(event))
	}

	pub fn downcast<T: Any>(self) -> Result<T, Self> {
		match self.0.downcast::<T>() {
			Ok(value) => Ok(*value),
			Err(boxed) => Err(AnyEvent(boxed)),
		}
	}
}

/// Ties together the pieces a connection needs beyond the wire format
/// itself: how ids are generated. This workspace ships exactly one wire
/// format (JSON-RPC 2.0 over `endpoint_json::Value`), so unlike the
/// donor's fully wire-generic `Protocol` trait, this one only abstracts
/// over id generation; `endpoint-lsp::JsonRpcProtocol` is its sole
/// implementation.
pub trait Protocol: Send + Sync + 'static {
	type IdGen: IdGenerator + Default + Send + Sync + 'static;
}

/// The per-connection service a [`MainLoop`] dispatches into. Extends
/// `tower_service::Service<AnyRequest>` (the request/response half) with
/// `notify`/`emit` for the two kinds of messages that never produce a
/// response: inbound notifications and internally injected events.
///
/// `notify`/`emit` are synchronous and return `ControlFlow` rather than
/// a future: a service that needs to do async work in response spawns it
/// itself (typically onto the connection's [`WorkerPool`]) and returns
/// `Continue` immediately; returning `Break` stops the run loop, `Ok`
/// for a graceful stop (e.g. handling `exit`), `Err` for a fatal one.
pub trait RpcService<P: Protocol>: Service<AnyRequest, Response = Value, Error = DispatchError> {
	fn notify(&mut self, notification: AnyNotification) -> ControlFlow<Result<(), Error>>;

	fn emit(&mut self, event: AnyEvent) -> ControlFlow<Result<(), Error>> {
		let _ = event;
		ControlFlow::Continue(())
	}
}

enum OutboundEvent {
	Message(Value),
	Shutdown,
}

/// The cheap, cloneable send-handle given to a connection's service (and
/// to anything else that needs to talk back to the peer: send a
/// notification, issue a request and await its response, or inject an
/// event into the run loop).
pub struct PeerSocket<P: Protocol> {
	outgoing: mpsc::UnboundedSender<OutboundEvent>,
	events: mpsc::UnboundedSender<AnyEvent>,
	pending: Arc<PendingTable>,
	id_gen: Arc<P::IdGen>,
}

impl<P: Protocol> Clone for PeerSocket<P> {
	fn clone(&self) -> Self {
		Self {
			outgoing: self.outgoing.clone(),
			events: self.events.clone(),
			pending: self.pending.clone(),
			id_gen: self.id_gen.clone(),
		}
	}
}

impl<P: Protocol> PeerSocket<P> {
	pub fn send_notification(&self, method: impl Into<String>, params: Option<Value>) -> Result<(), Error> {
		let message = jsonrpc::encode_request(&Request {
			id: None,
			method: method.into(),
			params,
		});
		self.outgoing
			.send(OutboundEvent::Message(message))
			.map_err(|_| Error::Disconnected)
	}

	/// Sends a request and returns the id it was assigned alongside a
	/// receiver resolved once the matching response arrives (or the
	/// connection tears down, in which case it resolves to a
	/// `REQUEST_CANCELLED` error). The caller keeps the id to correlate a
	/// later `$/cancelRequest` notification with this request.
	pub fn send_request(
		&self,
		method: impl Into<String>,
		params: Option<Value>,
	) -> Result<(Id, oneshot::Receiver<Result<Value, ResponseError>>), Error> {
		let id = self.id_gen.next_id();
		let (tx, rx) = oneshot::channel();
		self.pending.insert(id.clone(), tx);

		let message = jsonrpc::encode_request(&Request {
			id: Some(id.clone()),
			method: method.into(),
			params,
		});

		if self.outgoing.send(OutboundEvent::Message(message)).is_err() {
			self.pending.complete(
				&id,
				Err(ResponseError::new(crate::jsonrpc::ErrorCode::REQUEST_CANCELLED, "connection is closed")),
			);
			return Err(Error::Disconnected);
		}

		Ok((id, rx))
	}

	/// Sends a request whose response is delivered by invoking `on_result`
	/// or `on_error` directly from the read task that received it, rather
	/// than through a receiver the caller has to await. Returns the id the
	/// request was assigned.
	pub fn send_request_with_callback<R, E>(&self, method: impl Into<String>, params: Option<Value>, on_result: R, on_error: E) -> Result<Id, Error>
	where
		R: FnOnce(Value) + Send + 'static,
		E: FnOnce(ResponseError) + Send + 'static,
	{
		let id = self.id_gen.next_id();
		let callback: Box<dyn FnOnce(Result<Value, ResponseError>) + Send> = Box::new(move |outcome| match outcome {
			Ok(value) => on_result(value),
			Err(err) => on_error(err),
		});
		self.pending.insert_callback(id.clone(), callback);

		let message = jsonrpc::encode_request(&Request {
			id: Some(id.clone()),
			method: method.into(),
			params,
		});

		if self.outgoing.send(OutboundEvent::Message(message)).is_err() {
			self.pending.complete(
				&id,
				Err(ResponseError::new(crate::jsonrpc::ErrorCode::REQUEST_CANCELLED, "connection is closed")),
			);
			return Err(Error::Disconnected);
		}

		Ok(id)
	}

	/// Injects an event into the run loop, delivered to the service's
	/// `emit`. Used for timer ticks, child-process exit notifications,
	/// and similar internally-sourced events that are not part of the
	/// wire protocol.
	pub fn emit(&self, event: AnyEvent) -> Result<(), Error> {
		self.events.send(event).map_err(|_| Error::Disconnected)
	}

	/// Requests an orderly shutdown of the run loop.
	pub fn shutdown(&self) {
		let _ = self.outgoing.send(OutboundEvent::Shutdown);
	}

	pub fn pending_count(&self) -> usize {
		self.pending.len()
	}
}

/// Owns the read loop and the service that answers it. Built via
/// [`MainLoop::new`], which hands the caller both the loop (to `run`
/// once a byte stream is available) and the [`PeerSocket`] the service
/// was itself built from, so callers can send requests/notifications
/// using the exact same pending table and id generator the run loop
/// drains responses against.
pub struct MainLoop<P: Protocol, S> {
	service: S,
	outgoing_tx: mpsc::UnboundedSender<OutboundEvent>,
	outgoing_rx: mpsc::UnboundedReceiver<OutboundEvent>,
	events_rx: mpsc::UnboundedReceiver<AnyEvent>,
	pending: Arc<PendingTable>,
	worker_pool: WorkerPool,
	/// Set by a notification handler that returned `ControlFlow::Break`
	/// (typically `exit`); checked after every iteration of `run`'s
	/// select loop since a plain synchronous return can't break out of
	/// the surrounding `select!` on its own.
	stop_requested: Option<Result<(), Error>>,
	_protocol: PhantomData<P>,
}

impl<P: Protocol, S> MainLoop<P, S>
where
	S: RpcService<P> + Send + 'static,
	S::Future: Send + 'static,
{
	/// Builds the pending table, id generator, and [`PeerSocket`] up
	/// front, then constructs the service from a factory that receives a
	/// clone of that socket — exactly `xeno_rpc::MainLoop::new(|socket|
	/// Service::new(socket), protocol, id_gen)`.
	pub fn new<F>(make_service: F, worker_pool: WorkerPool) -> (Self, PeerSocket<P>)
	where
		F: FnOnce(PeerSocket<P>) -> S,
	{
		let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let pending = Arc::new(PendingTable::new());
		let id_gen = Arc::new(P::IdGen::default());

		let socket = PeerSocket {
			outgoing: outgoing_tx,
			events: events_tx,
			pending: pending.clone(),
			id_gen,
		};

		let service = make_service(socket.clone());

		let main_loop = MainLoop {
			service,
			outgoing_tx: socket.outgoing.clone(),
			outgoing_rx,
			events_rx,
			pending,
			worker_pool,
			stop_requested: None,
			_protocol: PhantomData,
		};

		(main_loop, socket)
	}

	/// Drives the connection to completion: reads inbound messages from
	/// `reader`, routes them, and writes every outbound message queued
	/// through the paired [`PeerSocket`] to `writer`, until the peer
	/// disconnects, the service asks to stop, or an explicit
	/// `PeerSocket::shutdown()` call fires. A message whose body is not
	/// valid JSON gets a `PARSE_ERROR` response with a `null` id and the
	/// loop continues; every other framing failure ends the connection.
	pub async fn run<R, W>(mut self, mut reader: R, mut writer: W) -> Result<(), Error>
	where
		R: AsyncRead + Unpin + Send,
		W: AsyncWrite + Unpin + Send,
	{
		let result = loop {
			tokio::select! {
				biased;

				outbound = self.outgoing_rx.recv() => {
					match outbound {
						Some(OutboundEvent::Message(value)) => {
							if let Err(err) = endpoint_transport::write_message(&mut writer, &value).await {
								break Err(err.into());
							}
						}
						Some(OutboundEvent::Shutdown) | None => break Ok(()),
					}
				}

				event = self.events_rx.recv() => {
					if let Some(event) = event {
						match self.service.emit(event) {
							ControlFlow::Continue(()) => {}
							ControlFlow::Break(outcome) => break outcome,
						}
					}
				}

				inbound = endpoint_transport::read_message(&mut reader) => {
					match inbound {
						Ok(value) => {
							if let Err(err) = self.route_inbound(value, &mut writer).await {
								break Err(err);
							}
							if let Some(outcome) = self.stop_requested.take() {
								break outcome;
							}
						}
						Err(endpoint_transport::FramingError::ConnectionLost) => break Ok(()),
						Err(endpoint_transport::FramingError::Json(parse_error)) => {
							tracing::debug!(%parse_error, "dropping malformed JSON body");
							let response = Response {
								id: Id::Null,
								outcome: ResponseOutcome::Error(ResponseError::new(
									crate::jsonrpc::ErrorCode::PARSE_ERROR,
									parse_error.to_string(),
								)),
							};
							if let Err(err) = endpoint_transport::write_message(&mut writer, &jsonrpc::encode_response(&response)).await {
								break Err(err.into());
							}
						}
						Err(err) => break Err(err.into()),
					}
				}
			}
		};

		self.pending.cancel_all();
		self.worker_pool.drain().await;
		result
	}

	async fn route_inbound<W>(&mut self, value: Value, writer: &mut W) -> Result<(), Error>
	where
		W: AsyncWrite + Unpin + Send,
	{
		let message = jsonrpc::decode(value);
		match message {
			Ok(Message::Request(request)) => self.route_request(request).await,
			Ok(Message::Response(response)) => {
				self.route_response(response);
				Ok(())
			}
			Ok(Message::Batch(Batch::Requests(requests))) => {
				let mut responses = Vec::new();
				for request in requests {
					if request.id.is_some() {
						if let Some(response) = self.handle_request(request).await {
							responses.push(response);
						}
					} else {
						self.route_notification(request);
					}
				}
				if !responses.is_empty() {
					let value = jsonrpc::encode_batch(&Batch::Responses(responses));
					endpoint_transport::write_message(writer, &value).await?;
				}
				Ok(())
			}
			Ok(Message::Batch(Batch::Responses(responses))) => {
				for response in responses {
					self.route_response(response);
				}
				Ok(())
			}
			Err(protocol_error) => {
				tracing::debug!(%protocol_error, "dropping malformed JSON-RPC message");
				match protocol_error.known_id() {
					Some(id) => {
						let response = Response {
							id,
							outcome: ResponseOutcome::Error(ResponseError::new(crate::jsonrpc::ErrorCode::INVALID_REQUEST, protocol_error.to_string())),
						};
						endpoint_transport::write_message(writer, &jsonrpc::encode_response(&response)).await?;
						Ok(())
					}
					None => Ok(()),
				}
			}
		}
	}

	/// Routes a single top-level (non-batch) request. Dispatch is handed
	/// to the worker pool and the response, once ready, is pushed back
	/// through the same outbound channel [`PeerSocket`] writes through —
	/// `route_request` itself never awaits completion, so a slow handler
	/// never stalls the read loop or any other in-flight request, and
	/// responses may complete out of arrival order. This does not apply to
	/// requests nested in a batch (see `route_inbound`'s `Batch::Requests`
	/// arm), which must answer together in one combined response.
	async fn route_request(&mut self, request: Request) -> Result<(), Error> {
		match request.id.clone() {
			Some(id) => {
				if let Err(poll_err) = std::future::poll_fn(|cx| self.service.poll_ready(cx)).await {
					let response = Response {
						id,
						outcome: ResponseOutcome::Error(poll_err.into_response_error()),
					};
					let _ = self.outgoing_tx.send(OutboundEvent::Message(jsonrpc::encode_response(&response)));
					return Ok(());
				}

				let future = self.service.call(AnyRequest {
					method: request.method,
					params: request.params,
				});
				let scoped = CURRENT_REQUEST_ID.scope(Some(id.clone()), future);
				let rx = self.worker_pool.submit(TaskClass::Interactive, scoped);
				let outgoing_tx = self.outgoing_tx.clone();

				tokio::spawn(async move {
					let response = match rx.await {
						Ok(Ok(outcome)) => Response {
							id,
							outcome: match outcome {
								Ok(value) => ResponseOutcome::Result(value),
								Err(dispatch_err) => ResponseOutcome::Error(dispatch_err.into_response_error()),
							},
						},
						Ok(Err(pool_err)) => Response {
							id,
							outcome: ResponseOutcome::Error(ResponseError::new(crate::jsonrpc::ErrorCode::INTERNAL_ERROR, pool_err.to_string())),
						},
						Err(_) => return,
					};
					let _ = outgoing_tx.send(OutboundEvent::Message(jsonrpc::encode_response(&response)));
				});

				Ok(())
			}
			None => {
				self.route_notification(request);
				Ok(())
			}
		}
	}

	/// Invokes the service for a single request with an id, returning the
	/// [`Response`] to write back once every request in the batch it
	/// belongs to has completed. Used only from the `Batch::Requests` arm
	/// of `route_inbound`, which answers a batch as one combined response
	/// rather than streaming each member's reply as it completes.
	async fn handle_request(&mut self, request: Request) -> Option<Response> {
		let id = request.id.clone().expect("handle_request called with a notification");

		if let Err(poll_err) = std::future::poll_fn(|cx| self.service.poll_ready(cx)).await {
			return Some(Response {
				id,
				outcome: ResponseOutcome::Error(poll_err.into_response_error()),
			});
		}

		let future = self.service.call(AnyRequest {
			method: request.method,
			params: request.params,
		});

		let scoped = CURRENT_REQUEST_ID.scope(Some(id.clone()), future);
		let rx = self.worker_pool.submit(TaskClass::Interactive, scoped);

		match rx.await {
			Ok(Ok(outcome)) => Some(Response {
				id,
				outcome: match outcome {
					Ok(value) => ResponseOutcome::Result(value),
					Err(dispatch_err) => ResponseOutcome::Error(dispatch_err.into_response_error()),
				},
			}),
			Ok(Err(pool_err)) => Some(Response {
				id,
				outcome: ResponseOutcome::Error(ResponseError::new(
					crate::jsonrpc::ErrorCode::INTERNAL_ERROR,
					pool_err.to_string(),
				)),
			}),
			Err(_) => None,
		}
	}

	/// Routes an inbound notification to the service. A `ControlFlow::Break`
	/// (typically returned for `exit`) is stashed in `stop_requested`
	/// rather than acted on here, since this method runs underneath
	/// `route_inbound`'s `&mut self` borrow inside `run`'s select loop and
	/// cannot break out of that loop directly; `run` checks and acts on it
	/// immediately after `route_inbound` returns.
	fn route_notification(&mut self, notification: Request) {
		debug_assert!(notification.id.is_none());
		let outcome = self.service.notify(AnyNotification {
			method: notification.method,
			params: notification.params,
		});
		if let ControlFlow::Break(outcome) = outcome {
			tracing::debug!("notification handler requested shutdown");
			self.stop_requested = Some(outcome);
		}
	}

	fn route_response(&mut self, response: Response) {
		let outcome = match response.outcome {
			ResponseOutcome::Result(value) => Ok(value),
			ResponseOutcome::Error(err) => Err(err),
		};
		self.pending.complete(&response.id, outcome);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::id::CounterIdGen;
	use endpoint_json::Object;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use tokio::io::duplex;

	#[derive(Default)]
	struct TestProtocol;
	impl Protocol for TestProtocol {
		type IdGen = CounterIdGen;
	}

	struct EchoService {
		notified: Arc<AtomicUsize>,
	}

	impl Service<AnyRequest> for EchoService {
		type Response = Value;
		type Error = DispatchError;
		type Future = BoxFutureResult;

		fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
			std::task::Poll::Ready(Ok(()))
		}

		fn call(&mut self, req: AnyRequest) -> Self::Future {
			Box::pin(async move {
				match req.method.as_str() {
					"echo" => Ok(req.params.unwrap_or(Value::Null)),
					"fail" => Err(DispatchError::Internal("boom".to_string())),
					other => Err(DispatchError::MethodNotFound(other.to_string())),
				}
			})
		}
	}

	type BoxFutureResult = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Value, DispatchError>> + Send>>;

	impl RpcService<TestProtocol> for EchoService {
		fn notify(&mut self, _notification: AnyNotification) -> ControlFlow<Result<(), Error>> {
			self.notified.fetch_add(1, Ordering::SeqCst);
			ControlFlow::Continue(())
		}
	}

	fn request_value(id: i64, method: &str, params: Value) -> Value {
		let mut object = Object::new();
		object.insert("jsonrpc", Value::String("2.0".to_string()));
		object.insert("id", Value::Integer(id));
		object.insert("method", Value::String(method.to_string()));
		object.insert("params", params);
		Value::Object(object)
	}

	#[tokio::test]
	async fn round_trips_a_request_through_the_run_loop() {
		let (client, server) = duplex(8192);
		let (read_half, mut write_half) = tokio::io::split(server);
		let notified = Arc::new(AtomicUsize::new(0));
		let pool = WorkerPool::new(1, 4);

		let (main_loop, socket) = MainLoop::<TestProtocol, _>::new(
			|_socket| EchoService { notified: notified.clone() },
			pool,
		);

		let run_handle = tokio::spawn(main_loop.run(read_half, write_half));

		let (mut client_read, mut client_write) = tokio::io::split(client);
		endpoint_transport::write_message(&mut client_write, &request_value(1, "echo", Value::Integer(42)))
			.await
			.unwrap();

		let response = endpoint_transport::read_message(&mut client_read).await.unwrap();
		let object = response.as_object().unwrap();
		assert_eq!(object.get("result"), Some(&Value::Integer(42)));

		socket.shutdown();
		run_handle.await.unwrap().unwrap();
	}

	#[tokio::test]
	async fn unknown_method_is_method_not_found() {
		let (client, server) = duplex(8192);
		let (read_half, write_half) = tokio::io::split(server);
		let notified = Arc::new(AtomicUsize::new(0));
		let pool = WorkerPool::new(1, 4);

		let (main_loop, socket) = MainLoop::<TestProtocol, _>::new(
			|_socket| EchoService { notified: notified.clone() },
			pool,
		);
		let run_handle = tokio::spawn(main_loop.run(read_half, write_half));

		let (mut client_read, mut client_write) = tokio::io::split(client);
		endpoint_transport::write_message(&mut client_write, &request_value(1, "nope", Value::Null))
			.await
			.unwrap();

		let response = endpoint_transport::read_message(&mut client_read).await.unwrap();
		let object = response.as_object().unwrap();
		let error = object.get("error").unwrap().as_object().unwrap();
		assert_eq!(error.get("code"), Some(&Value::Integer(-32601)));

		socket.shutdown();
		run_handle.await.unwrap().unwrap();
	}
}
