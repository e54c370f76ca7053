//! The JSON-RPC 2.0 envelope and bidirectional message dispatcher that
//! sits between a framed byte transport ([`endpoint_transport`]) and a
//! typed per-message façade (`endpoint-lsp`).
//!
//! [`jsonrpc`] discriminates requests, notifications, responses and
//! batches and carries the standard/LSP-reserved error codes. [`mainloop`]
//! owns the read loop, the pending-request table, and the worker-pool
//! dispatch of async handlers; [`router`] is the untyped method-name
//! handler table a typed façade adapts into.

pub mod error;
pub mod id;
pub mod jsonrpc;
pub mod mainloop;
pub mod pending;
pub mod router;

pub use error::{DispatchError, Error, RequestError};
pub use id::{CounterIdGen, IdGenerator};
pub use jsonrpc::{Batch, ErrorCode, Id, Message, Notification, ProtocolError, Request, Response, ResponseError, ResponseOutcome};
pub use mainloop::{current_request_id, AnyEvent, AnyNotification, AnyRequest, MainLoop, PeerSocket, Protocol, RpcService};
pub use pending::PendingTable;
pub use router::{ErasedHandler, ErasedNotificationHandler, MethodRouter};
