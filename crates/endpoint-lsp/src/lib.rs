//! A typed per-message façade over [`endpoint_rpc`]'s untyped JSON-RPC
//! dispatcher: [`message`] defines the `LspMessage`/`LspRequest`/
//! `LspNotification` descriptor traits, [`messages`] is a representative
//! hand-written slice of the LSP message catalogue built on them,
//! [`service`] is the one concrete `RpcService` this workspace ships
//! (plus its tracing middleware), and [`endpoint`] ties all three
//! together into [`Endpoint`], the type most callers build directly.

pub mod endpoint;
pub mod message;
pub mod messages;
pub mod service;

pub use endpoint::{current_request_id, Endpoint, EndpointConfig, JsonRpcProtocol, RequestHandle};
pub use message::{Direction, FromJson, Kind, LspMessage, LspNotification, LspRequest, ToJson};
pub use service::{RoutedService, TracingLayer, TracingService};
