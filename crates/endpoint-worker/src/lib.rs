//! Bounded worker pool used to run async handler continuations and
//! blocking callbacks off whatever task is driving the transport's read
//! loop, so a slow handler never stalls the next incoming message.

mod error;
mod pool;

pub use error::PoolError;
pub use pool::{TaskClass, WorkerPool};
