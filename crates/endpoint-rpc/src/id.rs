use std::sync::atomic::{AtomicI64, Ordering};

use crate::jsonrpc::Id;

/// Generates fresh ids for outbound requests. Only uniqueness within a
/// connection's lifetime is required, not any particular shape, so the
/// default generator is a monotonic counter (mirroring the donor's
/// `xeno_rpc::CounterIdGen`).
pub trait IdGenerator: Send + Sync {
	fn next_id(&self) -> Id;
}

#[derive(Debug, Default)]
pub struct CounterIdGen {
	next: AtomicI64,
}

impl IdGenerator for CounterIdGen {
	fn next_id(&self) -> Id {
		Id::Integer(self.next.fetch_add(1, Ordering::SeqCst))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ids_are_unique_and_increasing() {
		let gen = CounterIdGen::default();
		let a = gen.next_id();
		let b = gen.next_id();
		assert_ne!(a, b);
		assert_eq!(a, Id::Integer(0));
		assert_eq!(b, Id::Integer(1));
	}
}
