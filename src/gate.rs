use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Fixed-capacity admission gate with in-flight accounting.
///
/// Cloning shares the same underlying permits.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
	inner: Arc<GateInner>,
}

#[derive(Debug)]
struct GateInner {
	semaphore: Arc<Semaphore>,
	capacity: usize,
	in_flight: AtomicUsize,
	peak: AtomicUsize,
}

impl ConcurrencyGate {
	/// Create a gate admitting at most `capacity` holders at once (minimum 1).
	pub fn new(capacity: usize) -> Self {
		let capacity = capacity.max(1);
		ConcurrencyGate {
			inner: Arc::new(GateInner {
				semaphore: Arc::new(Semaphore::new(capacity)),
				capacity,
				in_flight: AtomicUsize::new(0),
				peak: AtomicUsize::new(0),
			}),
		}
	}

	/// Wait for a free slot. The slot is released when the permit is dropped.
	pub async fn acquire(&self) -> Result<GatePermit, AcquireError> {
		let permit = self.inner.semaphore.clone().acquire_owned().await?;
		let in_flight = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
		debug_assert!(
			in_flight <= self.inner.capacity,
			"gate admitted {} holders with capacity {}",
			in_flight,
			self.inner.capacity
		);
		self.inner.peak.fetch_max(in_flight, Ordering::SeqCst);
		Ok(GatePermit {
			inner: self.inner.clone(),
			_permit: permit,
		})
	}

	pub fn capacity(&self) -> usize {
		self.inner.capacity
	}

	pub fn in_flight(&self) -> usize {
		self.inner.in_flight.load(Ordering::SeqCst)
	}

	/// Highest number of simultaneous holders seen so far
	pub fn peak(&self) -> usize {
		self.inner.peak.load(Ordering::SeqCst)
	}
}

/// Held slot of a `ConcurrencyGate`.
#[derive(Debug)]
pub struct GatePermit {
	inner: Arc<GateInner>,
	_permit: OwnedSemaphorePermit,
}

impl Drop for GatePermit {
	fn drop(&mut self) {
		// Runs before the semaphore permit field is dropped, so the count
		// never exceeds capacity while a waiter is being admitted
		let previous = self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
		debug_assert!(previous > 0, "gate released more permits than it granted");
	}
}
