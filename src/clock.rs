//! Monotonic time source. The queue never reads the wall clock directly so
//! that block-timeout behavior (spec.md §4.5) is deterministically testable;
//! grounded in the teacher's own use of `std::time::Instant` for a session's
//! `stream_start_time` (`moonshine/src/session/stream/audio/encoder.rs`).

pub trait MonotonicClock {
	/// Milliseconds since some arbitrary, monotonic epoch fixed at construction.
	fn now_ms(&self) -> u64;
}

pub struct SystemClock {
	start: std::time::Instant,
}

impl SystemClock {
	pub fn new() -> Self {
		Self { start: std::time::Instant::now() }
	}
}

impl Default for SystemClock {
	fn default() -> Self {
		Self::new()
	}
}

impl MonotonicClock for SystemClock {
	fn now_ms(&self) -> u64 {
		self.start.elapsed().as_millis() as u64
	}
}

/// Deterministic clock for tests: time only moves when told to. Shares its
/// cell across clones so a test can hold a handle and keep advancing it after
/// a clone has been moved into a [`crate::FecQueue`].
#[derive(Clone)]
pub struct FakeClock {
	now_ms: std::rc::Rc<std::cell::Cell<u64>>,
}

impl FakeClock {
	pub fn new() -> Self {
		Self { now_ms: std::rc::Rc::new(std::cell::Cell::new(0)) }
	}

	pub fn advance(&self, delta_ms: u64) {
		self.now_ms.set(self.now_ms.get() + delta_ms);
	}
}

impl Default for FakeClock {
	fn default() -> Self {
		Self::new()
	}
}

impl MonotonicClock for FakeClock {
	fn now_ms(&self) -> u64 {
		self.now_ms.get()
	}
}
