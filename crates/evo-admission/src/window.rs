use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A timestamp queue pruned to `window`, used for both the per-source and
/// the global rate checks. Grounded directly on
/// `file_host::rate_limiter::sliding_window::SlidingWindowRateLimiter`.
pub struct SlidingWindow {
	max_requests: u32,
	window: Duration,
	timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindow {
	#[must_use]
	pub fn new(max_requests: u32, window: Duration) -> Self {
		Self { max_requests, window, timestamps: Mutex::new(VecDeque::new()) }
	}

	fn prune(timestamps: &mut VecDeque<Instant>, window: Duration, now: Instant) {
		while let Some(&front) = timestamps.front() {
			if now.duration_since(front) > window {
				timestamps.pop_front();
			} else {
				break;
			}
		}
	}

	/// Non-mutating (aside from pruning) capacity check.
	pub fn would_allow(&self) -> bool {
		let now = Instant::now();
		let mut timestamps = self.timestamps.lock().expect("sliding window mutex poisoned");
		Self::prune(&mut timestamps, self.window, now);
		timestamps.len() < self.max_requests as usize
	}

	/// Record one request, pruning first. Always succeeds; callers are
	/// expected to have already checked `would_allow`.
	pub fn record(&self) {
		let now = Instant::now();
		let mut timestamps = self.timestamps.lock().expect("sliding window mutex poisoned");
		Self::prune(&mut timestamps, self.window, now);
		timestamps.push_back(now);
	}

	/// `true` if the window holds no recent activity, used by the sweeper to
	/// decide whether a per-source entry can be dropped from the map.
	pub fn is_idle(&self) -> bool {
		let now = Instant::now();
		let mut timestamps = self.timestamps.lock().expect("sliding window mutex poisoned");
		Self::prune(&mut timestamps, self.window, now);
		timestamps.is_empty()
	}
}
