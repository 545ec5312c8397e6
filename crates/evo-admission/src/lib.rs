//! Gatekeeper for new connection attempts: per-source sliding-window rate
//! limiting, a global per-second rate limit, and a hard capacity check
//! against the store's live concurrent-connection count. Grounded on
//! `file_host::rate_limiter::sliding_window::SlidingWindowRateLimiter` for
//! the windowing and `file_host::websocket::middleware::ConnectionLimiter`
//! for the overall check/record/sweep shape.

pub mod config;
pub mod error;
mod stats;
mod window;

pub use config::AdmissionConfig;
pub use error::{Decision, RejectReason};
pub use stats::AdmissionStatsSnapshot;

use dashmap::DashMap;
use evo_store::StoreAdapter;
use stats::AdmissionStats;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use window::SlidingWindow;

/// Shared admission state. Cheap to clone — cloning shares the same inner
/// map, counters, and config.
#[derive(Clone)]
pub struct AdmissionController {
	inner: Arc<Inner>,
}

struct Inner {
	store: StoreAdapter,
	config: RwLock<AdmissionConfig>,
	global: SlidingWindow,
	per_source: DashMap<String, Arc<SlidingWindow>>,
	stats: AdmissionStats,
}

impl AdmissionController {
	#[must_use]
	pub fn new(store: StoreAdapter, config: AdmissionConfig) -> Self {
		let global = SlidingWindow::new(config.max_global, config.global_window);
		Self {
			inner: Arc::new(Inner {
				store,
				config: RwLock::new(config),
				global,
				per_source: DashMap::new(),
				stats: AdmissionStats::default(),
			}),
		}
	}

	fn config(&self) -> AdmissionConfig {
		*self.inner.config.read().expect("admission config lock poisoned")
	}

	fn source_window(&self, source_id: &str) -> Arc<SlidingWindow> {
		if let Some(existing) = self.inner.per_source.get(source_id) {
			return Arc::clone(&existing);
		}
		let config = self.config();
		let fresh = Arc::new(SlidingWindow::new(config.max_per_source, config.per_source_window));
		self.inner.per_source.entry(source_id.to_string()).or_insert_with(|| Arc::clone(&fresh));
		fresh
	}

	/// Evaluates whether a connection attempt from `source_id` should be
	/// admitted, without committing it. Store errors during the capacity
	/// check are treated as open (admit) rather than rejected, since a
	/// store outage should not take the whole gateway down.
	///
	/// # Errors
	/// Never returns an error; rejection is expressed via [`Decision`].
	pub async fn check(&self, source_id: &str) -> Decision {
		if !self.source_window(source_id).would_allow() {
			self.inner.stats.record_rejected(RejectReason::SourceRateLimited);
			return Decision::Rejected(RejectReason::SourceRateLimited);
		}

		if !self.inner.global.would_allow() {
			self.inner.stats.record_rejected(RejectReason::GlobalRateLimited);
			return Decision::Rejected(RejectReason::GlobalRateLimited);
		}

		let max_concurrent = self.config().max_concurrent;
		match self.inner.store.get_int(evo_store::keys::CONCURRENT_CONNECTIONS).await {
			Ok(Some(current)) if current >= max_concurrent => {
				self.inner.stats.record_rejected(RejectReason::CapacityExceeded);
				return Decision::Rejected(RejectReason::CapacityExceeded);
			}
			Ok(_) => {}
			Err(err) => {
				tracing::warn!(%err, "capacity check failed against store, admitting by default");
			}
		}

		Decision::Allowed
	}

	/// Commits an attempt that `check` already allowed. Call exactly once
	/// per admitted connection.
	pub fn record(&self, source_id: &str) {
		self.inner.global.record();
		self.source_window(source_id).record();
		self.inner.stats.record_allowed();
	}

	#[must_use]
	pub fn stats(&self) -> AdmissionStatsSnapshot {
		self.inner.stats.snapshot(self.inner.per_source.len())
	}

	pub fn reconfigure(&self, config: AdmissionConfig) {
		*self.inner.config.write().expect("admission config lock poisoned") = config;
	}

	/// Spawns the background sweeper that drops idle per-source entries
	/// every 30 seconds, bounding the per-source map to sources seen
	/// recently. Mirrors
	/// `file_host::websocket::middleware::ConnectionLimiter::start_cleanup_task_with_cancellation`.
	pub fn spawn_sweeper(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
		let controller = self.clone();
		tokio::spawn(async move {
			let mut interval = tokio::time::interval(Duration::from_secs(30));
			loop {
				tokio::select! {
					() = cancel.cancelled() => break,
					_ = interval.tick() => {
						let before = controller.inner.per_source.len();
						controller.inner.per_source.retain(|_, window| !window.is_idle());
						let dropped = before - controller.inner.per_source.len();
						if dropped > 0 {
							tracing::debug!(dropped, "admission sweeper dropped idle sources");
						}
					}
				}
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn config() -> AdmissionConfig {
		AdmissionConfig {
			max_per_source: 2,
			per_source_window: Duration::from_secs(60),
			max_global: 100,
			global_window: Duration::from_secs(1),
			max_concurrent: 10,
		}
	}

	#[test]
	fn source_window_rejects_after_limit() {
		let window = SlidingWindow::new(2, Duration::from_secs(60));
		assert!(window.would_allow());
		window.record();
		assert!(window.would_allow());
		window.record();
		assert!(!window.would_allow());
	}

	#[tokio::test]
	async fn source_limit_is_checked_before_global_rate() {
		// Spec §4.2 orders the algorithm 1. source limit, 2. global rate,
		// 3. capacity: a source already over its limit must be reported as
		// `SourceRateLimited` even when the global second is also saturated.
		let mut cfg = config();
		cfg.max_per_source = 1;
		cfg.max_global = 0;
		let store = StoreAdapter::from_pool(evo_store::StorePool::empty());
		let controller = AdmissionController::new(store, cfg);

		let exhausted_window = Arc::new(SlidingWindow::new(1, Duration::from_secs(60)));
		exhausted_window.record();
		controller.inner.per_source.insert("source-a".to_string(), exhausted_window);

		let decision = controller.check("source-a").await;
		assert_eq!(decision, Decision::Rejected(RejectReason::SourceRateLimited));
	}

	#[tokio::test]
	#[ignore = "requires a local redis instance"]
	async fn global_rate_limit_rejects_before_capacity_check() {
		// A global window of zero capacity always rejects, before the
		// capacity check ever reaches the store.
		let mut cfg = config();
		cfg.max_global = 0;
		let store = StoreAdapter::connect("redis://127.0.0.1/", 1).await.expect("redis reachable");
		let controller = AdmissionController::new(store, cfg);
		let decision = controller.check("source-a").await;
		assert_eq!(decision, Decision::Rejected(RejectReason::GlobalRateLimited));
	}
}
