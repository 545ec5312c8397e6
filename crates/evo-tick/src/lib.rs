//! Single periodic accumulator task, fixed period T = 5s (spec §4.5).
//! Grounded on `ws_events::stream_orch::tick::TickEngine` — an owned loop
//! over `tokio::select!` between a ticker, a cancellation token, and (here)
//! nothing else, since the tick engine takes no runtime commands.

use evo_milestone::{MilestoneEngine, StateSnapshot};
use evo_store::{keys, Result, StoreAdapter};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const TICK_PERIOD: Duration = Duration::from_secs(5);

/// Shared heartbeat clock the binary can poll from `/health/ready` without
/// holding a reference to the running `TickEngine` itself.
#[derive(Clone, Default)]
pub struct TickHandle(Arc<AtomicI64>);

impl TickHandle {
	fn record_beat(&self) {
		let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX));
		self.0.store(now, Ordering::Relaxed);
	}

	/// Seconds since the tick loop last completed an iteration, or `None` if
	/// it has never run. A healthy tick engine reports an age well under
	/// `TICK_PERIOD`; a stalled or un-started one reports a growing or absent
	/// value, which `/health/ready` (spec §6) treats as not-responding.
	#[must_use]
	pub fn age_secs(&self) -> Option<i64> {
		let last = self.0.load(Ordering::Relaxed);
		if last == 0 {
			return None;
		}
		let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX));
		Some((now - last).max(0))
	}
}

/// Delivers a state snapshot to the cluster once per tick.
#[async_trait::async_trait]
pub trait StateBroadcaster: Send + Sync {
	async fn broadcast_state(&self, concurrent_connections: i64, total_connection_seconds: i64, peak_connections: i64);
}

/// Decides whether this node is the single elected tick leader. Election
/// itself is left external (spec §4.5); the default is a single-node
/// deployment where every node is its own leader.
pub trait LeaderElection: Send + Sync {
	fn is_leader(&self) -> bool;
}

pub struct AlwaysLeader;
impl LeaderElection for AlwaysLeader {
	fn is_leader(&self) -> bool {
		true
	}
}

pub struct TickEngine {
	store: StoreAdapter,
	milestones: MilestoneEngine,
	broadcaster: Box<dyn StateBroadcaster>,
	leader: Box<dyn LeaderElection>,
	period: Duration,
	heartbeat: TickHandle,
}

impl TickEngine {
	#[must_use]
	pub fn new(store: StoreAdapter, milestones: MilestoneEngine, broadcaster: Box<dyn StateBroadcaster>, leader: Box<dyn LeaderElection>) -> Self {
		Self { store, milestones, broadcaster, leader, period: TICK_PERIOD, heartbeat: TickHandle::default() }
	}

	/// Clone of the heartbeat clock this engine updates on every loop
	/// iteration. Take a clone before calling `run` (which consumes `self`)
	/// and hand it to the health-check surface.
	#[must_use]
	pub fn heartbeat(&self) -> TickHandle {
		self.heartbeat.clone()
	}

	/// Runs the tick loop until `cancel` fires. Intended to be spawned once
	/// per node; non-leader nodes still run the loop but skip the body of
	/// every tick so leadership can change without restarting the task.
	pub async fn run(self, cancel: CancellationToken) {
		let mut ticker = tokio::time::interval(self.period);
		let mut last_tick = Instant::now();

		tracing::info!(period_secs = self.period.as_secs(), "tick engine started");

		loop {
			tokio::select! {
				() = cancel.cancelled() => break,
				tick_at = ticker.tick() => {
					if !self.leader.is_leader() {
						last_tick = tick_at;
						self.heartbeat.record_beat();
						continue;
					}
					if let Err(err) = self.handle_tick(tick_at, &mut last_tick).await {
						tracing::warn!(%err, "tick failed, will catch up on elapsed time next tick");
					}
					self.heartbeat.record_beat();
				}
			}
		}

		tracing::info!("tick engine stopped");
	}

	async fn handle_tick(&self, tick_at: Instant, last_tick: &mut Instant) -> Result<()> {
		let elapsed_seconds = tick_at.duration_since(*last_tick).as_secs().max(1);
		*last_tick = tick_at;

		let live = self.store.get_int(keys::CONCURRENT_CONNECTIONS).await?.unwrap_or(0);

		let total = if live > 0 {
			let delta = live * elapsed_seconds.max(self.period.as_secs()) as i64;
			self.store.incr_by(keys::TOTAL_CONNECTION_SECONDS, delta).await?
		} else {
			self.store.get_int(keys::TOTAL_CONNECTION_SECONDS).await?.unwrap_or(0)
		};

		let snapshot = StateSnapshot { concurrent_connections: live, total_connection_seconds: total };
		self.milestones.evaluate(snapshot).await?;

		let peak = self.store.get_int(keys::PEAK_CONNECTIONS).await?.unwrap_or(0);
		self.broadcaster.broadcast_state(live, total, peak).await;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fresh_handle_reports_no_beat() {
		let handle = TickHandle::default();
		assert_eq!(handle.age_secs(), None);
	}

	#[test]
	fn recorded_beat_reports_an_age_near_zero() {
		let handle = TickHandle::default();
		handle.record_beat();
		let age = handle.age_secs().expect("heartbeat was just recorded");
		assert!(age < 2, "expected a fresh heartbeat, got age_secs={age}");
	}
}
