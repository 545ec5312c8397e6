//! Evaluates the compiled milestone catalog against a state snapshot and
//! records newly-unlocked milestones exactly once cluster-wide via the
//! store's `set_add` race-winner semantics. Grounded on
//! `evo_store::StoreAdapter::set_add` and the general "first writer wins"
//! pattern `task_queue::redis_queue::RedisScheduler::dequeue_blocking`
//! applies to claiming a single queue entry across workers.

pub mod catalog;

pub use catalog::{Milestone, MilestoneKind};

use evo_store::{keys, Result, StoreAdapter};
use std::collections::HashSet;

/// Delivers a newly-unlocked milestone to the cluster. Kept as a trait,
/// mirroring `evo_drain::ShutdownBroadcaster`, so this crate never depends
/// on the lobby's concrete wire format.
#[async_trait::async_trait]
pub trait MilestoneBroadcaster: Send + Sync {
	async fn broadcast_unlock(&self, milestone: &UnlockedMilestone);
}

/// The subset of global state the milestone engine evaluates against.
#[derive(Debug, Clone, Copy)]
pub struct StateSnapshot {
	pub concurrent_connections: i64,
	pub total_connection_seconds: i64,
}

/// A milestone record suitable for broadcast.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UnlockedMilestone {
	pub id: String,
	pub name: String,
	pub description: String,
	#[serde(rename = "type")]
	pub kind: MilestoneKind,
	pub threshold: Option<i64>,
}

pub struct MilestoneEngine {
	store: StoreAdapter,
	catalog: Vec<Milestone>,
	broadcaster: Box<dyn MilestoneBroadcaster>,
}

impl MilestoneEngine {
	#[must_use]
	pub fn new(store: StoreAdapter, broadcaster: Box<dyn MilestoneBroadcaster>) -> Self {
		Self { store, catalog: catalog::compiled(), broadcaster }
	}

	/// Evaluates every not-yet-unlocked milestone against `snapshot`, plus
	/// the peak-leap side effect. Returns every milestone this call newly
	/// unlocked (empty if another node won every race).
	///
	/// # Errors
	/// Returns an error if the store cannot be reached.
	pub async fn evaluate(&self, snapshot: StateSnapshot) -> Result<Vec<UnlockedMilestone>> {
		let already: HashSet<String> = self.store.set_members(keys::UNLOCKED_MILESTONES).await?.into_iter().collect();
		let mut unlocked = Vec::new();

		for milestone in &self.catalog {
			if already.contains(&milestone.id) {
				continue;
			}
			if !milestone.predicate.evaluate(snapshot.concurrent_connections, snapshot.total_connection_seconds) {
				continue;
			}
			if let Some(record) = self.try_unlock(milestone).await? {
				unlocked.push(record);
			}
		}

		unlocked.extend(self.evaluate_peak_leap(snapshot.concurrent_connections, &already).await?);

		for milestone in &unlocked {
			self.broadcaster.broadcast_unlock(milestone).await;
		}

		Ok(unlocked)
	}

	async fn try_unlock(&self, milestone: &Milestone) -> Result<Option<UnlockedMilestone>> {
		if self.store.set_add(keys::UNLOCKED_MILESTONES, &milestone.id).await? {
			tracing::info!(id = %milestone.id, "milestone unlocked");
			Ok(Some(UnlockedMilestone {
				id: milestone.id.clone(),
				name: milestone.name.clone(),
				description: milestone.description.clone(),
				kind: milestone.kind,
				threshold: milestone.threshold,
			}))
		} else {
			Ok(None)
		}
	}

	/// Updates `peak_connections` when `live` is a new high, records the
	/// crossing in `peak_history` and prunes entries older than seven days,
	/// then unlocks any significant peak threshold the prior peak had not
	/// crossed.
	async fn evaluate_peak_leap(&self, live: i64, already: &HashSet<String>) -> Result<Vec<UnlockedMilestone>> {
		let old_peak = self.store.get_int(keys::PEAK_CONNECTIONS).await?.unwrap_or(0);
		if live <= old_peak {
			return Ok(Vec::new());
		}
		self.store.set(keys::PEAK_CONNECTIONS, &live.to_string()).await?;
		self.record_peak_history(live).await;

		let mut unlocked = Vec::new();
		for threshold in catalog::PEAK_LEAP_THRESHOLDS {
			if old_peak >= threshold || live < threshold {
				continue;
			}
			let id = catalog::peak_leap_id(threshold);
			if already.contains(&id) {
				continue;
			}
			if self.store.set_add(keys::UNLOCKED_MILESTONES, &id).await? {
				unlocked.push(UnlockedMilestone {
					id,
					name: format!("New peak: {threshold}"),
					description: format!("Historical peak concurrent connections crossed {threshold}."),
					kind: MilestoneKind::PeakLeap,
					threshold: Some(threshold),
				});
			}
		}
		Ok(unlocked)
	}

	/// Records a new peak in `peak_history` (score = unix second) and prunes
	/// entries older than the seven-day retention window. Best-effort: a
	/// failure here never blocks the peak-leap unlock itself.
	#[allow(clippy::cast_precision_loss)]
	async fn record_peak_history(&self, value: i64) {
		let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX)).unwrap_or(0);

		let member = keys::peak_history_member(now, value);
		if let Err(err) = self.store.sorted_add(keys::PEAK_HISTORY, now as f64, &member).await {
			tracing::warn!(%err, "failed to record peak history entry");
			return;
		}

		let cutoff = now.saturating_sub(keys::PEAK_HISTORY_RETENTION_SECONDS);
		if let Err(err) = self.store.sorted_remove_by_score(keys::PEAK_HISTORY, 0.0, cutoff as f64).await {
			tracing::warn!(%err, "failed to prune stale peak history entries");
		}
	}

	/// Every milestone unlocked so far, resolved against the compiled
	/// catalog (and, for peak-leap ids, reconstructed generically). Used by
	/// the `welcome` message and the `/metrics/evolution` endpoint.
	///
	/// # Errors
	/// Returns an error if the store cannot be reached.
	pub async fn unlocked_snapshot(&self) -> Result<Vec<UnlockedMilestone>> {
		let ids = self.store.set_members(keys::UNLOCKED_MILESTONES).await?;
		let mut out = Vec::with_capacity(ids.len());

		for id in ids {
			if let Some(milestone) = self.catalog.iter().find(|m| m.id == id) {
				out.push(UnlockedMilestone {
					id: milestone.id.clone(),
					name: milestone.name.clone(),
					description: milestone.description.clone(),
					kind: milestone.kind,
					threshold: milestone.threshold,
				});
			} else if let Some(threshold) = id.strip_prefix("peak-leap-").and_then(|s| s.parse::<i64>().ok()) {
				out.push(UnlockedMilestone {
					id,
					name: format!("New peak: {threshold}"),
					description: format!("Historical peak concurrent connections crossed {threshold}."),
					kind: MilestoneKind::PeakLeap,
					threshold: Some(threshold),
				});
			} else {
				tracing::warn!(%id, "unknown milestone id in unlocked set");
			}
		}

		Ok(out)
	}

	/// Total number of milestones that can ever be unlocked, including the
	/// peak-leap family which isn't part of the static catalog.
	#[must_use]
	pub fn total_milestone_count(&self) -> usize {
		self.catalog.len() + catalog::PEAK_LEAP_THRESHOLDS.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct NoopBroadcaster;

	#[async_trait::async_trait]
	impl MilestoneBroadcaster for NoopBroadcaster {
		async fn broadcast_unlock(&self, _milestone: &UnlockedMilestone) {}
	}

	#[tokio::test]
	#[ignore = "requires a local redis instance"]
	async fn first_crossing_unlocks_exactly_once() -> Result<()> {
		let store = StoreAdapter::connect("redis://127.0.0.1/", 1).await?;
		store.set(keys::UNLOCKED_MILESTONES, "").await.ok();
		let engine = MilestoneEngine::new(store, Box::new(NoopBroadcaster));

		let snapshot = StateSnapshot { concurrent_connections: 1, total_connection_seconds: 0 };
		let first = engine.evaluate(snapshot).await?;
		assert!(first.iter().any(|m| m.id == "first_awakening"));

		let second = engine.evaluate(snapshot).await?;
		assert!(!second.iter().any(|m| m.id == "first_awakening"));
		Ok(())
	}
}
