//! Node-local shutdown state machine: `Running -> Draining -> Completing ->
//! Exited`, one-way transitions. Grounded on
//! `file_host::websocket::shutdown::WebSocketFsm::shutdown` (collect live
//! connections, best-effort notify, then reconcile) and the
//! `CancellationToken`-driven shutdown sequence in `file_host::main`.

use evo_store::{keys, StoreAdapter};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Called once, at the start of drain, so the gateway can warn connected
/// clients. Kept as a trait rather than a direct dependency on the lobby hub
/// to avoid a crate cycle — the binary wires the two together.
pub trait ShutdownBroadcaster: Send + Sync {
	fn broadcast_shutdown_warning(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
	Running,
	Draining,
	Completing,
	Exited,
}

struct State {
	phase: Phase,
	shutdown_started_at: Option<Instant>,
	node_local_live: u64,
}

/// Snapshot for the `/health/status` surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DrainStatus {
	pub draining: bool,
	pub shutdown_elapsed_secs: Option<u64>,
	pub node_local_live: u64,
}

pub struct DrainCoordinator {
	state: Mutex<State>,
	store: StoreAdapter,
	broadcaster: Box<dyn ShutdownBroadcaster>,
	force_complete_after: Duration,
	/// Cancelled once `on_completing` finishes; the binary awaits this to
	/// know when it's safe to exit the process.
	exit_signal: CancellationToken,
}

impl DrainCoordinator {
	#[must_use]
	pub fn new(store: StoreAdapter, broadcaster: Box<dyn ShutdownBroadcaster>, force_complete_after: Duration) -> Self {
		Self {
			state: Mutex::new(State { phase: Phase::Running, shutdown_started_at: None, node_local_live: 0 }),
			store,
			broadcaster,
			force_complete_after,
			exit_signal: CancellationToken::new(),
		}
	}

	/// Resolves once the coordinator has reached `Exited`.
	pub async fn wait_for_exit(&self) {
		self.exit_signal.cancelled().await;
	}

	pub fn register(&self) {
		self.state.lock().expect("drain state lock poisoned").node_local_live += 1;
	}

	/// Decrements the live count, clamped at zero. If draining and the
	/// count has just reached zero, completes the drain.
	pub async fn unregister(&self) {
		let should_complete = {
			let mut state = self.state.lock().expect("drain state lock poisoned");
			state.node_local_live = state.node_local_live.saturating_sub(1);
			state.phase == Phase::Draining && state.node_local_live == 0
		};
		if should_complete {
			self.enter_completing().await;
		}
	}

	#[must_use]
	pub fn accepting(&self) -> bool {
		self.state.lock().expect("drain state lock poisoned").phase == Phase::Running
	}

	#[must_use]
	pub fn status(&self) -> DrainStatus {
		let state = self.state.lock().expect("drain state lock poisoned");
		DrainStatus {
			draining: state.phase != Phase::Running,
			shutdown_elapsed_secs: state.shutdown_started_at.map(|t| t.elapsed().as_secs()),
			node_local_live: state.node_local_live,
		}
	}

	/// Idempotent: a second call while already draining is a no-op.
	pub fn begin_drain(self: &std::sync::Arc<Self>) {
		{
			let mut state = self.state.lock().expect("drain state lock poisoned");
			if state.phase != Phase::Running {
				return;
			}
			state.phase = Phase::Draining;
			state.shutdown_started_at = Some(Instant::now());
		}

		tracing::info!("drain started, broadcasting shutdown warning");
		self.broadcaster.broadcast_shutdown_warning();

		let this = std::sync::Arc::clone(self);
		tokio::spawn(async move {
			tokio::time::sleep(this.force_complete_after).await;
			this.on_force_complete().await;
		});
	}

	/// Forces the transition to `Completing` if still draining. No-op if
	/// the drain has already completed (the live count reached zero first).
	pub async fn on_force_complete(&self) {
		self.enter_completing().await;
	}

	fn try_enter_completing(&self) -> bool {
		let mut state = self.state.lock().expect("drain state lock poisoned");
		if state.phase != Phase::Draining {
			return false;
		}
		state.phase = Phase::Completing;
		true
	}

	async fn enter_completing(&self) {
		if !self.try_enter_completing() {
			return;
		}
		self.on_completing().await;
	}

	/// Best-effort reconciliation: decrements `concurrent_connections` by
	/// whatever this node still believes is live (clients that never sent
	/// an explicit unregister), clamps the store value at zero, then
	/// signals the process to exit.
	async fn on_completing(&self) {
		let live = self.state.lock().expect("drain state lock poisoned").node_local_live;

		if live > 0 {
			match self.store.incr_by(keys::CONCURRENT_CONNECTIONS, -i64::try_from(live).unwrap_or(i64::MAX)).await {
				Ok(new_value) if new_value < 0 => {
					if let Err(err) = self.store.set(keys::CONCURRENT_CONNECTIONS, "0").await {
						tracing::warn!(%err, "failed to clamp concurrent_connections to zero on drain completion");
					}
				}
				Ok(_) => {}
				Err(err) => {
					tracing::warn!(%err, "failed to reconcile concurrent_connections on drain completion");
				}
			}
		}

		self.state.lock().expect("drain state lock poisoned").phase = Phase::Exited;
		tracing::info!(node_local_live = live, "drain completed, signaling exit");
		self.exit_signal.cancel();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	struct CountingBroadcaster(AtomicUsize);
	impl ShutdownBroadcaster for Arc<CountingBroadcaster> {
		fn broadcast_shutdown_warning(&self) {
			self.0.fetch_add(1, Ordering::SeqCst);
		}
	}

	fn new_coordinator(force_complete_after: Duration) -> (Arc<DrainCoordinator>, Arc<CountingBroadcaster>) {
		let counter = Arc::new(CountingBroadcaster(AtomicUsize::new(0)));
		// No store round-trips occur unless a client was still live at
		// completion, so a pool-less adapter is constructed lazily by the
		// binary in production; tests that reach `on_completing` with
		// `node_local_live == 0` never touch the store.
		let store = evo_store::StoreAdapter::from_pool(evo_store::StorePool::empty());
		let coordinator = Arc::new(DrainCoordinator::new(store, Box::new(Arc::clone(&counter)), force_complete_after));
		(coordinator, counter)
	}

	#[tokio::test]
	async fn unregister_to_zero_while_draining_completes_immediately() {
		let (coordinator, broadcaster) = new_coordinator(Duration::from_secs(30));
		coordinator.register();
		assert!(coordinator.accepting());

		coordinator.begin_drain();
		assert_eq!(broadcaster.0.load(Ordering::SeqCst), 1);
		assert!(!coordinator.accepting());

		coordinator.unregister().await;
		coordinator.wait_for_exit().await;
		assert!(coordinator.status().draining);
	}

	#[tokio::test]
	async fn begin_drain_is_idempotent() {
		let (coordinator, broadcaster) = new_coordinator(Duration::from_secs(30));
		coordinator.begin_drain();
		coordinator.begin_drain();
		assert_eq!(broadcaster.0.load(Ordering::SeqCst), 1);
		coordinator.unregister().await;
	}

	#[tokio::test]
	async fn force_complete_fires_with_clients_still_live() {
		let (coordinator, _broadcaster) = new_coordinator(Duration::from_millis(20));
		coordinator.register();
		coordinator.begin_drain();
		coordinator.wait_for_exit().await;
		assert_eq!(coordinator.status().node_local_live, 1);
	}
}
