//! The wire message sent over the lobby, plus the trait adapters that let
//! the tick engine, milestone engine, and drain coordinator each publish
//! through it without depending on its concrete shape.

use evo_lobby::{ClusterBridge, LobbyMessage};
use evo_milestone::UnlockedMilestone;
use std::sync::Arc;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Broadcast {
	StateUpdate { concurrent_connections: i64, total_connection_seconds: i64, peak_connections: i64 },
	EvolutionEvent { milestone: UnlockedMilestone },
	ShutdownWarning {
		message: String,
		#[serde(rename = "reconnect_delay")]
		reconnect_delay_ms: u64,
	},
}

impl LobbyMessage for Broadcast {
	fn is_critical(&self) -> bool {
		matches!(self, Self::EvolutionEvent { .. } | Self::ShutdownWarning { .. })
	}
}

/// Shared handle to the cluster-wide publish path, implementing every
/// component-facing broadcaster trait.
pub struct ClusterPublisher {
	pub bridge: Arc<ClusterBridge<Broadcast>>,
}

#[async_trait::async_trait]
impl evo_tick::StateBroadcaster for ClusterPublisher {
	async fn broadcast_state(&self, concurrent_connections: i64, total_connection_seconds: i64, peak_connections: i64) {
		let message = Broadcast::StateUpdate { concurrent_connections, total_connection_seconds, peak_connections };
		if let Err(err) = self.bridge.publish(message).await {
			tracing::warn!(%err, "failed to publish state update");
		}
	}
}

#[async_trait::async_trait]
impl evo_milestone::MilestoneBroadcaster for ClusterPublisher {
	async fn broadcast_unlock(&self, milestone: &UnlockedMilestone) {
		let message = Broadcast::EvolutionEvent { milestone: milestone.clone() };
		if let Err(err) = self.bridge.publish(message).await {
			tracing::warn!(%err, "failed to publish evolution event");
		}
	}
}

impl evo_drain::ShutdownBroadcaster for ClusterPublisher {
	fn broadcast_shutdown_warning(&self) {
		let bridge = Arc::clone(&self.bridge);
		tokio::spawn(async move {
			let message = Broadcast::ShutdownWarning { message: "server is shutting down".to_string(), reconnect_delay_ms: 5_000 };
			if let Err(err) = bridge.publish(message).await {
				tracing::warn!(%err, "failed to publish shutdown warning");
			}
		});
	}
}

/// `DrainCoordinator`, `MilestoneEngine`, and `TickEngine` each take their
/// broadcaster as an owned `Box<dyn Trait>`; this newtype lets all three
/// share the same underlying publisher and bridge via a cloned `Arc`
/// (a blanket impl on `Arc<ClusterPublisher>` itself would violate the
/// orphan rule, since neither the `Arc` nor the traits are local here).
#[derive(Clone)]
pub struct SharedPublisher(pub Arc<ClusterPublisher>);

#[async_trait::async_trait]
impl evo_tick::StateBroadcaster for SharedPublisher {
	async fn broadcast_state(&self, concurrent_connections: i64, total_connection_seconds: i64, peak_connections: i64) {
		self.0.broadcast_state(concurrent_connections, total_connection_seconds, peak_connections).await;
	}
}

#[async_trait::async_trait]
impl evo_milestone::MilestoneBroadcaster for SharedPublisher {
	async fn broadcast_unlock(&self, milestone: &UnlockedMilestone) {
		self.0.broadcast_unlock(milestone).await;
	}
}

impl evo_drain::ShutdownBroadcaster for SharedPublisher {
	fn broadcast_shutdown_warning(&self) {
		self.0.broadcast_shutdown_warning();
	}
}
