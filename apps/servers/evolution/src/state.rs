use crate::broadcast::{Broadcast, ClusterPublisher};
use crate::source::SourceExtractor;
use crate::stats::GatewayStats;
use evo_admission::AdmissionController;
use evo_drain::DrainCoordinator;
use evo_lobby::LobbyHub;
use evo_milestone::MilestoneEngine;
use evo_store::StoreAdapter;
use evo_tick::TickHandle;
use std::sync::Arc;

/// Shared handles every HTTP/websocket handler needs. Grounded on
/// `file_host::AppState` — a flat struct of `Arc`-wrapped components passed
/// through axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
	pub store: StoreAdapter,
	pub admission: AdmissionController,
	pub drain: Arc<DrainCoordinator>,
	pub lobby: LobbyHub<Broadcast>,
	pub milestones: Arc<MilestoneEngine>,
	pub publisher: Arc<ClusterPublisher>,
	pub source_extractor: Arc<dyn SourceExtractor>,
	pub gateway_stats: Arc<GatewayStats>,
	pub tick_heartbeat: TickHandle,
}
