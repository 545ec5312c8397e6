//! Error-kind counters surfaced on `/health/status` (spec §7: `ProtocolError`
//! and `InternalInvariant` are logged, not propagated, so the only way an
//! operator observes them is through a counter). Grounded on
//! `evo_admission::stats::AdmissionStats` — plain `AtomicU64` fields behind
//! a snapshot struct.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct GatewayStats {
	protocol_errors: AtomicU64,
	clamp_events: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct GatewayStatsSnapshot {
	pub protocol_errors: u64,
	pub clamp_events: u64,
}

impl GatewayStats {
	pub fn record_protocol_error(&self) {
		self.protocol_errors.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_clamp(&self) {
		self.clamp_events.fetch_add(1, Ordering::Relaxed);
	}

	#[must_use]
	pub fn snapshot(&self) -> GatewayStatsSnapshot {
		GatewayStatsSnapshot { protocol_errors: self.protocol_errors.load(Ordering::Relaxed), clamp_events: self.clamp_events.load(Ordering::Relaxed) }
	}
}
