use std::sync::atomic::{AtomicU64, Ordering};

/// Live admission counters, read by the `/metrics` surface.
#[derive(Default)]
pub struct AdmissionStats {
	allowed: AtomicU64,
	rejected_source: AtomicU64,
	rejected_global: AtomicU64,
	rejected_capacity: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct AdmissionStatsSnapshot {
	pub allowed: u64,
	pub rejected_source: u64,
	pub rejected_global: u64,
	pub rejected_capacity: u64,
	pub tracked_sources: usize,
}

impl AdmissionStats {
	pub(crate) fn record_allowed(&self) {
		self.allowed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rejected(&self, reason: crate::error::RejectReason) {
		let counter = match reason {
			crate::error::RejectReason::SourceRateLimited => &self.rejected_source,
			crate::error::RejectReason::GlobalRateLimited => &self.rejected_global,
			crate::error::RejectReason::CapacityExceeded => &self.rejected_capacity,
		};
		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn snapshot(&self, tracked_sources: usize) -> AdmissionStatsSnapshot {
		AdmissionStatsSnapshot {
			allowed: self.allowed.load(Ordering::Relaxed),
			rejected_source: self.rejected_source.load(Ordering::Relaxed),
			rejected_global: self.rejected_global.load(Ordering::Relaxed),
			rejected_capacity: self.rejected_capacity.load(Ordering::Relaxed),
			tracked_sources,
		}
	}
}
