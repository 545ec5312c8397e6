//! Multi-call admission scenarios, mirroring spec §8 "concrete scenarios".
//! Uses an empty store pool: the capacity check's store read fails and is
//! treated as open (admit), so these scenarios exercise only the in-memory
//! rate-limiting path without needing a live Redis instance.

use evo_admission::{AdmissionConfig, AdmissionController, Decision, RejectReason};
use evo_store::{StoreAdapter, StorePool};
use std::time::Duration;

fn controller(max_per_source: u32) -> AdmissionController {
	let store = StoreAdapter::from_pool(StorePool::empty());
	let config = AdmissionConfig {
		max_per_source,
		per_source_window: Duration::from_secs(60),
		max_global: 1_000,
		global_window: Duration::from_secs(1),
		max_concurrent: 10_000_000,
	};
	AdmissionController::new(store, config)
}

/// S2 — per-source limit. With `max_per_source_per_minute=3`, four
/// consecutive admits from one source within one second: first three
/// admitted, fourth refused with `SourceRateLimited`.
#[tokio::test]
async fn s2_fourth_admit_from_same_source_is_rate_limited() {
	let controller = controller(3);
	let source = "5.6.7.8";

	for _ in 0..3 {
		let decision = controller.check(source).await;
		assert_eq!(decision, Decision::Allowed);
		controller.record(source);
	}

	let fourth = controller.check(source).await;
	assert_eq!(fourth, Decision::Rejected(RejectReason::SourceRateLimited));

	let stats = controller.stats();
	assert_eq!(stats.allowed, 3);
	assert_eq!(stats.rejected_source, 1);
}

/// A different source is unaffected by another source's exhausted window.
#[tokio::test]
async fn distinct_sources_have_independent_windows() {
	let controller = controller(1);

	controller.record("1.1.1.1");
	assert_eq!(controller.check("1.1.1.1").await, Decision::Rejected(RejectReason::SourceRateLimited));
	assert_eq!(controller.check("2.2.2.2").await, Decision::Allowed);
}

/// `reconfigure` takes effect for sources first seen after the swap — it
/// does not retroactively shrink a window already in progress.
#[tokio::test]
async fn reconfigure_applies_to_newly_seen_sources() {
	let controller = controller(5);
	controller.reconfigure(AdmissionConfig { max_per_source: 1, ..AdmissionConfig::default() });

	assert_eq!(controller.check("9.9.9.9").await, Decision::Allowed);
	controller.record("9.9.9.9");
	assert_eq!(controller.check("9.9.9.9").await, Decision::Rejected(RejectReason::SourceRateLimited));
}
