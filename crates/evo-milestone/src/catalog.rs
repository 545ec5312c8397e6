//! Compiled, immutable milestone catalog (spec §4.6).

pub const CONCURRENT_THRESHOLDS: [i64; 7] = [1, 10, 100, 1_000, 10_000, 100_000, 1_000_000];

pub const TIME_THRESHOLDS: [i64; 8] =
	[60, 3_600, 86_400, 604_800, 2_592_000, 31_536_000, 3_153_600_000, 31_536_000_000];

pub const PEAK_LEAP_THRESHOLDS: [i64; 6] = [10, 100, 1_000, 10_000, 100_000, 1_000_000];

pub const SUSTAINED_LIVE: i64 = 1_000;
pub const SUSTAINED_SECONDS: i64 = 3_600;

#[derive(Debug, Clone, Copy)]
pub enum Predicate {
	ConcurrentThreshold(i64),
	TimeThreshold(i64),
	Sustained,
}

impl Predicate {
	#[must_use]
	pub fn evaluate(self, concurrent_connections: i64, total_connection_seconds: i64) -> bool {
		match self {
			Self::ConcurrentThreshold(n) => concurrent_connections >= n,
			Self::TimeThreshold(n) => total_connection_seconds >= n,
			Self::Sustained => concurrent_connections >= SUSTAINED_LIVE && total_connection_seconds >= SUSTAINED_SECONDS,
		}
	}
}

/// Category surfaced to clients as the `type` field of a milestone record.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
	Concurrent,
	Time,
	Sustained,
	PeakLeap,
}

#[derive(Debug, Clone)]
pub struct Milestone {
	pub id: String,
	pub name: String,
	pub description: String,
	pub kind: MilestoneKind,
	pub threshold: Option<i64>,
	pub predicate: Predicate,
}

#[must_use]
pub fn compiled() -> Vec<Milestone> {
	let mut catalog = Vec::new();

	for &n in &CONCURRENT_THRESHOLDS {
		let id = if n == 1 { "first_awakening".to_string() } else { format!("concurrent-{n}") };
		catalog.push(Milestone {
			id,
			name: format!("{n} souls at once"),
			description: format!("Concurrent connections reached {n}."),
			kind: MilestoneKind::Concurrent,
			threshold: Some(n),
			predicate: Predicate::ConcurrentThreshold(n),
		});
	}

	for &n in &TIME_THRESHOLDS {
		let id = if n == 60 { "first_minute".to_string() } else { format!("time-{n}") };
		catalog.push(Milestone {
			id,
			name: format!("{n} connection-seconds"),
			description: format!("Accumulated connection-seconds reached {n}."),
			kind: MilestoneKind::Time,
			threshold: Some(n),
			predicate: Predicate::TimeThreshold(n),
		});
	}

	catalog.push(Milestone {
		id: "sustained-1000-3600".to_string(),
		name: "Sustained surge".to_string(),
		description: "At least 1,000 concurrent connections sustained for an hour of accumulated time.".to_string(),
		kind: MilestoneKind::Sustained,
		threshold: None,
		predicate: Predicate::Sustained,
	});

	catalog
}

/// Identifier used for a peak-leap unlock at `threshold`.
#[must_use]
pub fn peak_leap_id(threshold: i64) -> String {
	format!("peak-leap-{threshold}")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn compiled_catalog_covers_every_threshold() {
		let catalog = compiled();
		assert_eq!(catalog.len(), CONCURRENT_THRESHOLDS.len() + TIME_THRESHOLDS.len() + 1);
	}

	#[test]
	fn first_thresholds_use_the_named_ids() {
		let catalog = compiled();
		assert!(catalog.iter().any(|m| m.id == "first_awakening"));
		assert!(catalog.iter().any(|m| m.id == "first_minute"));
	}

	#[test]
	fn sustained_requires_both_conditions() {
		assert!(!Predicate::Sustained.evaluate(1_000, 3_599));
		assert!(!Predicate::Sustained.evaluate(999, 3_600));
		assert!(Predicate::Sustained.evaluate(1_000, 3_600));
	}
}
