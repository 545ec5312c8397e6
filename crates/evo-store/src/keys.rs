//! Store key layout (spec §6 "Store key layout").

pub const CONCURRENT_CONNECTIONS: &str = "global:concurrent_connections";
pub const TOTAL_CONNECTION_SECONDS: &str = "global:total_connection_seconds";
pub const PEAK_CONNECTIONS: &str = "global:peak_connections";
pub const UNLOCKED_MILESTONES: &str = "global:unlocked_milestones";
pub const PEAK_HISTORY: &str = "global:peak_history";

/// Seconds in seven days; the retention window for `peak_history` entries.
pub const PEAK_HISTORY_RETENTION_SECONDS: i64 = 7 * 24 * 3_600;

/// Encodes a peak-history member as `"<unix_second>:<value>"`.
#[must_use]
pub fn peak_history_member(unix_second: i64, value: i64) -> String {
	format!("{unix_second}:{value}")
}

/// Decodes a `peak_history` member back into its `(unix_second, value)` pair.
/// Returns `None` for a malformed member, which should never occur for
/// entries this adapter wrote itself.
#[must_use]
pub fn parse_peak_history_member(member: &str) -> Option<(i64, i64)> {
	let (ts, value) = member.split_once(':')?;
	Some((ts.parse().ok()?, value.parse().ok()?))
}
