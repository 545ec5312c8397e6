//! `/metrics/*` endpoints (spec §6).

use crate::state::AppState;
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use evo_store::keys;

pub fn router() -> Router<AppState> {
	Router::new().route("/metrics/state", get(state_metrics)).route("/metrics/evolution", get(evolution_metrics)).route("/metrics/peak-history", get(peak_history))
}

async fn state_metrics(State(state): State<AppState>) -> impl IntoResponse {
	let concurrent_connections = state.store.get_int(keys::CONCURRENT_CONNECTIONS).await.ok().flatten().unwrap_or(0);
	let total_connection_seconds = state.store.get_int(keys::TOTAL_CONNECTION_SECONDS).await.ok().flatten().unwrap_or(0);
	let peak_connections = state.store.get_int(keys::PEAK_CONNECTIONS).await.ok().flatten().unwrap_or(0);

	Json(serde_json::json!({
		"concurrent_connections": concurrent_connections,
		"total_connection_seconds": total_connection_seconds,
		"peak_connections": peak_connections,
	}))
}

async fn evolution_metrics(State(state): State<AppState>) -> impl IntoResponse {
	let unlocked = state.milestones.unlocked_snapshot().await.unwrap_or_default();
	let total_count = state.milestones.total_milestone_count();
	let unlocked_count = unlocked.len();
	#[allow(clippy::cast_precision_loss)]
	let progress_pct = if total_count == 0 { 0.0 } else { (unlocked_count as f64 / total_count as f64) * 100.0 };

	Json(serde_json::json!({
		"unlocked_count": unlocked_count,
		"total_count": total_count,
		"progress_pct": progress_pct,
		"current_state": unlocked,
	}))
}

async fn peak_history(State(state): State<AppState>) -> impl IntoResponse {
	let window_start = unix_seconds_now().saturating_sub(24 * 3_600);
	#[allow(clippy::cast_precision_loss)]
	let raw = state.store.sorted_range_by_score(keys::PEAK_HISTORY, window_start as f64, f64::INFINITY).await.unwrap_or_default();

	let points: Vec<_> = raw
		.iter()
		.filter_map(|member| keys::parse_peak_history_member(member))
		.map(|(timestamp, value)| serde_json::json!({ "timestamp": timestamp, "value": value }))
		.collect();

	Json(serde_json::json!({ "points": points }))
}

fn unix_seconds_now() -> i64 {
	std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}
