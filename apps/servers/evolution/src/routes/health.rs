//! `/health/*` endpoints. Grounded on `file_host::routes::health::get_health`
//! — a route-builder function returning a merge-ready `Router<AppState>`.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use evo_store::keys;

pub fn router() -> Router<AppState> {
	Router::new().route("/health/live", get(live)).route("/health/ready", get(ready)).route("/health/status", get(status))
}

async fn live() -> impl IntoResponse {
	Json(serde_json::json!({ "status": "ok" }))
}

/// A tick is considered responsive if it has beaten within three periods —
/// generous enough to absorb one missed tick from a transient store error
/// (spec §4.8 has the engine skip and catch up) without flapping readiness.
const TICK_STALE_AFTER_SECS: i64 = evo_tick::TICK_PERIOD.as_secs() as i64 * 3;

async fn ready(State(state): State<AppState>) -> impl IntoResponse {
	let store_ok = state.store.ping().await.is_ok();
	let gateway_ok = state.drain.accepting();
	let tick_ok = state.tick_heartbeat.age_secs().is_some_and(|age| age <= TICK_STALE_AFTER_SECS);

	let body = serde_json::json!({
		"store": store_ok,
		"tick": tick_ok,
		"gateway_accepting": gateway_ok,
	});

	if store_ok && tick_ok && gateway_ok {
		(StatusCode::OK, Json(body))
	} else {
		(StatusCode::SERVICE_UNAVAILABLE, Json(body))
	}
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
	let store_ok = state.store.ping().await.is_ok();
	let concurrent_connections = state.store.get_int(keys::CONCURRENT_CONNECTIONS).await.ok().flatten().unwrap_or(0);
	let total_connection_seconds = state.store.get_int(keys::TOTAL_CONNECTION_SECONDS).await.ok().flatten().unwrap_or(0);
	let admission_stats = state.admission.stats();
	let drain_status = state.drain.status();
	let gateway_stats = state.gateway_stats.snapshot();
	let tick_heartbeat_age_secs = state.tick_heartbeat.age_secs();

	Json(serde_json::json!({
		"store": { "reachable": store_ok, "concurrent_connections": concurrent_connections, "total_connection_seconds": total_connection_seconds },
		"tick": { "heartbeat_age_secs": tick_heartbeat_age_secs },
		"admission": admission_stats,
		"drain": drain_status,
		"gateway": gateway_stats,
	}))
}
