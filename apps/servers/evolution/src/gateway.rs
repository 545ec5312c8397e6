//! Connection Gateway: the admission/upgrade path for a new socket
//! (spec §4.7). Grounded on `file_host::websocket`'s upgrade handler shape —
//! check limits, upgrade, register, run a read/write loop, teardown — with
//! the specifics (admission, drain, lobby, milestones) swapped in.

use crate::broadcast::Broadcast;
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use evo_admission::Decision;
use evo_lobby::LobbySink;
use evo_milestone::StateSnapshot;
use evo_store::keys;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use uuid::Uuid;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>, ConnectInfo(addr): ConnectInfo<SocketAddr>, headers: HeaderMap) -> Response {
	let source_id = state.source_extractor.extract(addr, &headers);

	match state.admission.check(&source_id).await {
		Decision::Rejected(reason) => {
			tracing::debug!(%source_id, %reason, "admission rejected");
			return (StatusCode::TOO_MANY_REQUESTS, reason.to_string()).into_response();
		}
		Decision::Allowed => {}
	}

	if !state.drain.accepting() {
		tracing::debug!(%source_id, "refused: draining");
		return (StatusCode::SERVICE_UNAVAILABLE, "draining").into_response();
	}

	state.admission.record(&source_id);
	state.drain.register();

	ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
	let handle = Uuid::new_v4().to_string();

	let new_count = match state.store.incr(keys::CONCURRENT_CONNECTIONS).await {
		Ok(v) => v,
		Err(err) => {
			tracing::warn!(%err, "incr failed on admit, refusing connection");
			state.drain.unregister().await;
			return;
		}
	};

	let (mut ws_tx, mut ws_rx) = socket.split();
	let LobbySink { mut state_rx, mut critical_rx } = state.lobby.join(handle.clone());

	send_welcome(&mut ws_tx, &state, new_count).await;

	let _ = state
		.publisher
		.bridge
		.publish_from(&handle, Broadcast::StateUpdate { concurrent_connections: new_count, total_connection_seconds: read_total(&state).await, peak_connections: read_peak(&state).await })
		.await;

	loop {
		tokio::select! {
			changed = state_rx.changed() => {
				if changed.is_err() {
					break;
				}
				let message = state_rx.borrow_and_update().clone();
				if let Some(message) = message {
					if send_message(&mut ws_tx, &message).await.is_err() {
						break;
					}
				}
			}
			Some(message) = critical_rx.recv() => {
				if send_message(&mut ws_tx, &message).await.is_err() {
					break;
				}
			}
			frame = ws_rx.next() => {
				match frame {
					Some(Ok(Message::Close(_))) | None => break,
					Some(Err(err)) => {
							tracing::debug!(%err, "protocol error reading client frame, closing");
							state.gateway_stats.record_protocol_error();
							break;
						}
					// Client-to-server frames are ignored, aside from the
					// protocol-level ping/pong axum handles transparently.
					Some(Ok(_)) => {}
				}
			}
		}
	}

	teardown(&state, &handle).await;
}

async fn send_welcome(ws_tx: &mut (impl SinkExt<Message> + Unpin), state: &AppState, concurrent_connections: i64) {
	let total_connection_seconds = read_total(state).await;

	if let Err(err) = state.milestones.evaluate(StateSnapshot { concurrent_connections, total_connection_seconds }).await {
		tracing::warn!(%err, "milestone evaluation failed on admit");
	}

	let peak_connections = read_peak(state).await;
	let unlocked_milestones = state.milestones.unlocked_snapshot().await.unwrap_or_default();

	let welcome = serde_json::json!({
		"type": "welcome",
		"concurrent_connections": concurrent_connections,
		"total_connection_seconds": total_connection_seconds,
		"peak_connections": peak_connections,
		"unlocked_milestones": unlocked_milestones,
	});

	let _ = ws_tx.send(Message::Text(welcome.to_string())).await;
}

async fn send_message(ws_tx: &mut (impl SinkExt<Message> + Unpin), message: &Broadcast) -> Result<(), ()> {
	let Ok(text) = serde_json::to_string(message) else {
		return Ok(());
	};
	ws_tx.send(Message::Text(text)).await.map_err(|_| ())
}

async fn teardown(state: &AppState, handle: &str) {
	state.lobby.leave(handle);

	match state.store.decr(keys::CONCURRENT_CONNECTIONS).await {
		Ok(post) if post < 0 => {
			state.gateway_stats.record_clamp();
			if let Err(err) = state.store.set(keys::CONCURRENT_CONNECTIONS, "0").await {
				tracing::warn!(%err, "failed to clamp concurrent_connections on teardown");
			}
		}
		Ok(_) => {}
		Err(err) => tracing::warn!(%err, "decr failed on teardown"),
	}

	state.drain.unregister().await;

	let concurrent_connections = read_live(state).await;
	let total_connection_seconds = read_total(state).await;
	let peak_connections = read_peak(state).await;
	let _ = state.publisher.bridge.publish(Broadcast::StateUpdate { concurrent_connections, total_connection_seconds, peak_connections }).await;
}

async fn read_total(state: &AppState) -> i64 {
	state.store.get_int(keys::TOTAL_CONNECTION_SECONDS).await.ok().flatten().unwrap_or(0)
}

async fn read_peak(state: &AppState) -> i64 {
	state.store.get_int(keys::PEAK_CONNECTIONS).await.ok().flatten().unwrap_or(0)
}

async fn read_live(state: &AppState) -> i64 {
	state.store.get_int(keys::CONCURRENT_CONNECTIONS).await.ok().flatten().unwrap_or(0)
}
