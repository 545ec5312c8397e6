//! Multi-client fan-out scenarios, mirroring spec §8 S5 (drain broadcasts a
//! shutdown warning to every connected client) and the delivery contract in
//! spec §4.4 (critical messages must never be silently dropped for a sink
//! with room left in its buffer).

use evo_lobby::{LobbyHub, LobbyMessage};
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize)]
enum Wire {
	State(i64),
	ShutdownWarning(String),
}

impl LobbyMessage for Wire {
	fn is_critical(&self) -> bool {
		matches!(self, Self::ShutdownWarning(_))
	}
}

/// S5 — ten clients connected; `begin_drain` (modeled here as a single
/// broadcast call, since the drain coordinator itself is a separate crate)
/// reaches every one of them.
#[tokio::test]
async fn shutdown_warning_reaches_every_connected_client() {
	let hub = LobbyHub::<Wire>::new();
	let mut sinks = Vec::new();
	for i in 0..10 {
		sinks.push(hub.join(format!("client-{i}")));
	}
	assert_eq!(hub.len(), 10);

	hub.broadcast(&Wire::ShutdownWarning("draining".to_string()));

	for mut sink in sinks {
		let message = sink.critical_rx.recv().await.expect("shutdown warning delivered");
		assert!(matches!(message, Wire::ShutdownWarning(_)));
	}
}

/// A sink that never reads state updates still only ever observes the
/// latest one — intermediate values coalesce rather than queueing up.
#[tokio::test]
async fn unread_state_updates_coalesce_rather_than_backing_up() {
	let hub = LobbyHub::<Wire>::new();
	let mut sink = hub.join("client".to_string());

	for i in 0..100 {
		hub.broadcast(&Wire::State(i));
	}

	sink.state_rx.changed().await.unwrap();
	match sink.state_rx.borrow_and_update().clone() {
		Some(Wire::State(v)) => assert_eq!(v, 99),
		_ => panic!("expected the latest state update"),
	}
	assert!(!sink.state_rx.has_changed().unwrap());
}

/// `leave` removes a sink so a subsequent broadcast no longer targets it.
#[tokio::test]
async fn leave_removes_the_sink_from_future_broadcasts() {
	let hub = LobbyHub::<Wire>::new();
	let _sink = hub.join("client".to_string());
	assert_eq!(hub.len(), 1);

	hub.leave("client");
	assert!(hub.is_empty());
}
