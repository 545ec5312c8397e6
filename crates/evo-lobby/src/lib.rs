//! Per-node fan-out for the lobby topic. Grounded on
//! `file_host::websocket::broadcast` (filter-then-deliver loop, best-effort
//! per-sink send) and `some-transport::inmem::InMemTransport` (per-channel
//! sender with coalescing overflow semantics) for the local delivery half;
//! the cluster half is new, since the teacher never needed cross-node
//! fan-out, built with the same `redis` client the rest of the workspace
//! already depends on.

mod message;
mod pubsub;

pub use message::LobbyMessage;
pub use pubsub::ClusterBridge;

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Handle returned by [`LobbyHub::join`]. Holds the two receive ends the
/// caller's per-connection forwarding task selects over.
pub struct LobbySink<M: LobbyMessage> {
	pub state_rx: watch::Receiver<Option<M>>,
	pub critical_rx: mpsc::Receiver<M>,
}

struct SinkHandle<M: LobbyMessage> {
	state_tx: watch::Sender<Option<M>>,
	critical_tx: mpsc::Sender<M>,
}

/// Bounded buffer depth for the critical (milestone) channel. State updates
/// use a `watch` channel instead, which inherently holds only the latest
/// value.
const CRITICAL_BUFFER: usize = 32;

#[derive(Clone)]
pub struct LobbyHub<M: LobbyMessage> {
	sinks: Arc<DashMap<String, SinkHandle<M>>>,
}

impl<M: LobbyMessage> Default for LobbyHub<M> {
	fn default() -> Self {
		Self::new()
	}
}

impl<M: LobbyMessage> LobbyHub<M> {
	#[must_use]
	pub fn new() -> Self {
		Self { sinks: Arc::new(DashMap::new()) }
	}

	/// Registers `handle`, returning the receive ends for the connection's
	/// forwarding task. Replaces any prior sink under the same handle.
	pub fn join(&self, handle: String) -> LobbySink<M> {
		let (state_tx, state_rx) = watch::channel(None);
		let (critical_tx, critical_rx) = mpsc::channel(CRITICAL_BUFFER);
		self.sinks.insert(handle, SinkHandle { state_tx, critical_tx });
		LobbySink { state_rx, critical_rx }
	}

	pub fn leave(&self, handle: &str) {
		self.sinks.remove(handle);
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.sinks.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.sinks.is_empty()
	}

	/// Delivers `message` to every registered sink.
	pub fn broadcast(&self, message: &M) {
		self.deliver(None, message);
	}

	/// Delivers `message` to every sink except `exclude`.
	pub fn broadcast_from(&self, exclude: &str, message: &M) {
		self.deliver(Some(exclude), message);
	}

	fn deliver(&self, exclude: Option<&str>, message: &M) {
		let mut full_critical = Vec::new();

		for entry in &*self.sinks {
			let handle = entry.key();
			if exclude == Some(handle.as_str()) {
				continue;
			}

			if message.is_critical() {
				if entry.value().critical_tx.try_send(message.clone()).is_err() {
					full_critical.push(handle.clone());
				}
			} else {
				// `send_replace` ignores a dropped-receiver error; the
				// connection's teardown path calls `leave` explicitly.
				let _ = entry.value().state_tx.send(Some(message.clone()));
			}
		}

		for handle in full_critical {
			tracing::warn!(%handle, "critical buffer full, closing sink");
			self.sinks.remove(&handle);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde::{Deserialize, Serialize};

	#[derive(Clone, Serialize, Deserialize)]
	enum TestMessage {
		State(u64),
		Milestone(String),
	}

	impl LobbyMessage for TestMessage {
		fn is_critical(&self) -> bool {
			matches!(self, Self::Milestone(_))
		}
	}

	#[tokio::test]
	async fn state_updates_coalesce_to_latest() {
		let hub = LobbyHub::<TestMessage>::new();
		let mut sink = hub.join("client-a".into());

		hub.broadcast(&TestMessage::State(1));
		hub.broadcast(&TestMessage::State(2));
		hub.broadcast(&TestMessage::State(3));

		sink.state_rx.changed().await.unwrap();
		let latest = sink.state_rx.borrow_and_update().clone();
		match latest {
			Some(TestMessage::State(v)) => assert_eq!(v, 3),
			_ => panic!("expected latest state update"),
		}
	}

	#[tokio::test]
	async fn broadcast_from_skips_excluded_sink() {
		let hub = LobbyHub::<TestMessage>::new();
		let a = hub.join("a".into());
		let mut b = hub.join("b".into());

		hub.broadcast_from("a", &TestMessage::State(7));

		assert!(a.state_rx.has_changed().is_ok_and(|changed| !changed));
		b.state_rx.changed().await.unwrap();
	}

	#[tokio::test]
	async fn full_critical_buffer_closes_the_sink() {
		let hub = LobbyHub::<TestMessage>::new();
		let _sink = hub.join("slow".into());

		for _ in 0..CRITICAL_BUFFER + 1 {
			hub.broadcast(&TestMessage::Milestone("m".to_string()));
		}

		assert!(!hub.sinks.contains_key("slow"));
	}
}
