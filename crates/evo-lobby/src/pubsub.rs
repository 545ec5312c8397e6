//! Cross-node fan-out over the store's publish/subscribe capability. Every
//! node, including the publisher, receives the envelope exactly once and
//! performs local delivery from the subscriber loop — the publisher never
//! delivers directly, so a single code path handles both `broadcast` and
//! `broadcast_from`.

use crate::{LobbyHub, LobbyMessage};
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ClusterBridgeError {
	#[error("redis error: {0}")]
	Redis(#[from] redis::RedisError),
	#[error("envelope encoding error: {0}")]
	Encoding(#[from] serde_json::Error),
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Envelope<M> {
	node_id: Uuid,
	exclude: Option<String>,
	payload: M,
}

/// Publishes to, and subscribes from, one redis channel shared by the
/// cluster.
pub struct ClusterBridge<M: LobbyMessage> {
	publish_conn: Mutex<MultiplexedConnection>,
	channel: String,
	node_id: Uuid,
	_hub: std::marker::PhantomData<M>,
}

impl<M: LobbyMessage> ClusterBridge<M> {
	/// Connects to `redis_url`, subscribes to `channel`, and wires decoded
	/// envelopes into `hub`.
	///
	/// # Errors
	/// Returns an error if the initial publish connection cannot be
	/// established. Subscriber connection failures are retried in the
	/// background instead of failing construction.
	pub async fn connect(redis_url: &str, channel: impl Into<String>, hub: LobbyHub<M>) -> Result<Arc<Self>, ClusterBridgeError> {
		let client = redis::Client::open(redis_url)?;
		let publish_conn = client.get_multiplexed_tokio_connection().await?;
		let channel = channel.into();
		let node_id = Uuid::new_v4();

		let bridge = Arc::new(Self { publish_conn: Mutex::new(publish_conn), channel, node_id, _hub: std::marker::PhantomData });

		let subscriber_channel = bridge.channel.clone();
		tokio::spawn(async move {
			loop {
				if let Err(err) = Self::run_subscriber(&client, &subscriber_channel, node_id, &hub).await {
					tracing::warn!(%err, "lobby subscriber disconnected, retrying");
				}
				tokio::time::sleep(Duration::from_secs(1)).await;
			}
		});

		Ok(bridge)
	}

	async fn run_subscriber(client: &redis::Client, channel: &str, node_id: Uuid, hub: &LobbyHub<M>) -> Result<(), ClusterBridgeError> {
		let mut pubsub = client.get_async_pubsub().await?;
		pubsub.subscribe(channel).await?;
		let mut stream = pubsub.on_message();

		while let Some(msg) = stream.next().await {
			let payload: String = msg.get_payload()?;
			let envelope: Envelope<M> = match serde_json::from_str(&payload) {
				Ok(envelope) => envelope,
				Err(err) => {
					tracing::warn!(%err, "failed to decode lobby envelope");
					continue;
				}
			};

			if envelope.node_id == node_id {
				match &envelope.exclude {
					Some(exclude) => hub.broadcast_from(exclude, &envelope.payload),
					None => hub.broadcast(&envelope.payload),
				}
			} else {
				hub.broadcast(&envelope.payload);
			}
		}

		Ok(())
	}

	/// Publishes `message` for cluster-wide delivery, including on this node.
	///
	/// # Errors
	/// Returns an error if the publish command fails.
	pub async fn publish(&self, message: M) -> Result<(), ClusterBridgeError> {
		self.publish_envelope(None, message).await
	}

	/// Like [`publish`](Self::publish), but the originating node skips
	/// `exclude` on local delivery.
	///
	/// # Errors
	/// Returns an error if the publish command fails.
	pub async fn publish_from(&self, exclude: &str, message: M) -> Result<(), ClusterBridgeError> {
		self.publish_envelope(Some(exclude.to_string()), message).await
	}

	async fn publish_envelope(&self, exclude: Option<String>, payload: M) -> Result<(), ClusterBridgeError> {
		let envelope = Envelope { node_id: self.node_id, exclude, payload };
		let json = serde_json::to_string(&envelope)?;
		let mut conn = self.publish_conn.lock().await;
		let _: i64 = conn.publish(&self.channel, json).await?;
		Ok(())
	}
}
