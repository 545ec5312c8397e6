use crate::error::{Result, StoreError};
use rand::Rng;
use redis::aio::MultiplexedConnection;
use redis::Client;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A pool of independent connections to the external key/value store.
///
/// Every call picks a connection by uniform random draw, not by hashing the
/// key — acceptable because every operation this adapter exposes is atomic
/// at the store itself, so no connection-affinity is required.
#[derive(Clone)]
pub struct StorePool {
	connections: Arc<Vec<Mutex<MultiplexedConnection>>>,
}

impl StorePool {
	/// # Errors
	/// Returns an error if the client cannot be constructed or no connection
	/// in the pool can be established.
	pub async fn connect(redis_url: &str, pool_size: usize) -> Result<Self> {
		let client = Client::open(redis_url)?;
		let pool_size = pool_size.max(1);
		let mut connections = Vec::with_capacity(pool_size);

		for _ in 0..pool_size {
			let conn = client.get_multiplexed_tokio_connection().await?;
			connections.push(Mutex::new(conn));
		}

		tracing::info!(pool_size, "store pool connected");

		Ok(Self { connections: Arc::new(connections) })
	}

	/// A pool with no connections. Useful for wiring dependents in tests
	/// that never exercise a store-touching code path.
	#[must_use]
	pub fn empty() -> Self {
		Self { connections: Arc::new(Vec::new()) }
	}

	/// Borrow one connection, chosen by uniform random draw.
	pub(crate) async fn pick(&self) -> Result<tokio::sync::MutexGuard<'_, MultiplexedConnection>> {
		if self.connections.is_empty() {
			return Err(StoreError::EmptyPool);
		}
		let idx = rand::thread_rng().gen_range(0..self.connections.len());
		Ok(self.connections[idx].lock().await)
	}
}
