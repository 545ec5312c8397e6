//! Thin typed wrapper over the external key/value store: atomic counters,
//! sets, sorted sets, pipelines, and a health ping. Grounded on
//! `task_queue::redis_queue::RedisScheduler` (connection ownership, typed
//! errors via `#[from]`) and `file_host::cache::redis_cache` (retry-free,
//! direct command style — the store itself provides the atomicity this
//! adapter depends on, not a local retry loop).

pub mod error;
pub mod keys;
mod pool;

pub use error::{Result, StoreError};
pub use pool::StorePool;

use redis::AsyncCommands;

/// Narrow typed surface over the store. Every operation is dispatched over
/// a pool of independent connections selected by uniform random draw.
#[derive(Clone)]
pub struct StoreAdapter {
	pool: StorePool,
}

impl StoreAdapter {
	/// # Errors
	/// Propagates connection failures from the underlying pool.
	pub async fn connect(redis_url: &str, pool_size: usize) -> Result<Self> {
		let pool = StorePool::connect(redis_url, pool_size).await?;
		Ok(Self { pool })
	}

	#[must_use]
	pub fn from_pool(pool: StorePool) -> Self {
		Self { pool }
	}

	/// Atomically increments `key` by 1, returning the new value.
	///
	/// # Errors
	/// Returns [`StoreError`] on connection or command failure.
	pub async fn incr(&self, key: &str) -> Result<i64> {
		self.incr_by(key, 1).await
	}

	/// Atomically decrements `key` by 1, returning the new value.
	///
	/// # Errors
	/// Returns [`StoreError`] on connection or command failure.
	pub async fn decr(&self, key: &str) -> Result<i64> {
		self.incr_by(key, -1).await
	}

	/// Atomically adds `delta` (which may be negative) to `key`, returning
	/// the new value.
	///
	/// # Errors
	/// Returns [`StoreError`] on connection or command failure.
	pub async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
		let mut conn = self.pool.pick().await?;
		let new_value: i64 = conn.incr(key, delta).await?;
		Ok(new_value)
	}

	/// Reads an integer value, tolerating a missing key (returns `None`) and
	/// a non-numeric value (returns `None` and logs a warning). Callers
	/// supply a zero default at the call site.
	///
	/// # Errors
	/// Returns [`StoreError`] only on connection/command failure, never on a
	/// missing or malformed value.
	pub async fn get_int(&self, key: &str) -> Result<Option<i64>> {
		let mut conn = self.pool.pick().await?;
		let raw: Option<String> = conn.get(key).await?;
		match raw {
			None => Ok(None),
			Some(s) => match s.parse::<i64>() {
				Ok(v) => Ok(Some(v)),
				Err(_) => {
					tracing::warn!(key, value = %s, "non-numeric value for integer key");
					Ok(None)
				}
			},
		}
	}

	/// # Errors
	/// Returns [`StoreError`] on connection or command failure.
	pub async fn set(&self, key: &str, value: &str) -> Result<()> {
		let mut conn = self.pool.pick().await?;
		let (): () = conn.set(key, value).await?;
		Ok(())
	}

	/// Sets `key` to `value` only if it is currently absent. Used by the
	/// initialization contract, where non-atomic read-then-set is acceptable
	/// because startup happens pre-traffic.
	///
	/// # Errors
	/// Returns [`StoreError`] on connection or command failure.
	pub async fn set_if_absent(&self, key: &str, value: &str) -> Result<()> {
		if self.get_int(key).await?.is_none() {
			self.set(key, value).await?;
		}
		Ok(())
	}

	/// Adds `member` to the set at `key`. Returns `true` if newly added.
	///
	/// # Errors
	/// Returns [`StoreError`] on connection or command failure.
	pub async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
		let mut conn = self.pool.pick().await?;
		let added: i64 = conn.sadd(key, member).await?;
		Ok(added == 1)
	}

	/// # Errors
	/// Returns [`StoreError`] on connection or command failure.
	pub async fn set_members(&self, key: &str) -> Result<Vec<String>> {
		let mut conn = self.pool.pick().await?;
		let members: Vec<String> = conn.smembers(key).await?;
		Ok(members)
	}

	/// # Errors
	/// Returns [`StoreError`] on connection or command failure.
	pub async fn sorted_add(&self, key: &str, score: f64, member: &str) -> Result<()> {
		let mut conn = self.pool.pick().await?;
		let (): () = conn.zadd(key, member, score).await?;
		Ok(())
	}

	/// # Errors
	/// Returns [`StoreError`] on connection or command failure.
	pub async fn sorted_range_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>> {
		let mut conn = self.pool.pick().await?;
		let members: Vec<String> = conn.zrangebyscore(key, min, max).await?;
		Ok(members)
	}

	/// # Errors
	/// Returns [`StoreError`] on connection or command failure.
	pub async fn sorted_remove_by_score(&self, key: &str, min: f64, max: f64) -> Result<i64> {
		let mut conn = self.pool.pick().await?;
		let removed: i64 = conn.zrembyscore(key, min, max).await?;
		Ok(removed)
	}

	/// # Errors
	/// Returns [`StoreError`] if the store cannot be reached.
	pub async fn ping(&self) -> Result<()> {
		let mut conn = self.pool.pick().await?;
		let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
		Ok(())
	}

	/// Runs an atomic multi-command group: `build` populates a `redis::pipe()`
	/// (already in `atomic()` mode, i.e. `MULTI`/`EXEC`) and the pipeline's
	/// replies are deserialized as `T`.
	///
	/// # Errors
	/// Returns [`StoreError`] on connection or command failure.
	pub async fn pipeline<T, F>(&self, build: F) -> Result<T>
	where
		T: redis::FromRedisValue,
		F: FnOnce(&mut redis::Pipeline),
	{
		let mut conn = self.pool.pick().await?;
		let mut pipe = redis::pipe();
		pipe.atomic();
		build(&mut pipe);
		let result: T = pipe.query_async(&mut *conn).await?;
		Ok(result)
	}

	/// Initialization contract: sets the three global counters to `"0"` only
	/// if absent. The non-atomicity is acceptable because startup precedes
	/// traffic.
	///
	/// # Errors
	/// Returns [`StoreError`] on connection or command failure.
	pub async fn init_counters(&self) -> Result<()> {
		for key in [keys::CONCURRENT_CONNECTIONS, keys::TOTAL_CONNECTION_SECONDS, keys::PEAK_CONNECTIONS] {
			self.set_if_absent(key, "0").await?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	/// Requires a live `redis://127.0.0.1/` instance; not run in CI.
	#[tokio::test]
	#[ignore = "requires a local redis instance"]
	async fn incr_and_get_round_trip() -> Result<()> {
		let store = StoreAdapter::connect("redis://127.0.0.1/", 2).await?;
		store.set(keys::CONCURRENT_CONNECTIONS, "0").await?;

		let after_incr = store.incr(keys::CONCURRENT_CONNECTIONS).await?;
		assert_eq!(after_incr, 1);

		let read = store.get_int(keys::CONCURRENT_CONNECTIONS).await?;
		assert_eq!(read, Some(1));

		let after_decr = store.decr(keys::CONCURRENT_CONNECTIONS).await?;
		assert_eq!(after_decr, 0);
		Ok(())
	}

	#[tokio::test]
	#[ignore = "requires a local redis instance"]
	async fn get_int_tolerates_missing_key() -> Result<()> {
		let store = StoreAdapter::connect("redis://127.0.0.1/", 1).await?;
		let missing = store.get_int("global:does_not_exist").await?;
		assert_eq!(missing, None);
		Ok(())
	}

	#[tokio::test]
	#[ignore = "requires a local redis instance"]
	async fn pipeline_runs_commands_atomically() -> Result<()> {
		let store = StoreAdapter::connect("redis://127.0.0.1/", 1).await?;
		store.set(keys::CONCURRENT_CONNECTIONS, "0").await?;

		let (incr, total): (i64, Option<i64>) = store
			.pipeline(|pipe| {
				pipe.incr(keys::CONCURRENT_CONNECTIONS, 1);
				pipe.get(keys::TOTAL_CONNECTION_SECONDS);
			})
			.await?;

		assert_eq!(incr, 1);
		assert_eq!(total, None);
		Ok(())
	}

	#[tokio::test]
	#[ignore = "requires a local redis instance"]
	async fn peak_history_round_trip() -> Result<()> {
		let store = StoreAdapter::connect("redis://127.0.0.1/", 1).await?;
		let member = keys::peak_history_member(1_700_000_000, 42);
		store.sorted_add(keys::PEAK_HISTORY, 1_700_000_000.0, &member).await?;

		let found = store.sorted_range_by_score(keys::PEAK_HISTORY, 1_700_000_000.0, 1_700_000_000.0).await?;
		assert!(found.contains(&member));
		Ok(())
	}
}
