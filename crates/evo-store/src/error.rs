use thiserror::Error;

/// Single error kind surfaced at the store boundary; never thrown, always returned.
#[derive(Error, Debug)]
pub enum StoreError {
	#[error("redis error: {0}")]
	Redis(#[from] redis::RedisError),

	#[error("store pool is empty")]
	EmptyPool,
}

pub type Result<T> = std::result::Result<T, StoreError>;
