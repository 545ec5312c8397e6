use clap::Parser;
use std::time::Duration;

/// Process configuration, parsed from CLI flags or environment variables.
/// Grounded on `file_host::Config` (`clap::Parser` with `env =` on every
/// field, `default_value` for anything safe to default).
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Config {
	/// Use JSON formatting for tracing output.
	#[arg(long, env = "LOG_JSON", default_value = "false")]
	pub log_json: bool,

	/// Tracing filter directive, e.g. "info" or "evolution_server=debug".
	#[arg(long, env = "RUST_LOG", default_value = "info")]
	pub rust_log: String,

	/// Bind host.
	#[arg(long, env = "HOST", default_value = "0.0.0.0")]
	pub host: String,

	/// Bind port.
	#[arg(long, env = "PORT", default_value = "8080")]
	pub port: u16,

	/// External key/value store connection string.
	#[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1/")]
	pub redis_url: String,

	/// Number of independent connections in the store pool.
	#[arg(long, env = "STORE_POOL_SIZE", default_value = "10")]
	pub store_pool_size: usize,

	/// Per-source connection attempts allowed per rolling minute.
	#[arg(long, env = "CONNECTIONS_PER_IP_PER_MINUTE", default_value = "60")]
	pub connections_per_ip_per_minute: u32,

	/// Cluster-wide connection attempts allowed per rolling second.
	#[arg(long, env = "GLOBAL_CONNECTIONS_PER_SECOND", default_value = "1000")]
	pub global_connections_per_second: u32,

	/// Hard ceiling on concurrent connections.
	#[arg(long, env = "MAX_GLOBAL_CONNECTIONS", default_value = "10000000")]
	pub max_global_connections: i64,

	/// Seconds a drain may run before the force-complete timer fires.
	#[arg(long, env = "FORCE_COMPLETE_SECS", default_value = "15")]
	pub force_complete_secs: u64,

	/// Hard outer limit on total shutdown time before the process exits
	/// regardless of drain progress.
	#[arg(long, env = "SHUTDOWN_HARD_LIMIT_SECS", default_value = "30")]
	pub shutdown_hard_limit_secs: u64,

	/// Redis pub/sub channel used for cross-node lobby fan-out.
	#[arg(long, env = "LOBBY_CHANNEL", default_value = "evolution:lobby")]
	pub lobby_channel: String,

	/// Derive the admission source identifier from `X-Forwarded-For` instead
	/// of the raw peer address. Only safe behind a load balancer trusted to
	/// set the header itself (spec §9 design notes).
	#[arg(long, env = "TRUST_FORWARDED_FOR", default_value = "false")]
	pub trust_forwarded_for: bool,

	/// Maximum accepted HTTP request body size, in megabytes.
	#[arg(long, env = "MAX_REQUEST_SIZE_MB", default_value = "1")]
	pub max_request_size_mb: usize,

	/// Maximum in-flight HTTP requests before load-shedding kicks in.
	#[arg(long, env = "MAX_CONCURRENT_REQUESTS", default_value = "4096")]
	pub max_concurrent_requests: usize,

	/// HTTP request timeout, in milliseconds.
	#[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "5000")]
	pub request_timeout_ms: u64,
}

impl Config {
	#[must_use]
	pub fn force_complete(&self) -> Duration {
		Duration::from_secs(self.force_complete_secs)
	}

	#[must_use]
	pub fn shutdown_hard_limit(&self) -> Duration {
		Duration::from_secs(self.shutdown_hard_limit_secs)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_parse_with_no_arguments() {
		let config = Config::parse_from(["evolution-server"]);
		assert_eq!(config.port, 8080);
		assert_eq!(config.connections_per_ip_per_minute, 60);
		assert_eq!(config.max_global_connections, 10_000_000);
	}
}
