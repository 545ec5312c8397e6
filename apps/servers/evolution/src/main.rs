mod broadcast;
mod config;
mod error;
mod gateway;
mod routes;
mod source;
mod state;
mod stats;

use anyhow::Result;
use axum::error_handling::HandleErrorLayer;
use axum::routing::get;
use axum::Router;
use broadcast::{Broadcast, ClusterPublisher, SharedPublisher};
use clap::Parser;
use config::Config;
use evo_admission::{AdmissionConfig, AdmissionController};
use evo_drain::DrainCoordinator;
use evo_lobby::{ClusterBridge, LobbyHub};
use evo_milestone::MilestoneEngine;
use evo_store::StoreAdapter;
use evo_tick::{AlwaysLeader, TickEngine};
use source::{ForwardedForExtractor, PeerAddrExtractor, SourceExtractor};
use stats::GatewayStats;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::{limit::ConcurrencyLimitLayer, load_shed::LoadShedLayer, timeout::TimeoutLayer, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<()> {
	dotenv::dotenv().ok();
	let config = Config::parse();
	init_tracing(&config);

	let store = StoreAdapter::connect(&config.redis_url, config.store_pool_size).await?;
	store.init_counters().await?;

	let lobby = LobbyHub::<Broadcast>::new();
	let bridge = ClusterBridge::connect(&config.redis_url, &config.lobby_channel, lobby.clone()).await?;
	let publisher = Arc::new(ClusterPublisher { bridge });

	let admission_config = AdmissionConfig {
		max_per_source: config.connections_per_ip_per_minute,
		per_source_window: Duration::from_secs(60),
		max_global: config.global_connections_per_second,
		global_window: Duration::from_secs(1),
		max_concurrent: config.max_global_connections,
	};
	let admission = AdmissionController::new(store.clone(), admission_config);

	let drain = Arc::new(DrainCoordinator::new(store.clone(), Box::new(SharedPublisher(Arc::clone(&publisher))), config.force_complete()));

	let milestones = Arc::new(MilestoneEngine::new(store.clone(), Box::new(SharedPublisher(Arc::clone(&publisher)))));

	let tick_engine = TickEngine::new(store.clone(), MilestoneEngine::new(store.clone(), Box::new(SharedPublisher(Arc::clone(&publisher)))), Box::new(SharedPublisher(Arc::clone(&publisher))), Box::new(AlwaysLeader));
	// Separate `MilestoneEngine` instance from `milestones` above: both read/write
	// the same store keys, and `try_unlock`'s `set_add` race-winner check keeps
	// concurrent evaluation from double-broadcasting the same milestone.
	let tick_heartbeat = tick_engine.heartbeat();

	let source_extractor: Arc<dyn SourceExtractor> =
		if config.trust_forwarded_for { Arc::new(ForwardedForExtractor) } else { Arc::new(PeerAddrExtractor) };

	let app_state = state::AppState {
		store: store.clone(),
		admission: admission.clone(),
		drain: Arc::clone(&drain),
		lobby,
		milestones,
		publisher: Arc::clone(&publisher),
		source_extractor,
		gateway_stats: Arc::new(GatewayStats::default()),
		tick_heartbeat,
	};

	let shutdown_token = CancellationToken::new();

	let sweeper_handle = admission.spawn_sweeper(shutdown_token.clone());
	let tick_handle = tokio::spawn(tick_engine.run(shutdown_token.clone()));

	let app = Router::new()
		.route("/ws", get(gateway::ws_handler))
		.merge(routes::health::router())
		.merge(routes::metrics::router())
		.with_state(app_state)
		.layer(
			ServiceBuilder::new()
				.layer(HandleErrorLayer::new(error::handle_tower_error))
				.layer(TraceLayer::new_for_http())
				.layer(RequestBodyLimitLayer::new(config.max_request_size_mb * 1024 * 1024))
				.layer(ConcurrencyLimitLayer::new(config.max_concurrent_requests))
				.layer(TimeoutLayer::new(Duration::from_millis(config.request_timeout_ms)))
				.layer(LoadShedLayer::new()),
		);

	let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
	let listener = TcpListener::bind(addr).await?;
	tracing::info!(%addr, "listening");

	let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>());

	let signal_token = shutdown_token.clone();
	let signal_task = tokio::spawn(async move {
		let _ = tokio::signal::ctrl_c().await;
		tracing::info!("received shutdown signal");
		signal_token.cancel();
	});

	tokio::select! {
		result = server => {
			if let Err(err) = result {
				tracing::error!(%err, "server error");
			}
		}
		() = shutdown_token.cancelled() => {
			tracing::info!("shutdown initiated");
		}
	}

	drain.begin_drain();

	let forced = tokio::select! {
		() = drain.wait_for_exit() => {
			tracing::info!("drain completed");
			false
		}
		() = tokio::time::sleep(config.shutdown_hard_limit()) => {
			tracing::warn!("hard shutdown limit reached, exiting regardless of drain progress");
			true
		}
	};

	shutdown_token.cancel();
	signal_task.abort();
	sweeper_handle.abort();
	tick_handle.abort();

	tracing::info!("shutdown complete");

	// Spec §6: exit code 0 on clean drain, non-zero when the hard limit
	// forced the process out before drain finished.
	if forced {
		std::process::exit(1);
	}
	Ok(())
}

/// Grounded on `file_host::init_tracing`, minus the `Option<()>` early
/// return on an absent filter — a missing `RUST_LOG` should fall back to
/// `info`, not skip initialization entirely.
fn init_tracing(config: &Config) {
	use tracing_subscriber::{fmt, EnvFilter};

	let filter = EnvFilter::try_new(&config.rust_log).unwrap_or_else(|_| EnvFilter::new("info"));

	if config.log_json {
		fmt().json().with_env_filter(filter).init();
	} else {
		fmt().pretty().with_env_filter(filter).init();
	}
}
