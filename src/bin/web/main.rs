use std::{net::SocketAddr, str::FromStr};

use board::{
	config::Config,
	dependencies::Dependency,
	routes::create_routes,
	services::response::{AnyError, ServiceError},
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::error!("failed to listen for shutdown signal: {}", err);
		std::future::pending::<()>().await;
	}
	tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<AnyError>> {
	println!("Environment Variable Is Being Set...");
	let config = Config::new()?;

	// ! Tracing
	tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
			// axum logs rejections from built-in extractors with the `axum::rejection`
			// target, at `TRACE` level. `axum::rejection=trace` enables showing those events
			format!("{},board=debug,tower_http=debug,axum::rejection=trace", config.log_level).into()
		}))
		.with(tracing_subscriber::fmt::layer())
		.init();

	// ! Connection
	tracing::info!(backend = ?config.storage_backend, "wiring dependencies");
	let dependency = Dependency::new(&config).await.map_err(|err| {
		tracing::error!("startup failed: {}", err);
		err
	})?;

	let reconciler = dependency.reconciler.spawn();
	let app = create_routes(dependency.state, dependency.http);

	let addr = SocketAddr::from_str(&config.server_ip_port)
		.map_err(|err| ServiceError::ConfigError(format!("SERVER_IP_PORT `{}`: {err}", config.server_ip_port)))?;
	tracing::info!(%addr, "start web server");
	axum::Server::try_bind(&addr)?
		.serve(app.into_make_service())
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	reconciler.shutdown().await;
	Ok(())
}
