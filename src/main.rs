//! dirserve - serve local directories over HTTP.
//!
//! This binary parses the configuration, builds the route table and starts
//! the HTTP server.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dirserve::{
    config::Config,
    listing::platform_hidden,
    route::RouteTable,
    server::{create_router, ServerConfig},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose, config.quiet);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let table = match config.route_table() {
        Ok(table) => table,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let addr = match config.bind_address() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    log_routes(&table, &config);

    let server_config = ServerConfig::new(table)
        .with_template_dir(config.template_dir())
        .with_hidden_predicate(platform_hidden())
        .with_tracing(!config.no_tracing);
    let router = create_router(server_config);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Describe the configured routes.
fn log_routes(table: &RouteTable, config: &Config) {
    for route in table.iter() {
        info!(
            "Serving local path {} on {}",
            route.root().display(),
            route.prefix()
        );
        if let Some(credentials) = route.credentials() {
            info!("  with Basic auth for user {:?}", credentials.user);
            if credentials.user.is_empty() || credentials.password.is_empty() {
                warn!("  user or password is empty for {}", route.prefix());
            }
        }
    }

    let caps = config.capabilities();
    info!(
        uploads = caps.uploads,
        deletes = caps.deletes,
        creates = caps.creates,
        hide_hidden = caps.hide_hidden,
        "Route capabilities"
    );

    if !table.binds_root() {
        info!("Redirecting / to {}", table.first().prefix());
    }
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool, quiet: bool) {
    let env_filter = if quiet {
        "off"
    } else if verbose {
        "dirserve=debug,tower_http=debug"
    } else {
        "dirserve=info,tower_http=info"
    };

    let filter = if quiet {
        tracing_subscriber::EnvFilter::new(env_filter)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| env_filter.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
