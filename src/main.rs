//! # Newsdesk
//!
//! Content backend for a category-based news site. Stores articles grouped
//! by category, renders home/category/detail page contexts, and proxies
//! two third-party APIs — an external top-news source (with an RSS
//! fallback) and a weather provider — behind short-lived caching.
//!
//! ## Architecture
//!
//! - **Hero pipeline**: cache → primary provider → RSS feed → no hero.
//!   Every externally sourced story is registered under a stable short
//!   identifier so its detail page can lazily extract the full text.
//! - **Weather proxy**: one of two providers, normalized into a single
//!   shape and cached by rounded coordinates.
//! - **Local content**: an injected store collaborator; the default
//!   deployment runs the in-memory implementation, optionally seeded with
//!   demo data.
//!
//! ## Usage
//!
//! ```sh
//! newsdesk -c config.yaml --seed-demo
//! ```

use clap::Parser;
use std::error::Error;
use tracing::{debug, info};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cache;
mod cli;
mod config;
mod external;
mod extract;
mod handlers;
mod hero;
mod models;
mod normalize;
mod routes;
mod rss;
mod state;
mod store;
mod utils;
mod weather;

use cli::Cli;
use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("newsdesk starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.seed_demo, "Parsed CLI arguments");

    let mut config = Config::load(args.config.as_deref())?;
    config.apply_cli(&args);
    debug!(
        hero_mode = ?config.hero_mode,
        weather_provider = ?config.weather.provider,
        cache_ttl_secs = config.cache_ttl_secs,
        "Effective configuration"
    );

    let state = AppState::new(config)?;
    if args.seed_demo {
        store::seed_demo(state.store.as_ref());
    }

    let addr = format!("{}:{}", state.config.bind_addr, state.config.port);
    let app = routes::create_router(state);

    info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
