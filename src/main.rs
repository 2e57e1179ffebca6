//! # texts-rs
//!
//! Archive site for chat sessions with AI agent personalities.
//!
//! Content is read from three directories of JSON files:
//! - agent profiles (`content/agents/*.json`)
//! - per-agent quotes (`content/quotes/*.json`)
//! - raw session logs (`logs/*.json`), normalized into `LogEntry` records
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ content dirs │────▶│ ContentStore │────▶│   Renderer   │
//! │ (JSON files) │     │ (+ snapshot  │     │ (minijinja)  │
//! └──────────────┘     │    cache)    │     └──────────────┘
//!                      └──────────────┘            │
//!                             │            ┌───────┴───────┐
//!                             ▼            ▼               ▼
//!                      ┌──────────────┐  serve          build
//!                      │ SessionIndex │  (axum)     (static HTML)
//!                      └──────────────┘
//! ```
//!
//! ## Endpoints (serve mode, under the base path)
//!
//! - `GET /` - Home page, `?quote=<i>` rotates the featured quote
//! - `GET /session/{id}` - Session transcript, `?q=` filters the sidebar
//! - `GET /api/logs`, `GET /api/logs/{id}` - Normalized sessions
//! - `GET /api/agents`, `GET /api/quotes` - Profiles and quotes
//! - `GET /api/search?q=` - Ranked session search
//! - `GET /health` - Server health check

mod agents;
mod assets;
mod cache;
mod config;
mod error;
mod loader;
mod logs;
mod prompt;
mod quotes;
mod render;
mod search;
mod site;
mod store;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Cli, Command};
use crate::error::SiteError;
use crate::store::ContentStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("texts_rs=info".parse().unwrap())
                .add_directive("tower_http=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), SiteError> {
    match cli.command {
        Command::Serve(args) => site::serve(cli.content, args).await,
        Command::Build(args) => {
            let store = ContentStore::new(cli.content);
            let report = site::build(&store, &args)?;
            for failure in &report.skipped {
                tracing::warn!("Skipped {}: {}", failure.path.display(), failure.reason);
            }
            tracing::info!(
                "Wrote {} pages and {} assets to {}",
                report.pages,
                report.assets,
                args.out.display()
            );
            Ok(())
        }
    }
}
