//! Command line and environment configuration.

use crate::assets;
use crate::loader::LoadPolicy;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "texts-rs", version, about = "Archive site for chat sessions with AI agent personalities")]
pub struct Cli {
    #[command(flatten)]
    pub content: ContentConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the site over HTTP, rescanning content on every request
    Serve(ServeArgs),
    /// Render the site to static HTML
    Build(BuildArgs),
}

/// Where content lives and how it is loaded
#[derive(Debug, Clone, Args)]
pub struct ContentConfig {
    /// Directory of session log files
    #[arg(long, env = "TEXTS_LOGS_DIR", default_value = "logs", global = true)]
    pub logs_dir: PathBuf,

    /// Directory of agent profile files
    #[arg(long, env = "TEXTS_AGENTS_DIR", default_value = "content/agents", global = true)]
    pub agents_dir: PathBuf,

    /// Directory of per-agent quote files
    #[arg(long, env = "TEXTS_QUOTES_DIR", default_value = "content/quotes", global = true)]
    pub quotes_dir: PathBuf,

    /// Static assets (agent images, uploads) served under the base path
    #[arg(long, env = "TEXTS_PUBLIC_DIR", default_value = "public", global = true)]
    pub public_dir: PathBuf,

    /// URL prefix the site is deployed under, e.g. `/texts-with-the-machine`
    #[arg(long, env = "TEXTS_BASE_PATH", default_value = "", global = true)]
    pub base_path: String,

    /// Skip malformed agent/log files instead of failing the whole load
    #[arg(long, env = "TEXTS_ISOLATE_FAILURES", global = true)]
    pub isolate_failures: bool,
}

impl ContentConfig {
    pub fn policy(&self) -> LoadPolicy {
        LoadPolicy::from_isolate_flag(self.isolate_failures)
    }

    /// Base path normalized to `""` or `/prefix`
    pub fn base(&self) -> String {
        assets::normalize_base(&self.base_path)
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(long, env = "PORT", default_value_t = 4850)]
    pub port: u16,

    /// Keep loaded snapshots until the content directories change
    #[arg(long, env = "TEXTS_CACHE")]
    pub cache: bool,
}

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    /// Output directory
    #[arg(long, env = "TEXTS_OUT_DIR", default_value = "dist")]
    pub out: PathBuf,
}
