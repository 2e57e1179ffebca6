//! The two ways of publishing the archive: an axum server that rescans
//! content per request, and a static build into an output directory.

use crate::agents::AgentProfile;
use crate::assets;
use crate::cache::{self, SnapshotCache};
use crate::config::{BuildArgs, ContentConfig, ServeArgs};
use crate::error::{ApiError, LoadError, SiteError};
use crate::loader::{LoadFailure, Loaded};
use crate::logs::{self, LogEntry};
use crate::quotes::{self, AgentQuote};
use crate::render::{HomeOptions, Renderer, SidebarOptions};
use crate::search::SessionIndex;
use crate::store::ContentStore;
use axum::{
    extract::{Path, Query, Request, State},
    response::Html,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::normalize_path::NormalizePath;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

// ============================================================================
// App State
// ============================================================================

pub struct AppState {
    start_time: Instant,
    store: ContentStore,
    renderer: Renderer,
}

impl AppState {
    pub fn new(store: ContentStore) -> Result<Arc<Self>, SiteError> {
        let renderer = Renderer::new(&store.config().base())?;
        Ok(Arc::new(Self {
            start_time: Instant::now(),
            store,
            renderer,
        }))
    }
}

// ============================================================================
// Health Endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    version: &'static str,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Pages
// ============================================================================

#[derive(Debug, Deserialize)]
struct HomeQuery {
    /// Index of the quote currently on screen
    quote: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

/// Content loading, search and rendering hit the filesystem and the CPU;
/// run them on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

async fn home_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HomeQuery>,
) -> Result<Html<String>, ApiError> {
    blocking(move || {
        let logs = state.store.logs()?;
        let agents = state.store.agents()?;
        let quotes = state.store.quotes();

        let mut rng = rand::thread_rng();
        let shown = match query.quote {
            Some(current) => quotes::next_quote(&quotes.items, quotes.items.get(current), &mut rng),
            None => quotes::featured_quote(&quotes.items, &mut rng),
        };

        let another_quote_url = shown
            .filter(|_| quotes.items.len() > 1)
            .and_then(|q| quote_index(&quotes.items, q))
            .map(|i| format!("{}?quote={}", assets::home_url(state.renderer.base()), i));

        let page = state.renderer.render_home(
            &logs.items,
            &agents.items,
            HomeOptions { quote: shown, another_quote_url },
        )?;
        Ok(Html(page))
    })
    .await
}

fn quote_index(quotes: &[AgentQuote], quote: &AgentQuote) -> Option<usize> {
    quotes.iter().position(|q| std::ptr::eq(q, quote))
}

async fn session_page(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Html<String>, ApiError> {
    blocking(move || {
        let logs = state.store.logs()?;
        let log = logs::find_log(&logs.items, &id).ok_or_else(|| ApiError::SessionNotFound(id.clone()))?;
        let agents = state.store.agents()?;

        let sidebar = SessionIndex::new(&logs.items).search(&query.q);
        let page = state.renderer.render_session(
            log,
            &sidebar,
            &agents.items,
            SidebarOptions { searchable: true, query: &query.q },
        )?;
        Ok(Html(page))
    })
    .await
}

// ============================================================================
// JSON API
// ============================================================================

/// A content collection plus the files skipped while loading it
#[derive(Serialize)]
struct CollectionResponse<T> {
    items: Vec<T>,
    failures: Vec<LoadFailure>,
}

impl<T: Clone> From<&Loaded<T>> for CollectionResponse<T> {
    fn from(loaded: &Loaded<T>) -> Self {
        Self {
            items: loaded.items.clone(),
            failures: loaded.failures.clone(),
        }
    }
}

async fn api_logs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CollectionResponse<LogEntry>>, ApiError> {
    blocking(move || Ok(Json(state.store.logs()?.as_ref().into()))).await
}

async fn api_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LogEntry>, ApiError> {
    blocking(move || {
        state
            .store
            .log_by_id(&id)?
            .map(Json)
            .ok_or(ApiError::SessionNotFound(id))
    })
    .await
}

async fn api_agents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CollectionResponse<AgentProfile>>, ApiError> {
    blocking(move || Ok(Json(state.store.agents()?.as_ref().into()))).await
}

async fn api_quotes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CollectionResponse<AgentQuote>>, ApiError> {
    blocking(move || Ok(Json(state.store.quotes().as_ref().into()))).await
}

#[derive(Serialize)]
struct SearchResult {
    /// `None` when the query is empty and nothing was ranked
    score: Option<f64>,
    session: LogEntry,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    results: Vec<SearchResult>,
}

async fn api_search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    blocking(move || {
        let logs = state.store.logs()?;

        let results = if query.q.trim().is_empty() {
            logs.items
                .iter()
                .map(|entry| SearchResult { score: None, session: entry.clone() })
                .collect()
        } else {
            SessionIndex::new(&logs.items)
                .ranked(&query.q)
                .into_iter()
                .map(|hit| SearchResult { score: Some(hit.score), session: hit.entry.clone() })
                .collect()
        };

        Ok(Json(SearchResponse { query: query.q, results }))
    })
    .await
}

// ============================================================================
// Server
// ============================================================================

/// All routes, nested under the base path when one is configured.
/// Anything unmatched is looked up in the public directory. A trailing
/// slash is trimmed before routing, so `/base/` is the home page too.
pub fn router(state: Arc<AppState>) -> NormalizePath<Router> {
    let base = state.renderer.base().to_string();
    let public_dir = state.store.config().public_dir.clone();

    let site = Router::new()
        .route("/health", get(health))
        .route("/", get(home_page))
        .route("/session/{id}", get(session_page))
        .route("/api/logs", get(api_logs))
        .route("/api/logs/{id}", get(api_log))
        .route("/api/agents", get(api_agents))
        .route("/api/quotes", get(api_quotes))
        .route("/api/search", get(api_search))
        .fallback_service(ServeDir::new(public_dir))
        .with_state(state);

    let app = if base.is_empty() {
        site
    } else {
        Router::new().nest(&base, site)
    };
    NormalizePath::trim_trailing_slash(app.layer(TraceLayer::new_for_http()))
}

pub async fn serve(config: ContentConfig, args: ServeArgs) -> Result<(), SiteError> {
    let store = if args.cache {
        let cache = SnapshotCache::new();
        let store = ContentStore::with_cache(config, cache.clone());
        cache::watch(cache, store.watch_dirs());
        store
    } else {
        ContentStore::new(config)
    };

    // Surface content problems at startup; requests still rescan
    match store.logs() {
        Ok(logs) => {
            info!("Found {} sessions", logs.items.len());
            for failure in &logs.failures {
                warn!("Skipped {}: {}", failure.path.display(), failure.reason);
            }
        }
        Err(e) => warn!("Logs currently fail to load: {}", e),
    }

    let state = AppState::new(store)?;
    let base = state.renderer.base().to_string();
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("texts-rs v{} listening on {}{}", env!("CARGO_PKG_VERSION"), addr, base);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(SiteError::Server)?;
    axum::serve(listener, axum::ServiceExt::<Request>::into_make_service(app))
        .await
        .map_err(SiteError::Server)
}

// ============================================================================
// Static Build
// ============================================================================

/// What a static build wrote
#[derive(Debug)]
pub struct BuildReport {
    pub pages: usize,
    pub assets: usize,
    /// Files skipped under the isolated load policy
    pub skipped: Vec<LoadFailure>,
}

/// Render every page into `args.out` and copy the public directory next to
/// them. The output directory is cleared first so removed sessions do not
/// linger. Session pages get no search box since nothing answers `?q=`.
pub fn build(store: &ContentStore, args: &BuildArgs) -> Result<BuildReport, SiteError> {
    let renderer = Renderer::new(&store.config().base())?;
    let logs = store.logs()?;
    let agents = store.agents()?;
    let quotes = store.quotes();
    let out = args.out.as_path();

    // Sessions without a usable directory name get no page and no links
    let published: Vec<LogEntry> = logs
        .items
        .iter()
        .filter(|log| {
            let usable = is_path_segment(&log.id);
            if !usable {
                warn!("Skipping session with id {:?}: not usable as a directory name", log.id);
            }
            usable
        })
        .cloned()
        .collect();

    clear_out_dir(store.config(), out)?;
    let assets = copy_dir(&store.config().public_dir, out)?;

    let quote = quotes::featured_quote(&quotes.items, &mut rand::thread_rng());
    let home = renderer.render_home(
        &published,
        &agents.items,
        HomeOptions { quote, another_quote_url: None },
    )?;
    write_page(&out.join("index.html"), &home)?;
    let mut pages = 1;

    let sidebar: Vec<&LogEntry> = published.iter().collect();
    for log in &published {
        let page = renderer.render_session(log, &sidebar, &agents.items, SidebarOptions::default())?;
        write_page(&out.join("session").join(&log.id).join("index.html"), &page)?;
        pages += 1;
    }

    let skipped = logs
        .failures
        .iter()
        .chain(&agents.failures)
        .chain(&quotes.failures)
        .cloned()
        .collect();

    Ok(BuildReport { pages, assets, skipped })
}

/// Remove a previous build. Refuses when `out` is, or contains, one of the
/// content directories.
fn clear_out_dir(config: &ContentConfig, out: &std::path::Path) -> Result<(), SiteError> {
    let Ok(out_abs) = out.canonicalize() else {
        // Nothing to clear yet
        return Ok(());
    };

    let content_dirs = [&config.logs_dir, &config.agents_dir, &config.quotes_dir, &config.public_dir];
    let holds_content = content_dirs
        .iter()
        .filter_map(|dir| dir.canonicalize().ok())
        .any(|dir| dir.starts_with(&out_abs));
    if holds_content {
        return Err(SiteError::UnsafeOutDir { path: out.to_path_buf() });
    }

    fs::remove_dir_all(out).map_err(|e| SiteError::write(out, e))
}

fn is_path_segment(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\'])
}

fn write_page(path: &std::path::Path, html: &str) -> Result<(), SiteError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SiteError::write(parent, e))?;
    }
    fs::write(path, html).map_err(|e| SiteError::write(path, e))
}

/// Copy `from` into `to` recursively, returning the number of files copied.
/// A missing source directory copies nothing.
fn copy_dir(from: &std::path::Path, to: &std::path::Path) -> Result<usize, SiteError> {
    if !from.is_dir() {
        return Ok(0);
    }
    fs::create_dir_all(to).map_err(|e| SiteError::write(to, e))?;

    let mut copied = 0;
    for entry in fs::read_dir(from).map_err(|e| LoadError::io(from, e))? {
        let entry = entry.map_err(|e| LoadError::io(from, e))?;
        let src = entry.path();
        let dest = to.join(entry.file_name());
        if src.is_dir() {
            copied += copy_dir(&src, &dest)?;
        } else {
            fs::copy(&src, &dest).map_err(|e| SiteError::write(&dest, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}
