//! # cellpci HTTP API Module
//!
//! Operator API over the fact store and the conflict ledger, plus report
//! ingestion.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /cells` - All stored cells
//! - `GET /cells/{key}` - One cell
//! - `GET /conflicts` - Cells colliding with a direct neighbor
//! - `GET /conflicts/{key}` - Collisions of one cell
//! - `GET /neighborhood/{key}` - Two-hop search horizon of one cell
//! - `GET /resolutions` - Cells whose PCI was corrected
//! - `GET /counters` - Aggregate and per-cell conflict counters
//! - `GET /counters/{key}` - Counters of one cell
//! - `POST /indication` - Ingest one telemetry report
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `CELLPCI_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `CELLPCI_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `CELLPCI_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{ApiKey, ENV_API_KEY, get_api_key_from_env};
pub use middleware::{
    DEFAULT_RATE_LIMIT, ENV_RATE_LIMIT, create_rate_limiter, get_rate_limit_from_env,
    parse_rate_limit,
};
pub use types::{
    CellCounters, CellsResponse, ConflictsResponse, CountersResponse, ErrorResponse,
    HealthResponse, IndicationResponse, NeighborReport, NeighborhoodResponse, Rat, Report,
    ResolutionsResponse,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use cellpci_core::{ConflictLedger, FactStore, PciError, PciPool};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Environment variable holding the allowed CORS origins.
pub const ENV_CORS_ORIGINS: &str = "CELLPCI_CORS_ORIGINS";

/// Largest accepted request body (one report).
const MAX_BODY_BYTES: usize = 256 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FactStore>,
    pub ledger: Arc<ConflictLedger>,
    /// Pools given to reports that carry none.
    pub default_pools: Arc<[PciPool]>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<FactStore>, ledger: Arc<ConflictLedger>, default_pools: Vec<PciPool>) -> Self {
        Self {
            store,
            ledger,
            default_pools: default_pools.into(),
        }
    }
}

// =============================================================================
// SECURITY SETTINGS
// =============================================================================

/// Middleware settings of the router.
#[derive(Debug, Clone, Default)]
pub struct ApiSecurity {
    pub api_key: Option<String>,
    /// Requests per second; `0` disables the limiter.
    pub rate_limit: u32,
    pub cors_origins: Option<String>,
}

impl ApiSecurity {
    /// Read `CELLPCI_API_KEY`, `CELLPCI_RATE_LIMIT` and `CELLPCI_CORS_ORIGINS`.
    pub fn from_env() -> Self {
        Self {
            api_key: get_api_key_from_env(),
            rate_limit: get_rate_limit_from_env(),
            cors_origins: std::env::var(ENV_CORS_ORIGINS).ok(),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer.
///
/// - `"*"`: any origin
/// - unset, or no valid entry: localhost only
/// - otherwise: the comma-separated origins
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins ({}=*). This is insecure for production!", ENV_CORS_ORIGINS);
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| match s.parse::<HeaderValue>() {
                    Ok(hv) => {
                        tracing::info!("CORS: Allowing origin: {}", s);
                        Some(hv)
                    }
                    Err(e) => {
                        tracing::warn!("CORS: Invalid origin '{}': {}", s, e);
                        None
                    }
                })
                .collect();

            if allowed.is_empty() {
                tracing::warn!("CORS: No valid origins in {}, defaulting to localhost only", ENV_CORS_ORIGINS);
                restricted_cors(localhost_origins())
            } else {
                restricted_cors(allowed)
            }
        }
        None => restricted_cors(localhost_origins()),
    }
}

fn localhost_origins() -> Vec<HeaderValue> {
    [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse().ok())
    .collect()
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the router with security settings from the environment.
pub fn create_router(state: AppState) -> Router {
    create_router_with(state, ApiSecurity::from_env())
}

/// Create the router with explicit security settings.
///
/// Middleware stack (outer to inner):
/// 1. Tracing
/// 2. CORS
/// 3. Body limit
/// 4. Rate limiting (if enabled)
/// 5. Authentication (if configured)
pub fn create_router_with(state: AppState, security: ApiSecurity) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/cells", get(handlers::cells_handler))
        .route("/cells/{key}", get(handlers::cell_handler))
        .route("/conflicts", get(handlers::conflicts_handler))
        .route("/conflicts/{key}", get(handlers::cell_conflicts_handler))
        .route("/neighborhood/{key}", get(handlers::neighborhood_handler))
        .route("/resolutions", get(handlers::resolutions_handler))
        .route("/counters", get(handlers::counters_handler))
        .route("/counters/{key}", get(handlers::cell_counters_handler))
        .route("/indication", post(handlers::indication_handler));

    match security.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => {
            tracing::info!("API key authentication enabled");
            router = router.layer(axum_middleware::from_fn_with_state(
                ApiKey::new(key),
                auth::api_key_auth_middleware,
            ));
        }
        None => tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set {} to enable authentication.",
            ENV_API_KEY
        ),
    }

    match create_rate_limiter(security.rate_limit) {
        Some(limiter) => {
            tracing::info!("Rate limiting enabled: {} requests/second", security.rate_limit);
            router = router.layer(axum_middleware::from_fn_with_state(
                limiter,
                middleware::rate_limit_middleware,
            ));
        }
        None => tracing::info!("Rate limiting disabled"),
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(security.cors_origins.as_deref()))
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve the API on `addr` until `ctx` is cancelled.
pub async fn run_server(addr: &str, state: AppState, ctx: CancellationToken) -> Result<(), PciError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| PciError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("cellpci HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { ctx.cancelled().await })
        .await
        .map_err(|e| PciError::Io(format!("Server error: {}", e)))
}
