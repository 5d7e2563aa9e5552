//! # API Endpoint Handlers
//!
//! Every read handler answers from one store snapshot (or one ledger copy),
//! so a response never mixes states from before and after a correction.

use super::{
    AppState,
    types::{
        CellCounters, CellsResponse, ConflictsResponse, CountersResponse, ErrorResponse,
        HealthResponse, IndicationResponse, NeighborhoodResponse, Report, ResolutionsResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cellpci_core::{
    Arbitrator, CellKey, ConflictCounters, Entry, PciError, conflicts, resolutions,
};

/// Map an engine error to a status code and JSON body.
fn error_response(err: &PciError) -> Response {
    let status = match err {
        PciError::CellNotFound(_) | PciError::StoreEmpty => StatusCode::NOT_FOUND,
        PciError::InvalidCgi(_) | PciError::InvalidPool { .. } | PciError::Serialization(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(err.to_string()))).into_response()
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// CELL HANDLERS
// =============================================================================

/// List every stored cell in key order.
pub async fn cells_handler(State(state): State<AppState>) -> impl IntoResponse {
    // An empty store is an empty list here, not an error.
    let cells = state.store.entries().unwrap_or_default();
    Json(CellsResponse {
        count: cells.len(),
        cells,
    })
}

/// Fetch one cell by key.
pub async fn cell_handler(State(state): State<AppState>, Path(key): Path<u64>) -> Response {
    let key = CellKey(key);
    match state.store.get(key) {
        Ok(fact) => Json(Entry { key, fact }).into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// CONFLICT HANDLERS
// =============================================================================

/// Cells colliding with a direct neighbor.
pub async fn conflicts_handler(State(state): State<AppState>) -> Response {
    match conflicts(&state.store.snapshot(), None) {
        Ok(conflicts) => Json(ConflictsResponse {
            count: conflicts.len(),
            conflicts,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Collisions of one cell; 404 when the cell is unknown.
pub async fn cell_conflicts_handler(
    State(state): State<AppState>,
    Path(key): Path<u64>,
) -> Response {
    match conflicts(&state.store.snapshot(), Some(CellKey(key))) {
        Ok(conflicts) => Json(ConflictsResponse {
            count: conflicts.len(),
            conflicts,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Cells within two hops of one cell, with the PCIs they occupy.
pub async fn neighborhood_handler(
    State(state): State<AppState>,
    Path(key): Path<u64>,
) -> Response {
    let key = CellKey(key);
    let snapshot = state.store.snapshot();
    let Some(target) = snapshot.get(&key) else {
        return error_response(&PciError::CellNotFound(key));
    };
    let neighborhood = Arbitrator::new(target).neighborhood(&snapshot);
    Json(NeighborhoodResponse {
        key,
        pci: target.pci(),
        collides: neighborhood.contains_pci(target.pci()),
        neighborhood,
    })
    .into_response()
}

/// Cells whose PCI was corrected at least once.
pub async fn resolutions_handler(State(state): State<AppState>) -> impl IntoResponse {
    let resolutions = resolutions(&state.store.snapshot());
    Json(ResolutionsResponse {
        count: resolutions.len(),
        resolutions,
    })
}

// =============================================================================
// COUNTER HANDLERS
// =============================================================================

/// Aggregate and per-cell conflict counters.
pub async fn counters_handler(State(state): State<AppState>) -> impl IntoResponse {
    let cells: Vec<CellCounters> = state
        .ledger
        .all()
        .into_iter()
        .map(|(key, counters)| CellCounters { key, counters })
        .collect();
    let mut totals = ConflictCounters::default();
    for cell in &cells {
        totals.merge(&cell.counters);
    }
    Json(CountersResponse { totals, cells })
}

/// Counters of one cell; 404 when nothing was ever counted for it.
pub async fn cell_counters_handler(
    State(state): State<AppState>,
    Path(key): Path<u64>,
) -> Response {
    let key = CellKey(key);
    match state.ledger.get(key) {
        Some(counters) => Json(CellCounters { key, counters }).into_response(),
        None => error_response(&PciError::CellNotFound(key)),
    }
}

// =============================================================================
// INDICATION HANDLER
// =============================================================================

/// Ingest one decoded telemetry report.
pub async fn indication_handler(
    State(state): State<AppState>,
    Json(report): Json<Report>,
) -> impl IntoResponse {
    let fact = match report.to_fact(&state.default_pools) {
        Ok(fact) => fact,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(IndicationResponse::error(format!("Invalid report: {}", e))),
            );
        }
    };

    let key = fact.key();
    state.store.put(key, fact);
    tracing::debug!(cell = %key, "Report ingested");
    (StatusCode::OK, Json(IndicationResponse::success(key)))
}
