//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AppState, Report};
use crate::config::AppConfig;
use crate::transport::LoopbackTransport;
use cellpci_core::{
    ConflictCounters, ConflictLedger, Decision, Entry, FactStore, PciController, PciError,
    Resolution, resolutions,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// =============================================================================
// FILE LIMITS
// =============================================================================

/// Maximum size of a replay file (100 MB).
const MAX_REPLAY_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Resolve `path` to an existing regular file no larger than `max_size`.
fn validate_input_file(path: &Path, max_size: u64) -> Result<PathBuf, PciError> {
    let canonical = path.canonicalize().map_err(|e| {
        PciError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| PciError::Io(format!("Cannot read file metadata: {}", e)))?;
    if !metadata.is_file() {
        return Err(PciError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > max_size {
        return Err(PciError::Serialization(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }

    Ok(canonical)
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

fn new_store(config: &AppConfig) -> Arc<FactStore> {
    Arc::new(FactStore::with_queue_capacity(config.controller.event_queue))
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Run the controller and the HTTP API until Ctrl+C.
pub async fn cmd_server(config: &AppConfig) -> Result<(), PciError> {
    let store = new_store(config);
    let ledger = Arc::new(ConflictLedger::new());
    let transport = Arc::new(LoopbackTransport::from_config(&config.transport));
    let controller = PciController::new(
        Arc::clone(&store),
        Arc::clone(&ledger),
        transport,
        config.controller_config(),
    );

    println!("cellpci PCI Controller Starting...");
    println!();
    println!("Configuration:");
    println!("  Bind:        {}", config.bind_addr());
    println!("  Ack timeout: {} ms", config.controller.ack_timeout_ms);
    println!(
        "  Pools:       {}",
        config
            .pools
            .iter()
            .map(|p| format!("[{}, {}]", p.lower, p.upper))
            .collect::<Vec<_>>()
            .join(" ")
    );
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let ctx = CancellationToken::new();

    tokio::spawn({
        let ctx = ctx.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown requested");
                    ctx.cancel();
                }
                Err(e) => tracing::warn!("Cannot listen for Ctrl+C: {}", e),
            }
        }
    });

    let controller_task = tokio::spawn({
        let ctx = ctx.clone();
        async move { controller.run(ctx).await }
    });

    let state = AppState::new(store, ledger, config.pools.clone());
    let served = api::run_server(&config.bind_addr(), state, ctx.clone()).await;

    ctx.cancel();
    let controlled = controller_task
        .await
        .map_err(|e| PciError::Io(format!("Controller task failed: {}", e)))?;

    served.and(controlled)
}

// =============================================================================
// REPLAY COMMAND
// =============================================================================

/// Outcome of a replay run.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub reports: usize,
    pub rejected: usize,
    pub reassigned: usize,
    pub unresolved: usize,
    pub totals: ConflictCounters,
    pub resolutions: Vec<Resolution>,
    pub cells: Vec<Entry>,
}

/// Feed `reports` one at a time through a fresh store and controller.
///
/// Each report is fully processed (arbitration, control, acknowledgement)
/// before the next one is put, so the result is deterministic.
pub async fn replay_reports(
    config: &AppConfig,
    reports: &[Report],
) -> Result<ReplaySummary, PciError> {
    let store = new_store(config);
    let ledger = Arc::new(ConflictLedger::new());
    let transport = Arc::new(LoopbackTransport::from_config(&config.transport));
    let controller = PciController::new(
        Arc::clone(&store),
        Arc::clone(&ledger),
        transport,
        config.controller_config(),
    );

    let ctx = CancellationToken::new();
    let mut events = store.watch(ctx.child_token())?;
    let mut rejected = 0;
    let mut reassigned = 0;
    let mut unresolved = 0;

    for (index, report) in reports.iter().enumerate() {
        let fact = match report.to_fact(&config.pools) {
            Ok(fact) => fact,
            Err(e) => {
                tracing::warn!(report = index, "Report rejected: {}", e);
                rejected += 1;
                continue;
            }
        };
        store.put(fact.key(), fact);

        while let Ok(event) = events.try_recv() {
            match controller.handle(&event, &ctx).await {
                Decision::Reassigned { .. } => reassigned += 1,
                Decision::Failed(_) => unresolved += 1,
                Decision::Ignored | Decision::Unchanged(_) => {}
            }
        }
    }
    ctx.cancel();

    let snapshot = store.snapshot();
    Ok(ReplaySummary {
        reports: reports.len(),
        rejected,
        reassigned,
        unresolved,
        totals: ledger.totals(),
        resolutions: resolutions(&snapshot),
        cells: snapshot
            .into_iter()
            .map(|(key, fact)| Entry { key, fact })
            .collect(),
    })
}

/// Replay a JSON array of reports from `file`.
pub async fn cmd_replay(config: &AppConfig, json_mode: bool, file: &Path) -> Result<(), PciError> {
    let path = validate_input_file(file, MAX_REPLAY_FILE_SIZE)?;
    let content = std::fs::read_to_string(&path)
        .map_err(|e| PciError::Io(format!("Cannot read '{}': {}", path.display(), e)))?;
    let reports: Vec<Report> = serde_json::from_str(&content)
        .map_err(|e| PciError::Serialization(format!("Invalid reports file: {}", e)))?;

    let summary = replay_reports(config, &reports).await?;

    if json_mode {
        print_json(&summary);
        return Ok(());
    }

    println!("cellpci Replay");
    println!("==============");
    println!("File: {:?}", path);
    println!();
    println!("Reports:      {}", summary.reports);
    println!("Rejected:     {}", summary.rejected);
    println!("Reassigned:   {}", summary.reassigned);
    println!("Unresolved:   {}", summary.unresolved);
    println!("Acknowledged: {}", summary.totals.acknowledged);
    println!();
    println!("Cells:");
    for entry in &summary.cells {
        let previous = entry
            .fact
            .metric
            .previous_pci
            .map(|p| format!(" (was {})", p))
            .unwrap_or_default();
        println!(
            "  {:<20} {:<24} PCI {}{}",
            entry.key.0,
            entry.fact.cgi.to_string(),
            entry.fact.metric.pci,
            previous
        );
    }

    Ok(())
}

// =============================================================================
// CONFIG COMMAND
// =============================================================================

/// Print the effective configuration.
pub fn cmd_config(config: &AppConfig, json_mode: bool) -> Result<(), PciError> {
    if json_mode {
        print_json(config);
        return Ok(());
    }

    println!("cellpci Configuration");
    println!("=====================");
    println!();
    println!("Pools:");
    for pool in &config.pools {
        println!("  [{}, {}]", pool.lower, pool.upper);
    }
    println!();
    println!("Controller:");
    println!("  Ack timeout:  {} ms", config.controller.ack_timeout_ms);
    println!("  Event queue:  {}", config.controller.event_queue);
    println!();
    println!("Server:");
    println!("  Host:         {}", config.server.host);
    println!("  Port:         {}", config.server.port);
    println!();
    println!("Transport (loopback):");
    println!("  Ack delay:    {} ms", config.transport.ack_delay_ms);
    println!("  Reject:       {}", config.transport.reject);

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
