//! # Conflict Resolution Controller
//!
//! Drives the pipeline for every newly reported cell:
//!
//! ```text
//! Created event -> arbitrate -> Store.update_pci -> send control -> await ack
//! ```
//!
//! Arbitration and the store update run inline on the event loop, one
//! event at a time. Each acknowledgement wait runs as its own task, so a
//! slow network element never delays arbitration of other cells.
//!
//! A refused or timed-out correction is not rolled back and not retried:
//! the store keeps the requested PCI and the next report from the cell
//! reconciles it.

use crate::arbitrator::{Arbitrator, GlobalPciIndex, Verdict};
use crate::ledger::{AckOutcome, ConflictLedger};
use crate::primitives::DEFAULT_ACK_TIMEOUT_MS;
use crate::store::{Event, EventType, FactStore};
use crate::{CellKey, Cgi, NodeId, Pci, PciError};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

// =============================================================================
// TRANSPORT
// =============================================================================

/// Corrective action for one cell: adopt `pci`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlAction {
    pub key: CellKey,
    pub cgi: Cgi,
    pub node_id: NodeId,
    pub pci: Pci,
}

/// Answer of the network element to a [`ControlAction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Acknowledgement {
    Applied,
    Rejected { cause: String },
}

/// Delivery of corrective actions to network elements.
///
/// `send_control` returns once the request is handed off; the returned
/// receiver resolves when the network element answers. Dropping the sender
/// without answering is treated as an undelivered request.
#[async_trait]
pub trait ControlTransport: Send + Sync + 'static {
    async fn send_control(
        &self,
        action: ControlAction,
    ) -> Result<oneshot::Receiver<Acknowledgement>, PciError>;
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Controller tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Upper bound on the wait for an acknowledgement.
    pub ack_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_millis(DEFAULT_ACK_TIMEOUT_MS),
        }
    }
}

/// Result of processing one store event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Not a `Created` event, or the cell is gone.
    Ignored,
    /// No collision.
    Unchanged(Pci),
    /// Collision resolved in the store; `action` still has to be applied.
    Reassigned { from: Pci, action: ControlAction },
    /// Arbitration or the store update failed; nothing was changed.
    Failed(PciError),
}

/// The Conflict Resolution Controller.
pub struct PciController<T> {
    store: Arc<FactStore>,
    ledger: Arc<ConflictLedger>,
    transport: Arc<T>,
    config: ControllerConfig,
    global: Option<Arc<RwLock<GlobalPciIndex>>>,
}

impl<T> Clone for PciController<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ledger: Arc::clone(&self.ledger),
            transport: Arc::clone(&self.transport),
            config: self.config,
            global: self.global.clone(),
        }
    }
}

impl<T: ControlTransport> PciController<T> {
    #[must_use]
    pub fn new(
        store: Arc<FactStore>,
        ledger: Arc<ConflictLedger>,
        transport: Arc<T>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            transport,
            config,
            global: None,
        }
    }

    /// Resolve neighbors without a fact through a shared PCI index.
    ///
    /// The caller owns the index and keeps it current from its topology
    /// source; the controller only reads it during arbitration.
    #[must_use]
    pub fn with_global_index(mut self, index: Arc<RwLock<GlobalPciIndex>>) -> Self {
        self.global = Some(index);
        self
    }

    #[must_use]
    pub fn config(&self) -> ControllerConfig {
        self.config
    }

    /// Arbitrate the cell behind `event` and persist a changed PCI.
    ///
    /// The target is re-read from a fresh store snapshot, so a duplicate or
    /// stale event for an already corrected cell yields `Unchanged`.
    pub fn process(&self, event: &Event) -> Decision {
        if event.kind != EventType::Created {
            return Decision::Ignored;
        }

        let key = event.key;
        let snapshot = self.store.snapshot();
        let Some(target) = snapshot.get(&key) else {
            tracing::debug!(cell = %key, "Cell removed before arbitration");
            return Decision::Ignored;
        };

        let result = {
            let index = self.global.as_ref().map(|g| g.read());
            let mut arbitrator = Arbitrator::new(target);
            if let Some(index) = index.as_deref() {
                arbitrator = arbitrator.with_global_index(index);
            }
            arbitrator.arbitrate(&snapshot)
        };

        let arbitration = match result {
            Ok(arbitration) => arbitration,
            Err(e @ PciError::PciExhausted(_)) => {
                self.ledger.record_detected(key);
                tracing::warn!(cell = %key, pci = %target.pci(), "PCI conflict unresolved: {}", e);
                return Decision::Failed(e);
            }
            Err(e) => {
                tracing::error!(cell = %key, "Arbitration failed: {}", e);
                return Decision::Failed(e);
            }
        };

        tracing::debug!(
            cell = %key,
            in_scope = arbitration.neighborhood.len(),
            one_hop = arbitration.neighborhood.at_hops(1).count(),
            "Neighborhood computed"
        );

        match arbitration.verdict {
            Verdict::Unchanged { pci } => Decision::Unchanged(pci),
            Verdict::Reassign { from, to } => {
                self.ledger.record_detected(key);
                if let Err(e) = self.store.update_pci(key, to) {
                    tracing::warn!(cell = %key, "Could not persist PCI change: {}", e);
                    return Decision::Failed(e);
                }
                tracing::info!(cell = %key, cgi = %target.cgi, from = %from, to = %to, "PCI conflict resolved");
                Decision::Reassigned {
                    from,
                    action: ControlAction {
                        key,
                        cgi: target.cgi,
                        node_id: target.node_id.clone(),
                        pci: to,
                    },
                }
            }
        }
    }

    /// Send `action` and wait for its acknowledgement.
    ///
    /// Returns `None` when `ctx` is cancelled first; otherwise the outcome,
    /// which has already been counted in the ledger.
    pub async fn apply(&self, action: ControlAction, ctx: &CancellationToken) -> Option<AckOutcome> {
        let key = action.key;
        let pci = action.pci;
        let result = tokio::select! {
            () = ctx.cancelled() => {
                tracing::debug!(cell = %key, "Control wait aborted by shutdown");
                return None;
            }
            result = self.deliver(action) => result,
        };

        let outcome = match result {
            Ok(()) => AckOutcome::Applied,
            Err(PciError::AckRejected { .. }) => AckOutcome::Rejected,
            Err(PciError::AckTimeout { .. }) => AckOutcome::TimedOut,
            Err(_) => AckOutcome::Undelivered,
        };
        match &result {
            Ok(()) => tracing::info!(cell = %key, pci = %pci, "Control acknowledged"),
            Err(e) => tracing::warn!(cell = %key, pci = %pci, outcome = ?outcome, "Control not confirmed: {}", e),
        }
        self.ledger.record_resolution(key, outcome);
        Some(outcome)
    }

    async fn deliver(&self, action: ControlAction) -> Result<(), PciError> {
        let key = action.key;
        let ack = self.transport.send_control(action).await?;
        match tokio::time::timeout(self.config.ack_timeout, ack).await {
            Err(_) => Err(PciError::AckTimeout {
                cell: key,
                after_ms: self.config.ack_timeout.as_millis() as u64,
            }),
            Ok(Err(_)) => Err(PciError::Transport(
                "acknowledgement channel closed".to_string(),
            )),
            Ok(Ok(Acknowledgement::Applied)) => Ok(()),
            Ok(Ok(Acknowledgement::Rejected { cause })) => {
                Err(PciError::AckRejected { cell: key, cause })
            }
        }
    }

    /// Process one event to completion, including the acknowledgement wait.
    pub async fn handle(&self, event: &Event, ctx: &CancellationToken) -> Decision {
        let decision = self.process(event);
        if let Decision::Reassigned { action, .. } = &decision {
            self.apply(action.clone(), ctx).await;
        }
        decision
    }

    /// Consume the store's change feed until `ctx` is cancelled.
    pub async fn run(&self, ctx: CancellationToken) -> Result<(), PciError> {
        let mut events = self.store.watch(ctx.child_token())?;
        let mut inflight = JoinSet::new();
        tracing::info!(
            ack_timeout_ms = self.config.ack_timeout.as_millis() as u64,
            "PCI controller started"
        );

        loop {
            tokio::select! {
                () = ctx.cancelled() => break,
                Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                    if let Err(e) = joined {
                        tracing::warn!("Acknowledgement task ended abnormally: {}", e);
                    }
                }
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if let Decision::Reassigned { action, .. } = self.process(&event) {
                        let this = self.clone();
                        let ctx = ctx.clone();
                        inflight.spawn(async move {
                            this.apply(action, &ctx).await;
                        });
                    }
                }
            }
        }

        inflight.abort_all();
        while inflight.join_next().await.is_some() {}
        tracing::info!("PCI controller stopped");
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
