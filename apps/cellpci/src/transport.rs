//! # Loopback Control Transport
//!
//! Stands in for the southbound control channel: every corrective action is
//! answered locally after a fixed delay, as if the owning network element
//! had applied (or refused) it.

use crate::config::TransportSection;
use async_trait::async_trait;
use cellpci_core::{Acknowledgement, ControlAction, ControlTransport, PciError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// Answers corrective actions without leaving the process.
#[derive(Debug)]
pub struct LoopbackTransport {
    ack_delay: Duration,
    reject: bool,
    sent: AtomicU64,
}

impl LoopbackTransport {
    #[must_use]
    pub fn new(ack_delay: Duration, reject: bool) -> Self {
        Self {
            ack_delay,
            reject,
            sent: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn from_config(section: &TransportSection) -> Self {
        Self::new(Duration::from_millis(section.ack_delay_ms), section.reject)
    }

    /// Actions handed to this transport so far.
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ControlTransport for LoopbackTransport {
    async fn send_control(
        &self,
        action: ControlAction,
    ) -> Result<oneshot::Receiver<Acknowledgement>, PciError> {
        let (tx, rx) = oneshot::channel();
        self.sent.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            cell = %action.key,
            node = action.node_id.as_str(),
            pci = %action.pci,
            "Control action sent"
        );

        let delay = self.ack_delay;
        let reject = self.reject;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let ack = if reject {
                Acknowledgement::Rejected {
                    cause: "rejected by loopback transport".to_string(),
                }
            } else {
                Acknowledgement::Applied
            };
            // The controller may have stopped waiting.
            let _ = tx.send(ack);
        });

        Ok(rx)
    }
}

// =============================================================================
// TESTS
// =============================================================================
