//! Link-layer collaborator interface.
//!
//! The runtime never generates entanglement itself: it hands a request to a
//! [`LinkLayer`] implementation and suspends until the matching ready or
//! failed event. The provided [`SimulatedLinkLayer`] services a request only
//! once both sides of the node pair have asked, which is what establishes
//! cross-node ordering for remote gates. Entanglement latency and failure
//! modeling (and any timeouts) live here, not in the runtime core.

use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{RuntimeError, RuntimeResult};

/// Wire label of an entanglement request.
pub const ENT_REQUEST_LABEL: &str = "ENT_REQUEST";
/// Wire label of a successful entanglement delivery.
pub const ENT_READY_LABEL: &str = "ENT_READY";
/// Wire label of a failed entanglement attempt.
pub const ENT_FAILED_LABEL: &str = "ENT_FAILED";

/// Which side of the remote gate is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntanglementRole {
    /// The side that initiates the remote gate (control).
    Sender,
    /// The side that applies the correction (target).
    Receiver,
}

/// The kind of entangled resource requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntanglementKind {
    /// A two-qubit Bell pair.
    BellPair,
}

/// An entanglement request handed to the link layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntanglementRequest {
    /// Correlation id.
    pub id: Uuid,
    /// Which side of the remote gate is asking.
    pub role: EntanglementRole,
    /// Requesting node.
    pub requester: String,
    /// Partner node.
    pub partner: String,
    /// Comm slots the requester wants filled.
    pub comm_qubit_indices: Vec<u32>,
    /// Number of pairs requested.
    pub count: u32,
    /// Kind of entanglement requested.
    pub kind: EntanglementKind,
}

/// Outcome of an entanglement request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntanglementOutcome {
    /// The pair is in place; the requested comm slots hold one half each.
    Ready,
    /// Generation failed; the requester may retry per its policy.
    Failed {
        /// Link-layer failure reason.
        reason: String,
    },
}

impl EntanglementOutcome {
    /// Wire label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            EntanglementOutcome::Ready => ENT_READY_LABEL,
            EntanglementOutcome::Failed { .. } => ENT_FAILED_LABEL,
        }
    }
}

/// Link-layer collaborator servicing entanglement requests.
#[async_trait]
pub trait LinkLayer: Send + Sync {
    /// Request entanglement with a partner and suspend until the ready or
    /// failed event for this request.
    async fn request_entanglement(
        &self,
        request: EntanglementRequest,
    ) -> RuntimeResult<EntanglementOutcome>;
}

/// Unordered node pair, the pairing key for matching requests.
fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// In-memory link layer for simulated fabrics.
///
/// A request parks until the partner's matching request arrives; the second
/// arrival samples one outcome and delivers it to both sides. With zero
/// latency and zero failure probability this is a perfect, instantaneous
/// link.
pub struct SimulatedLinkLayer {
    latency: Duration,
    failure_probability: f64,
    rng: Mutex<StdRng>,
    pending: Mutex<FxHashMap<(String, String), oneshot::Sender<EntanglementOutcome>>>,
}

impl SimulatedLinkLayer {
    /// A perfect link: no latency, no failures.
    pub fn perfect() -> Self {
        Self::new(Duration::ZERO, 0.0, 0)
    }

    /// A link with fixed latency and a per-request failure probability.
    /// The failure stream is seeded for reproducible runs.
    pub fn new(latency: Duration, failure_probability: f64, seed: u64) -> Self {
        Self {
            latency,
            failure_probability,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            pending: Mutex::new(FxHashMap::default()),
        }
    }

    async fn sample_outcome(&self) -> EntanglementOutcome {
        if self.failure_probability > 0.0 {
            let mut rng = self.rng.lock().await;
            if rng.gen_range(0.0..1.0) < self.failure_probability {
                return EntanglementOutcome::Failed {
                    reason: "entanglement generation attempt failed".to_string(),
                };
            }
        }
        EntanglementOutcome::Ready
    }
}

#[async_trait]
impl LinkLayer for SimulatedLinkLayer {
    async fn request_entanglement(
        &self,
        request: EntanglementRequest,
    ) -> RuntimeResult<EntanglementOutcome> {
        debug!(
            label = ENT_REQUEST_LABEL,
            id = %request.id,
            requester = %request.requester,
            partner = %request.partner,
            "entanglement requested"
        );
        let key = pair_key(&request.requester, &request.partner);
        let waiter = {
            let mut pending = self.pending.lock().await;
            match pending.remove(&key) {
                Some(other_side) => Some(other_side),
                None => {
                    let (tx, rx) = oneshot::channel();
                    pending.insert(key, tx);
                    drop(pending);
                    // First arrival: park until the partner's matching request.
                    let outcome = rx.await.map_err(|_| {
                        RuntimeError::ChannelClosed(request.partner.clone())
                    })?;
                    return Ok(outcome);
                }
            }
        };

        // Second arrival: both sides are committed, decide the outcome once.
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let outcome = self.sample_outcome().await;
        if let EntanglementOutcome::Failed { reason } = &outcome {
            warn!(label = outcome.label(), reason, "entanglement attempt failed");
        } else {
            debug!(label = outcome.label(), "entanglement ready");
        }
        if let Some(other_side) = waiter {
            // The partner may have aborted; its schedule owner reports that.
            let _ = other_side.send(outcome.clone());
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn request(requester: &str, partner: &str) -> EntanglementRequest {
        EntanglementRequest {
            id: Uuid::new_v4(),
            role: EntanglementRole::Sender,
            requester: requester.to_string(),
            partner: partner.to_string(),
            comm_qubit_indices: vec![0],
            count: 1,
            kind: EntanglementKind::BellPair,
        }
    }

    #[tokio::test]
    async fn test_single_side_parks() {
        let link = Arc::new(SimulatedLinkLayer::perfect());
        let pending = link.clone();
        let lone =
            tokio::time::timeout(Duration::from_millis(20), async move {
                pending.request_entanglement(request("a", "b")).await
            })
            .await;
        // No partner request: the call must still be suspended.
        assert!(lone.is_err());
    }

    #[tokio::test]
    async fn test_both_sides_resolve() {
        let link = Arc::new(SimulatedLinkLayer::perfect());
        let side_a = {
            let link = link.clone();
            tokio::spawn(async move { link.request_entanglement(request("a", "b")).await })
        };
        let side_b = link.request_entanglement(request("b", "a")).await.unwrap();
        assert_eq!(side_b, EntanglementOutcome::Ready);
        let side_a = side_a.await.unwrap().unwrap();
        assert_eq!(side_a, EntanglementOutcome::Ready);
    }

    #[tokio::test]
    async fn test_failing_link_fails_both_sides() {
        let link = Arc::new(SimulatedLinkLayer::new(Duration::ZERO, 1.0, 7));
        let side_a = {
            let link = link.clone();
            tokio::spawn(async move { link.request_entanglement(request("a", "b")).await })
        };
        let side_b = link.request_entanglement(request("b", "a")).await.unwrap();
        assert!(matches!(side_b, EntanglementOutcome::Failed { .. }));
        assert!(matches!(
            side_a.await.unwrap().unwrap(),
            EntanglementOutcome::Failed { .. }
        ));
    }
}
