//! Classical messaging between node runtimes.
//!
//! Nodes exchange correction payloads over an in-memory router of per-node
//! endpoints. Sending never blocks; receiving suspends until a message from
//! the named partner arrives. Messages from other partners arriving in the
//! meantime are stashed, not dropped: a node may be mid-protocol with more
//! than one partner across its schedule.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{RuntimeError, RuntimeResult};

/// Correction payload carried by a classical message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrectionPayload {
    /// Single measurement outcome from a cat entangle or disentangle step.
    CatBit(u8),
    /// Bell-measurement outcome pair from a teleportation step.
    TpBits {
        /// Comm-qubit measurement outcome.
        m1: u8,
        /// Teleported-qubit measurement outcome.
        m2: u8,
    },
}

/// A classical message between nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassicalMessage {
    /// Sending node.
    pub from: String,
    /// Correction payload.
    pub payload: CorrectionPayload,
}

/// Build the per-node endpoints of a fully connected classical network.
pub struct ClassicalRouter;

impl ClassicalRouter {
    /// Create one endpoint per node name. Every endpoint can send to every
    /// other.
    pub fn build(names: &[String]) -> FxHashMap<String, ClassicalEndpoint> {
        let mut senders = FxHashMap::default();
        let mut receivers = FxHashMap::default();
        for name in names {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.insert(name.clone(), tx);
            receivers.insert(name.clone(), rx);
        }
        names
            .iter()
            .map(|name| {
                let endpoint = ClassicalEndpoint {
                    node: name.clone(),
                    senders: senders.clone(),
                    receiver: receivers
                        .remove(name)
                        .unwrap_or_else(|| mpsc::unbounded_channel().1),
                    stash: VecDeque::new(),
                };
                (name.clone(), endpoint)
            })
            .collect()
    }
}

/// One node's attachment to the classical network.
#[derive(Debug)]
pub struct ClassicalEndpoint {
    node: String,
    senders: FxHashMap<String, mpsc::UnboundedSender<ClassicalMessage>>,
    receiver: mpsc::UnboundedReceiver<ClassicalMessage>,
    stash: VecDeque<ClassicalMessage>,
}

impl ClassicalEndpoint {
    /// The owning node's name.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Send a payload to a partner. Non-blocking for the sender.
    pub fn send(&self, to: &str, payload: CorrectionPayload) -> RuntimeResult<()> {
        let sender = self
            .senders
            .get(to)
            .ok_or_else(|| RuntimeError::ChannelClosed(to.to_string()))?;
        trace!(from = %self.node, to, ?payload, "classical send");
        sender
            .send(ClassicalMessage {
                from: self.node.clone(),
                payload,
            })
            .map_err(|_| RuntimeError::ChannelClosed(to.to_string()))
    }

    /// Await the next message from the named partner. Messages from other
    /// partners are stashed in arrival order.
    pub async fn recv_from(&mut self, partner: &str) -> RuntimeResult<CorrectionPayload> {
        if let Some(position) = self.stash.iter().position(|m| m.from == partner) {
            let message = self
                .stash
                .remove(position)
                .ok_or_else(|| RuntimeError::ChannelClosed(partner.to_string()))?;
            return Ok(message.payload);
        }
        loop {
            let message = self
                .receiver
                .recv()
                .await
                .ok_or_else(|| RuntimeError::ChannelClosed(partner.to_string()))?;
            if message.from == partner {
                trace!(node = %self.node, partner, ?message.payload, "classical recv");
                return Ok(message.payload);
            }
            self.stash.push_back(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_and_recv() {
        let names = vec!["node_0".to_string(), "node_1".to_string()];
        let mut endpoints = ClassicalRouter::build(&names);
        let a = endpoints.remove("node_0").unwrap();
        let mut b = endpoints.remove("node_1").unwrap();

        a.send("node_1", CorrectionPayload::CatBit(1)).unwrap();
        let payload = b.recv_from("node_0").await.unwrap();
        assert_eq!(payload, CorrectionPayload::CatBit(1));
    }

    #[tokio::test]
    async fn test_recv_stashes_other_partners() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut endpoints = ClassicalRouter::build(&names);
        let a = endpoints.remove("a").unwrap();
        let b = endpoints.remove("b").unwrap();
        let mut c = endpoints.remove("c").unwrap();

        // b's message arrives first but c is waiting on a.
        b.send("c", CorrectionPayload::CatBit(0)).unwrap();
        a.send("c", CorrectionPayload::TpBits { m1: 1, m2: 0 }).unwrap();

        let from_a = c.recv_from("a").await.unwrap();
        assert_eq!(from_a, CorrectionPayload::TpBits { m1: 1, m2: 0 });
        // The stashed message from b is still deliverable.
        let from_b = c.recv_from("b").await.unwrap();
        assert_eq!(from_b, CorrectionPayload::CatBit(0));
    }

    #[tokio::test]
    async fn test_send_to_unknown_partner_fails() {
        let names = vec!["a".to_string()];
        let mut endpoints = ClassicalRouter::build(&names);
        let a = endpoints.remove("a").unwrap();
        assert!(matches!(
            a.send("ghost", CorrectionPayload::CatBit(0)),
            Err(RuntimeError::ChannelClosed(_))
        ));
    }
}
