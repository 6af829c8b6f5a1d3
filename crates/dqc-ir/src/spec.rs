//! Node-qualified gate specifications.
//!
//! A [`GateSpec`] sequence is the exchange format between the front end, the
//! partitioner and the compiler. Before partitioning the `node` fields hold
//! quantum-register names; the partitioner's rewrite step replaces them with
//! node names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::IrError;
use crate::gate::Gate;
use crate::op::LocalOp;

/// Node name used while a circuit awaits automated partitioning.
pub const PLACEHOLDER_NODE: &str = "placeholder";

/// Node name standing for a single monolithic processor.
pub const MONOLITHIC_NODE: &str = "monolithic_qc";

/// Remote-gate scheme selected for a cross-node two-qubit gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    /// Entanglement-based cat communication: one entangled pair and one
    /// classical-correction round, neither operand is teleported.
    Cat,
    /// Gate teleportation without acknowledgment; the control proceeds
    /// before the target has confirmed its correction.
    TpRisky,
    /// Gate teleportation with a second round teleporting the result back,
    /// guaranteeing acknowledgment before later gates on the same qubit.
    TpSafe,
}

impl Scheme {
    /// The communication kind this scheme compiles down to.
    pub fn comm_kind(&self) -> CommKind {
        match self {
            Scheme::Cat => CommKind::Cat,
            Scheme::TpRisky | Scheme::TpSafe => CommKind::Tp,
        }
    }

    /// Canonical token for this scheme.
    pub fn token(&self) -> &'static str {
        match self {
            Scheme::Cat => "cat",
            Scheme::TpRisky => "tp_risky",
            Scheme::TpSafe => "tp_safe",
        }
    }
}

impl FromStr for Scheme {
    type Err = IrError;

    /// Parse a scheme token. `"1tp"` and `"2tp"` are accepted aliases for
    /// `"tp_risky"` and `"tp_safe"`.
    fn from_str(token: &str) -> Result<Self, IrError> {
        match token {
            "cat" => Ok(Scheme::Cat),
            "tp_risky" | "1tp" => Ok(Scheme::TpRisky),
            "tp_safe" | "2tp" => Ok(Scheme::TpSafe),
            other => Err(IrError::UnknownScheme(other.to_string())),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Communication kind carried by compiled primitives.
///
/// Both teleportation variants collapse to [`CommKind::Tp`] once expanded;
/// the variants differ only in the shape of the expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommKind {
    /// Cat communication.
    Cat,
    /// Gate teleportation.
    Tp,
}

impl fmt::Display for CommKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommKind::Cat => write!(f, "cat"),
            CommKind::Tp => write!(f, "tp"),
        }
    }
}

/// The local interaction enacted at the target node of a two-qubit gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RemoteInteraction {
    /// A single native two-qubit gate. For a remote expansion the first
    /// operand becomes the comm placeholder and the second the target's
    /// data qubit.
    Gate(Gate),
    /// A caller-supplied block of local operations enacted at the target
    /// node between the correction and disentangling steps. Operands may
    /// use the comm placeholder.
    Block(Vec<LocalOp>),
}

impl RemoteInteraction {
    /// Get the plain gate, if this is not a block.
    pub fn as_gate(&self) -> Option<&Gate> {
        match self {
            RemoteInteraction::Gate(g) => Some(g),
            RemoteInteraction::Block(_) => None,
        }
    }
}

impl From<Gate> for RemoteInteraction {
    fn from(gate: Gate) -> Self {
        RemoteInteraction::Gate(gate)
    }
}

/// One operation of a distributed circuit, tagged with the node(s) owning
/// its operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GateSpec {
    /// Initialize the listed qubits to |0⟩ on one node.
    Init {
        /// Qubit indices to initialize, in ascending order.
        qubits: Vec<u32>,
        /// Owning register or node name.
        node: String,
    },
    /// Measure one qubit in the computational basis.
    Measure {
        /// Qubit index.
        qubit: u32,
        /// Owning register or node name.
        node: String,
    },
    /// A single-qubit gate.
    Single {
        /// The gate.
        gate: Gate,
        /// Qubit index.
        qubit: u32,
        /// Owning register or node name.
        node: String,
    },
    /// A two-qubit gate, possibly spanning two nodes.
    Two {
        /// The interaction applied once both operands are reachable.
        interaction: RemoteInteraction,
        /// First operand index.
        qubit_a: u32,
        /// Register or node owning the first operand.
        node_a: String,
        /// Second operand index.
        qubit_b: u32,
        /// Register or node owning the second operand.
        node_b: String,
        /// Remote-gate scheme; present iff `node_a != node_b`.
        scheme: Option<Scheme>,
    },
}

impl GateSpec {
    /// Create a single-qubit gate spec.
    pub fn single(gate: Gate, qubit: u32, node: impl Into<String>) -> Self {
        GateSpec::Single {
            gate,
            qubit,
            node: node.into(),
        }
    }

    /// Create a local two-qubit gate spec.
    pub fn two_local(
        gate: Gate,
        qubit_a: u32,
        qubit_b: u32,
        node: impl Into<String>,
    ) -> Self {
        let node = node.into();
        GateSpec::Two {
            interaction: RemoteInteraction::Gate(gate),
            qubit_a,
            node_a: node.clone(),
            qubit_b,
            node_b: node,
            scheme: None,
        }
    }

    /// Create a remote two-qubit gate spec.
    pub fn two_remote(
        interaction: impl Into<RemoteInteraction>,
        qubit_a: u32,
        node_a: impl Into<String>,
        qubit_b: u32,
        node_b: impl Into<String>,
        scheme: Scheme,
    ) -> Self {
        GateSpec::Two {
            interaction: interaction.into(),
            qubit_a,
            node_a: node_a.into(),
            qubit_b,
            node_b: node_b.into(),
            scheme: Some(scheme),
        }
    }

    /// Check if this is a two-qubit gate spec.
    pub fn is_two_qubit(&self) -> bool {
        matches!(self, GateSpec::Two { .. })
    }

    /// Check if this spec spans two distinct nodes.
    pub fn is_remote(&self) -> bool {
        match self {
            GateSpec::Two { node_a, node_b, .. } => node_a != node_b,
            _ => false,
        }
    }

    /// Check the scheme-presence invariant: a two-qubit gate carries a
    /// scheme iff its two node names differ. Non-two-qubit specs satisfy
    /// the invariant trivially.
    pub fn scheme_invariant_holds(&self) -> bool {
        match self {
            GateSpec::Two {
                node_a,
                node_b,
                scheme,
                ..
            } => (node_a != node_b) == scheme.is_some(),
            _ => true,
        }
    }

    /// Node names referenced by this spec.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        let (first, second) = match self {
            GateSpec::Init { node, .. }
            | GateSpec::Measure { node, .. }
            | GateSpec::Single { node, .. } => (node.as_str(), None),
            GateSpec::Two { node_a, node_b, .. } => (node_a.as_str(), Some(node_b.as_str())),
        };
        std::iter::once(first).chain(second)
    }
}
