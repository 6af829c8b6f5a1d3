//! Compiled per-node schedules.
//!
//! A [`NodeSchedule`] is the compiler's output for one node: an ordered list
//! of [`TimeSlice`]s, each an ordered batch of [`Primitive`]s executed as one
//! contiguous unit between cross-node synchronization points. Within a node,
//! primitive order equals input program order; across nodes no slice-index
//! correspondence is implied; ordering is established only through the
//! entangle/correct pairing at runtime.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::op::{LocalOp, Operand};
use crate::spec::CommKind;

/// One scheduled primitive on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    /// A purely local operation.
    Local(LocalOp),
    /// Request one half of an entangled pair and cat-entangle the given
    /// local qubit into it; the physical comm slot is chosen at runtime.
    RequestEntangle {
        /// Local qubit to entangle through the pair.
        qubit: u32,
        /// Partner node name.
        partner: String,
        /// Communication kind.
        kind: CommKind,
    },
    /// Await the partner's measurement outcome and apply the conditional
    /// correction, reserving the comm qubit that now carries the operand.
    Correct {
        /// Partner node name.
        partner: String,
        /// Communication kind.
        kind: CommKind,
    },
    /// Measure out this node's half of the cat state and send the outcome
    /// to the partner (non-blocking for the sender).
    DisentangleStart {
        /// Local qubit measured out of the cat state.
        qubit: u32,
        /// Partner node name.
        partner: String,
        /// Communication kind.
        kind: CommKind,
    },
    /// Await the partner's disentangling outcome and apply the conditional
    /// phase fix to the given local qubit.
    DisentangleEnd {
        /// Local qubit holding the cat-entangled operand.
        qubit: u32,
        /// Partner node name.
        partner: String,
        /// Communication kind.
        kind: CommKind,
    },
    /// Bell-measure the given qubit against a fresh comm half and send both
    /// outcome bits to the partner (non-blocking for the sender).
    BellMeasure {
        /// Qubit to teleport; `Comm` teleports the comm-held operand back.
        qubit: Operand,
        /// Partner node name.
        partner: String,
        /// Communication kind.
        kind: CommKind,
    },
    /// Await teleportation corrections without reserving the comm qubit;
    /// used by the safe-teleport return round.
    CorrectTeleportOnly {
        /// Partner node name.
        partner: String,
        /// Communication kind.
        kind: CommKind,
    },
}

impl Primitive {
    /// Check if this primitive is purely local.
    pub fn is_local(&self) -> bool {
        matches!(self, Primitive::Local(_))
    }

    /// Partner node, for communication primitives.
    pub fn partner(&self) -> Option<&str> {
        match self {
            Primitive::Local(_) => None,
            Primitive::RequestEntangle { partner, .. }
            | Primitive::Correct { partner, .. }
            | Primitive::DisentangleStart { partner, .. }
            | Primitive::DisentangleEnd { partner, .. }
            | Primitive::BellMeasure { partner, .. }
            | Primitive::CorrectTeleportOnly { partner, .. } => Some(partner),
        }
    }
}

/// An ordered batch of primitives executed as one unit.
pub type TimeSlice = Vec<Primitive>;

/// The compiled schedule for a single node.
///
/// Owned exclusively by one runtime instance; schedules are never shared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSchedule {
    /// Time slices in execution order.
    pub slices: Vec<TimeSlice>,
}

impl NodeSchedule {
    /// Create an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of time slices.
    pub fn num_slices(&self) -> usize {
        self.slices.len()
    }

    /// Total number of primitives across all slices.
    pub fn num_primitives(&self) -> usize {
        self.slices.iter().map(Vec::len).sum()
    }

    /// Iterate over all primitives in schedule order.
    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.slices.iter().flatten()
    }
}

impl From<Vec<TimeSlice>> for NodeSchedule {
    fn from(slices: Vec<TimeSlice>) -> Self {
        Self { slices }
    }
}

/// The full compiler output: one schedule per node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledProgram {
    /// Node name → schedule.
    pub schedules: FxHashMap<String, NodeSchedule>,
}

impl CompiledProgram {
    /// Number of nodes with a schedule.
    pub fn num_nodes(&self) -> usize {
        self.schedules.len()
    }

    /// Get the schedule for a node, if any.
    pub fn schedule(&self, node: &str) -> Option<&NodeSchedule> {
        self.schedules.get(node)
    }

    /// Node names in deterministic (sorted) order.
    pub fn node_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.schedules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Total primitives across all nodes.
    pub fn num_primitives(&self) -> usize {
        self.schedules.values().map(NodeSchedule::num_primitives).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::Gate;

    #[test]
    fn test_schedule_counts() {
        let schedule = NodeSchedule::from(vec![
            vec![
                Primitive::Local(LocalOp::single(Gate::X, 3)),
                Primitive::Local(LocalOp::single(Gate::Y, 2)),
            ],
            vec![Primitive::Correct {
                partner: "node_0".into(),
                kind: CommKind::Tp,
            }],
        ]);
        assert_eq!(schedule.num_slices(), 2);
        assert_eq!(schedule.num_primitives(), 3);
    }

    #[test]
    fn test_partner_accessor() {
        let p = Primitive::RequestEntangle {
            qubit: 2,
            partner: "node_1".into(),
            kind: CommKind::Cat,
        };
        assert_eq!(p.partner(), Some("node_1"));
        assert!(Primitive::Local(LocalOp::single(Gate::H, 0)).partner().is_none());
    }

    #[test]
    fn test_program_node_names_sorted() {
        let mut program = CompiledProgram::default();
        program.schedules.insert("node_1".into(), NodeSchedule::new());
        program.schedules.insert("node_0".into(), NodeSchedule::new());
        assert_eq!(program.node_names(), vec!["node_0", "node_1"]);
    }

    #[test]
    fn test_serde_roundtrip() {
        let schedule = NodeSchedule::from(vec![vec![Primitive::BellMeasure {
            qubit: Operand::Comm,
            partner: "node_0".into(),
            kind: CommKind::Tp,
        }]]);
        let json = serde_json::to_string(&schedule).unwrap();
        let back: NodeSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(schedule, back);
    }
}
