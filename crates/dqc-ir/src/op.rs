//! Local operations as scheduled for a single node.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::gate::Gate;

/// A local operand position.
///
/// `Comm` stands in for the comm qubit made available by the preceding
/// correction step of a remote-gate expansion; the runtime resolves it to a
/// concrete memory position once the correction has reserved a slot. It is
/// the tagged rendition of the reference encoding's `-1` placeholder and
/// displays as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    /// A concrete memory position on the owning node.
    Pos(u32),
    /// The comm qubit reserved by the preceding correction step.
    Comm,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Pos(p) => write!(f, "{p}"),
            Operand::Comm => write!(f, "-1"),
        }
    }
}

impl From<u32> for Operand {
    fn from(pos: u32) -> Self {
        Operand::Pos(pos)
    }
}

/// The kind of local instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstrKind {
    /// A quantum gate.
    Gate(Gate),
    /// Initialize qubits to |0⟩.
    Init,
    /// Measure qubits in the computational basis.
    Measure,
}

impl InstrKind {
    /// Get the name of the instruction.
    pub fn name(&self) -> &str {
        match self {
            InstrKind::Gate(g) => g.name(),
            InstrKind::Init => "init",
            InstrKind::Measure => "measure",
        }
    }
}

/// A local instruction with operands, executed on one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalOp {
    /// The instruction to execute.
    pub instr: InstrKind,
    /// Operand positions, in gate order.
    pub operands: Vec<Operand>,
}

impl LocalOp {
    /// Create a gate operation.
    pub fn gate(gate: Gate, operands: impl IntoIterator<Item = Operand>) -> Self {
        Self {
            instr: InstrKind::Gate(gate),
            operands: operands.into_iter().collect(),
        }
    }

    /// Create a single-qubit gate operation on a concrete position.
    pub fn single(gate: Gate, qubit: u32) -> Self {
        Self::gate(gate, [Operand::Pos(qubit)])
    }

    /// Create a two-qubit gate operation on concrete positions.
    pub fn two(gate: Gate, a: u32, b: u32) -> Self {
        Self::gate(gate, [Operand::Pos(a), Operand::Pos(b)])
    }

    /// Create an init operation over concrete positions.
    pub fn init(qubits: impl IntoIterator<Item = u32>) -> Self {
        Self {
            instr: InstrKind::Init,
            operands: qubits.into_iter().map(Operand::Pos).collect(),
        }
    }

    /// Create a measurement operation.
    pub fn measure(qubit: u32) -> Self {
        Self {
            instr: InstrKind::Measure,
            operands: vec![Operand::Pos(qubit)],
        }
    }

    /// Check whether any operand is the comm placeholder.
    pub fn uses_comm_operand(&self) -> bool {
        self.operands.contains(&Operand::Comm)
    }
}

impl fmt::Display for LocalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.instr.name())?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{operand}")?;
        }
        write!(f, ")")
    }
}
