//! Quantum gate types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Gates the compiler routes between nodes.
///
/// The compiler treats gates opaquely: it never inspects a unitary, only the
/// operand count and the owning node(s). Front ends may register additional
/// gates through the [`Gate::Custom`] variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Gate {
    // Single-qubit Pauli gates
    /// Identity gate.
    I,
    /// Pauli-X gate.
    X,
    /// Pauli-Y gate.
    Y,
    /// Pauli-Z gate.
    Z,

    // Single-qubit Clifford gates
    /// Hadamard gate.
    H,
    /// S gate (sqrt(Z)).
    S,
    /// S-dagger gate.
    Sdg,
    /// T gate (fourth root of Z).
    T,
    /// T-dagger gate.
    Tdg,

    // Single-qubit rotation gates
    /// Rotation around X axis.
    Rx(f64),
    /// Rotation around Y axis.
    Ry(f64),
    /// Rotation around Z axis.
    Rz(f64),
    /// Phase gate.
    P(f64),

    // Two-qubit gates
    /// Controlled-X (CNOT) gate.
    CX,
    /// Controlled-Y gate.
    CY,
    /// Controlled-Z gate.
    CZ,
    /// SWAP gate.
    Swap,

    /// Front-end-defined gate with a fixed operand count.
    Custom {
        /// Gate name as the front end declared it.
        name: String,
        /// Concrete parameter values, if any.
        params: Vec<f64>,
        /// Number of qubits the gate acts on.
        num_qubits: u32,
    },
}

impl Gate {
    /// Get the name of this gate.
    #[inline]
    pub fn name(&self) -> &str {
        match self {
            Gate::I => "id",
            Gate::X => "x",
            Gate::Y => "y",
            Gate::Z => "z",
            Gate::H => "h",
            Gate::S => "s",
            Gate::Sdg => "sdg",
            Gate::T => "t",
            Gate::Tdg => "tdg",
            Gate::Rx(_) => "rx",
            Gate::Ry(_) => "ry",
            Gate::Rz(_) => "rz",
            Gate::P(_) => "p",
            Gate::CX => "cx",
            Gate::CY => "cy",
            Gate::CZ => "cz",
            Gate::Swap => "swap",
            Gate::Custom { name, .. } => name,
        }
    }

    /// Get the number of qubits this gate operates on.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        match self {
            Gate::I
            | Gate::X
            | Gate::Y
            | Gate::Z
            | Gate::H
            | Gate::S
            | Gate::Sdg
            | Gate::T
            | Gate::Tdg
            | Gate::Rx(_)
            | Gate::Ry(_)
            | Gate::Rz(_)
            | Gate::P(_) => 1,
            Gate::CX | Gate::CY | Gate::CZ | Gate::Swap => 2,
            Gate::Custom { num_qubits, .. } => *num_qubits,
        }
    }

    /// Check if this is a two-qubit gate.
    #[inline]
    pub fn is_two_qubit(&self) -> bool {
        self.num_qubits() == 2
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_names() {
        assert_eq!(Gate::H.name(), "h");
        assert_eq!(Gate::CX.name(), "cx");
        assert_eq!(Gate::Rz(1.5).name(), "rz");
    }

    #[test]
    fn test_gate_arity() {
        assert_eq!(Gate::X.num_qubits(), 1);
        assert_eq!(Gate::Swap.num_qubits(), 2);
        assert!(Gate::CZ.is_two_qubit());
        assert!(!Gate::T.is_two_qubit());
    }

    #[test]
    fn test_custom_gate() {
        let g = Gate::Custom {
            name: "rzz".into(),
            params: vec![0.25],
            num_qubits: 2,
        };
        assert_eq!(g.name(), "rzz");
        assert!(g.is_two_qubit());
    }
}
