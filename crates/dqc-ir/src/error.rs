//! Error types for the IR crate.

use thiserror::Error;

/// Errors that can occur in IR operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// Circuit has been locked and no longer accepts mutation.
    #[error("circuit is locked; the gate sequence is immutable")]
    Locked,

    /// Quantum register not found in circuit.
    #[error("quantum register '{0}' not found in circuit")]
    UnknownRegister(String),

    /// A register with this name already exists.
    #[error("register '{0}' already declared")]
    DuplicateRegister(String),

    /// Unrecognized remote-gate scheme token.
    #[error("unknown scheme token '{0}' (expected 'cat', 'tp_risky'/'1tp' or 'tp_safe'/'2tp')")]
    UnknownScheme(String),

    /// Gate requires a different number of operands.
    #[error("gate '{gate_name}' requires {expected} operands, got {got}")]
    OperandCountMismatch {
        /// Name of the gate.
        gate_name: String,
        /// Expected number of operands.
        expected: u32,
        /// Actual number of operands provided.
        got: u32,
    },
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
