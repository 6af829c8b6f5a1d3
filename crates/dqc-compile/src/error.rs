//! Error types for compilation.
//!
//! Every variant is a configuration error in the sense of the runtime/compile
//! split: detected eagerly at compile time, never silently ignored, never
//! retried; the caller must resupply a corrected circuit.

use dqc_ir::IrError;
use thiserror::Error;

/// Errors that can occur during partitioning or scheduling.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// The gate sequence does not start with an initialization command.
    #[error("gate sequence must start with an Init enumerating every qubit")]
    MissingInit,

    /// The initial Init does not enumerate the full qubit range.
    #[error("malformed initial Init: {0}")]
    MalformedInit(String),

    /// A qubit index falls outside the allocated address space.
    #[error("qubit index {index} is out of range for this allocation")]
    QubitOutOfRange {
        /// The offending monolithic index.
        index: u32,
    },

    /// The node roster is too small for the requested topology.
    #[error("insufficient nodes: need at least {needed}, got {got}")]
    InsufficientNodes {
        /// Minimum roster size required.
        needed: usize,
        /// Roster size supplied.
        got: usize,
    },

    /// A gate still references the partitioning placeholder.
    #[error("gate references placeholder node '{0}'; partition the circuit before compiling")]
    PlaceholderNode(String),

    /// A gate references a node missing from the roster.
    #[error("gate references unknown node '{0}'")]
    UnknownNode(String),

    /// Scheme presence violates the cross-node invariant.
    #[error("two-qubit gate on '{node_a}'/'{node_b}' violates the scheme-presence invariant")]
    SchemeInvariant {
        /// First operand's node.
        node_a: String,
        /// Second operand's node.
        node_b: String,
    },

    /// A caller-supplied interaction block on a gate that is not remote.
    #[error("caller-supplied interaction blocks are only valid on remote gates")]
    BlockOnLocalGate,

    /// An operation requires a partitioned circuit.
    #[error("circuit is not partitioned")]
    NotPartitioned,

    /// An underlying IR error (unknown scheme token, unknown register, lock).
    #[error(transparent)]
    Ir(#[from] IrError),
}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;
