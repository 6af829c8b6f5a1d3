//! Error handling for the runtime.

use thiserror::Error;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur while executing a compiled schedule.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RuntimeError {
    /// Unexpected classical-message shape or protocol state. Fatal; aborts
    /// the owning node only.
    #[error("protocol error on '{node}': {reason}")]
    Protocol {
        /// Node that hit the error.
        node: String,
        /// What went wrong.
        reason: String,
    },

    /// Entanglement generation failed and the retry budget is exhausted.
    #[error("entanglement with '{partner}' failed after {attempts} attempt(s): {reason}")]
    EntanglementFailure {
        /// Partner node of the failed request.
        partner: String,
        /// Attempts made, including the first.
        attempts: u32,
        /// Link-layer failure reason.
        reason: String,
    },

    /// The quantum-program engine rejected a program.
    #[error("engine error: {0}")]
    Engine(String),

    /// A classical channel to a partner is gone.
    #[error("classical channel to '{0}' is closed")]
    ChannelClosed(String),

    /// A node task could not be joined.
    #[error("node task '{0}' aborted: {1}")]
    Join(String, String),
}

impl RuntimeError {
    /// Construct a protocol error for a node.
    pub fn protocol(node: impl Into<String>, reason: impl Into<String>) -> Self {
        RuntimeError::Protocol {
            node: node.into(),
            reason: reason.into(),
        }
    }
}
