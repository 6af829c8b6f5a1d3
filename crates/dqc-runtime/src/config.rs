//! Runtime configuration.

use serde::{Deserialize, Serialize};

/// Retry behavior after a transient entanglement failure.
///
/// The reference behavior leaves the retry policy unspecified, so it is an
/// explicit configuration point rather than a built-in default: out of the
/// box a failed request is surfaced to the caller without retrying. Latency
/// and backoff modeling belong to the link-layer collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per entanglement request, including the first.
    /// Values below 1 behave as 1.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Retry up to `max_attempts` total attempts.
    pub fn attempts(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 1 }
    }
}

/// Configuration shared by every node runtime of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Low memory positions reserved for comm qubits on every node.
    pub comm_qubits_per_node: u32,
    /// Retry policy after entanglement failure.
    pub retry: RetryPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            comm_qubits_per_node: 2,
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.comm_qubits_per_node, 2);
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = RuntimeConfig {
            comm_qubits_per_node: 1,
            retry: RetryPolicy::attempts(3),
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: RuntimeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
