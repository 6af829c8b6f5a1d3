//! Quantum-program engine collaborator interface.
//!
//! The runtime batches local operations into a [`LocalProgram`] and hands it
//! to a [`QuantumEngine`] for execution. The engine serializes access to a
//! given physical qubit by construction; the runtime never touches quantum
//! state itself. A state-vector or hardware engine is an external
//! collaborator; [`StubEngine`] stands in for tests and demos.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::trace;

use dqc_ir::Gate;

use crate::error::{RuntimeError, RuntimeResult};

/// One engine-level operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineOp {
    /// Apply a gate to concrete memory positions.
    Gate {
        /// The gate.
        gate: Gate,
        /// Memory positions, in gate order.
        qubits: Vec<u32>,
    },
    /// Initialize positions to |0⟩.
    Init {
        /// Memory positions.
        qubits: Vec<u32>,
    },
    /// Measure a position in the computational basis.
    Measure {
        /// Memory position.
        qubit: u32,
        /// Key under which the outcome is reported.
        key: String,
    },
}

/// An ordered batch of engine operations for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalProgram {
    /// Node the program runs on.
    pub node: String,
    /// Operations in execution order.
    pub ops: Vec<EngineOp>,
}

impl LocalProgram {
    /// Create an empty program for a node.
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            ops: vec![],
        }
    }

    /// Whether the program holds no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Append a gate application.
    pub fn apply(&mut self, gate: Gate, qubits: impl IntoIterator<Item = u32>) {
        self.ops.push(EngineOp::Gate {
            gate,
            qubits: qubits.into_iter().collect(),
        });
    }

    /// Append an initialization.
    pub fn init(&mut self, qubits: impl IntoIterator<Item = u32>) {
        self.ops.push(EngineOp::Init {
            qubits: qubits.into_iter().collect(),
        });
    }

    /// Append a measurement reported under `key`.
    pub fn measure(&mut self, qubit: u32, key: impl Into<String>) {
        self.ops.push(EngineOp::Measure {
            qubit,
            key: key.into(),
        });
    }
}

/// Measurement outcomes of an executed program, keyed by output label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramOutput {
    outcomes: FxHashMap<String, u8>,
}

impl ProgramOutput {
    /// Record an outcome.
    pub fn insert(&mut self, key: impl Into<String>, bit: u8) {
        self.outcomes.insert(key.into(), bit);
    }

    /// Look up an outcome; missing keys are an engine contract violation.
    pub fn outcome(&self, key: &str) -> RuntimeResult<u8> {
        self.outcomes
            .get(key)
            .copied()
            .ok_or_else(|| RuntimeError::Engine(format!("missing measurement outcome '{key}'")))
    }
}

/// Quantum-program engine collaborator.
#[async_trait]
pub trait QuantumEngine: Send + Sync {
    /// Execute a program and report its measurement outcomes.
    async fn execute(&self, program: LocalProgram) -> RuntimeResult<ProgramOutput>;
}

/// Recording engine for tests and demos.
///
/// Returns all-zero measurement outcomes by default, or a seeded random bit
/// stream, and keeps every executed program for inspection.
pub struct StubEngine {
    rng: Option<Mutex<StdRng>>,
    log: Mutex<Vec<LocalProgram>>,
}

impl StubEngine {
    /// Engine whose every measurement reads 0.
    pub fn zeros() -> Self {
        Self {
            rng: None,
            log: Mutex::new(vec![]),
        }
    }

    /// Engine producing a reproducible random bit per measurement.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Some(Mutex::new(StdRng::seed_from_u64(seed))),
            log: Mutex::new(vec![]),
        }
    }

    /// Programs executed so far, in order.
    pub async fn executed_programs(&self) -> Vec<LocalProgram> {
        self.log.lock().await.clone()
    }
}

#[async_trait]
impl QuantumEngine for StubEngine {
    async fn execute(&self, program: LocalProgram) -> RuntimeResult<ProgramOutput> {
        trace!(node = %program.node, ops = program.len(), "engine execute");
        let mut output = ProgramOutput::default();
        for op in &program.ops {
            if let EngineOp::Measure { key, .. } = op {
                let bit = match &self.rng {
                    Some(rng) => rng.lock().await.gen_range(0..=1u8),
                    None => 0,
                };
                output.insert(key.clone(), bit);
            }
        }
        self.log.lock().await.push(program);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zeros_engine_outcomes() {
        let engine = StubEngine::zeros();
        let mut program = LocalProgram::new("node_0");
        program.apply(Gate::H, [0]);
        program.measure(0, "ma");
        let output = engine.execute(program).await.unwrap();
        assert_eq!(output.outcome("ma").unwrap(), 0);
        assert!(output.outcome("mb").is_err());
        assert_eq!(engine.executed_programs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_seeded_engine_is_reproducible() {
        let mut bits_by_run = vec![];
        for _ in 0..2 {
            let engine = StubEngine::seeded(42);
            let mut bits = vec![];
            for i in 0..8 {
                let mut program = LocalProgram::new("node_0");
                program.measure(0, format!("m{i}"));
                let output = engine.execute(program).await.unwrap();
                bits.push(output.outcome(&format!("m{i}")).unwrap());
            }
            bits_by_run.push(bits);
        }
        assert_eq!(bits_by_run[0], bits_by_run[1]);
    }
}
