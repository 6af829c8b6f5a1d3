//! The distributed-circuit container.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::gate::Gate;
use crate::register::QuantumRegister;
use crate::spec::{GateSpec, Scheme, MONOLITHIC_NODE, PLACEHOLDER_NODE};

/// Processing stage of a [`DqcCircuit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// All operands retagged to a single monolithic processor.
    Monolithic,
    /// Fresh from a front end; operands still reference registers.
    Unpartitioned,
    /// Operands retagged with a placeholder, awaiting automated partitioning.
    PreppedForPartitioning,
    /// Operands carry concrete node names.
    Partitioned,
}

/// A distributed quantum circuit.
///
/// Owns the registers, the native-gate set and the ordered gate sequence.
/// The sequence is append-only until [`DqcCircuit::lock`]; only the
/// partitioner and coordinator mutate the stage and node sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DqcCircuit {
    /// Quantum registers by name.
    qregs: FxHashMap<String, QuantumRegister>,
    /// Classical registers by name (sizes only).
    cregs: FxHashMap<String, u32>,
    /// Names of gates native to the target processors.
    native_gates: Vec<String>,
    /// The ordered gate sequence.
    ops: Vec<GateSpec>,
    /// Current processing stage.
    stage: Stage,
    /// Circuit-wide remote-gate scheme, once chosen.
    scheme: Option<Scheme>,
    /// Per-node qubit counts, populated by the partitioner.
    node_sizes: FxHashMap<String, u32>,
    /// Whether the gate sequence has been locked.
    locked: bool,
}

impl DqcCircuit {
    /// Create a new empty circuit.
    pub fn new() -> Self {
        Self {
            qregs: FxHashMap::default(),
            cregs: FxHashMap::default(),
            native_gates: vec![],
            ops: vec![],
            stage: Stage::Unpartitioned,
            scheme: None,
            node_sizes: FxHashMap::default(),
            locked: false,
        }
    }

    /// Declare a quantum register. Its starting index follows the registers
    /// already declared, so registers tile the monolithic address space in
    /// declaration order.
    pub fn add_qreg(&mut self, name: impl Into<String>, size: u32) -> IrResult<QuantumRegister> {
        let name = name.into();
        if self.qregs.contains_key(&name) {
            return Err(IrError::DuplicateRegister(name));
        }
        let qreg = QuantumRegister::new(size, self.total_qubits());
        self.qregs.insert(name, qreg);
        Ok(qreg)
    }

    /// Declare a classical register.
    pub fn add_creg(&mut self, name: impl Into<String>, size: u32) -> IrResult<()> {
        let name = name.into();
        if self.cregs.contains_key(&name) {
            return Err(IrError::DuplicateRegister(name));
        }
        self.cregs.insert(name, size);
        Ok(())
    }

    /// Declare a gate as native to the target processors.
    pub fn add_native_gate(&mut self, name: impl Into<String>) {
        self.native_gates.push(name.into());
    }

    /// Append a gate spec to the sequence.
    pub fn push(&mut self, spec: GateSpec) -> IrResult<()> {
        if self.locked {
            return Err(IrError::Locked);
        }
        self.ops.push(spec);
        Ok(())
    }

    /// The ordered gate sequence.
    pub fn ops(&self) -> &[GateSpec] {
        &self.ops
    }

    /// Insert a gate spec at the front of the sequence. Reserved to compiler
    /// preprocessing, which prepends initialization commands.
    pub fn prepend(&mut self, spec: GateSpec) -> IrResult<()> {
        if self.locked {
            return Err(IrError::Locked);
        }
        self.ops.insert(0, spec);
        Ok(())
    }

    /// Mutable access to the gate sequence for the partitioner's in-place
    /// rewrite. Rewriting is not appending, so this is allowed after lock
    /// only by unlocking first, and there is no API for that.
    pub fn ops_mut(&mut self) -> IrResult<&mut [GateSpec]> {
        if self.locked {
            return Err(IrError::Locked);
        }
        Ok(&mut self.ops)
    }

    /// Number of operations in the sequence.
    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    /// Total qubits across all quantum registers.
    pub fn total_qubits(&self) -> u32 {
        self.qregs.values().map(|r| r.size).sum()
    }

    /// Look up a quantum register by name.
    pub fn qreg(&self, name: &str) -> IrResult<&QuantumRegister> {
        self.qregs
            .get(name)
            .ok_or_else(|| IrError::UnknownRegister(name.to_string()))
    }

    /// Quantum registers by name.
    pub fn qregs(&self) -> &FxHashMap<String, QuantumRegister> {
        &self.qregs
    }

    /// Current processing stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Set the processing stage. Reserved to the partitioner/coordinator.
    pub fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// Circuit-wide scheme, once chosen.
    pub fn scheme(&self) -> Option<Scheme> {
        self.scheme
    }

    /// Per-node qubit counts, populated by the partitioner.
    pub fn node_sizes(&self) -> &FxHashMap<String, u32> {
        &self.node_sizes
    }

    /// Record the per-node qubit counts and mark the circuit partitioned.
    /// Reserved to the partitioner/coordinator.
    pub fn set_node_sizes(&mut self, node_sizes: FxHashMap<String, u32>) {
        self.node_sizes = node_sizes;
        self.stage = Stage::Partitioned;
    }

    /// Retag every operand with the monolithic processor name.
    pub fn retag_monolithic(&mut self) -> IrResult<()> {
        self.retag(|_| MONOLITHIC_NODE.to_string())?;
        self.stage = Stage::Monolithic;
        Ok(())
    }

    /// Retag every operand with the partitioning placeholder.
    pub fn retag_placeholder(&mut self) -> IrResult<()> {
        self.retag(|_| PLACEHOLDER_NODE.to_string())?;
        self.stage = Stage::PreppedForPartitioning;
        Ok(())
    }

    /// Retag operands through a caller-supplied register → node lookup.
    /// This is the manual partitioning path: each register is pinned to a
    /// node by the caller.
    pub fn retag_manual(&mut self, lookup: &FxHashMap<String, String>) -> IrResult<()> {
        if self.locked {
            return Err(IrError::Locked);
        }
        // Validate before mutating so a bad lookup leaves the circuit intact.
        for spec in &self.ops {
            for node in spec.nodes() {
                if !lookup.contains_key(node) {
                    return Err(IrError::UnknownRegister(node.to_string()));
                }
            }
        }
        self.retag(|name| lookup[name].clone())?;
        self.stage = Stage::Partitioned;
        Ok(())
    }

    fn retag(&mut self, mut f: impl FnMut(&str) -> String) -> IrResult<()> {
        if self.locked {
            return Err(IrError::Locked);
        }
        for spec in &mut self.ops {
            match spec {
                GateSpec::Init { node, .. }
                | GateSpec::Measure { node, .. }
                | GateSpec::Single { node, .. } => *node = f(node),
                GateSpec::Two { node_a, node_b, .. } => {
                    *node_a = f(node_a);
                    *node_b = f(node_b);
                }
            }
        }
        Ok(())
    }

    /// Choose the scheme used for every cross-node two-qubit gate. Local
    /// two-qubit gates keep `scheme: None`, preserving the presence
    /// invariant.
    pub fn apply_scheme(&mut self, scheme: Scheme) -> IrResult<()> {
        if self.locked {
            return Err(IrError::Locked);
        }
        self.scheme = Some(scheme);
        for spec in &mut self.ops {
            if let GateSpec::Two {
                node_a,
                node_b,
                scheme: slot,
                ..
            } = spec
            {
                if node_a != node_b {
                    *slot = Some(scheme);
                }
            }
        }
        Ok(())
    }

    /// Render the gate sequence immutable.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Whether the gate sequence has been locked.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    // =========================================================================
    // Pre-built circuits
    // =========================================================================

    /// Create a GHZ-preparation circuit on `n` qubits in a single register.
    pub fn ghz(n: u32) -> IrResult<Self> {
        let mut circuit = Self::new();
        circuit.add_qreg("q", n)?;
        if n == 0 {
            return Ok(circuit);
        }
        circuit.push(GateSpec::single(Gate::H, 0, "q"))?;
        for i in 0..n - 1 {
            circuit.push(GateSpec::Two {
                interaction: Gate::CX.into(),
                qubit_a: i,
                node_a: "q".into(),
                qubit_b: i + 1,
                node_b: "q".into(),
                scheme: None,
            })?;
        }
        Ok(circuit)
    }
}

impl Default for DqcCircuit {
    fn default() -> Self {
        Self::new()
    }
}
