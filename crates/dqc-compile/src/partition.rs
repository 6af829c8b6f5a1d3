//! Qubit-to-node allocation and circuit partitioning.
//!
//! Two allocation strategies are provided: [`first_come_first_served`], which
//! spreads a monolithic circuit as evenly as possible over an arbitrary node
//! roster, and [`bisect`], which splits a circuit in half over exactly two
//! nodes. Both reserve the low indices of every node for comm qubits. The
//! rewrite step ([`apply_allocation`]) replaces each operand's
//! (index, register-or-node) pair through the computed lookup and stamps the
//! chosen scheme on every gate whose rewritten node names differ.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use dqc_ir::{DqcCircuit, GateSpec, Scheme, Stage};

use crate::error::{CompileError, CompileResult};

/// One QPU in the allocation roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QpuSpec {
    /// Node name.
    pub name: String,
    /// Number of low memory positions reserved for comm qubits.
    pub comm_qubits: u32,
}

impl QpuSpec {
    /// Create a roster entry.
    pub fn new(name: impl Into<String>, comm_qubits: u32) -> Self {
        Self {
            name: name.into(),
            comm_qubits,
        }
    }
}

/// An old-index → (new-index, node) lookup produced by an allocator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QubitAllocation {
    /// Monolithic index → (node-local index, node name).
    lookup: FxHashMap<u32, (u32, String)>,
    /// Node name → total qubit count (comm slots included).
    node_sizes: FxHashMap<String, u32>,
    /// Roster order, kept for deterministic init emission.
    roster: Vec<String>,
}

impl QubitAllocation {
    /// Translate a monolithic index.
    pub fn translate(&self, index: u32) -> CompileResult<(u32, &str)> {
        self.lookup
            .get(&index)
            .map(|(new_index, node)| (*new_index, node.as_str()))
            .ok_or(CompileError::QubitOutOfRange { index })
    }

    /// Node name → total qubit count (comm slots included).
    pub fn node_sizes(&self) -> &FxHashMap<String, u32> {
        &self.node_sizes
    }

    /// Number of data qubits allocated to `node`.
    pub fn data_qubits(&self, node: &str) -> u32 {
        self.lookup.values().filter(|(_, n)| n == node).count() as u32
    }
}

/// Allocate the qubits of a monolithic circuit to nodes in roster order.
///
/// Requires the first gate spec to be an `Init` enumerating every qubit
/// index `0..N-1` exactly once in ascending order. The allocation is as even
/// as possible: every node receives `N / K` qubits and the first `N % K`
/// roster nodes receive one extra. Node-local indices are offset past each
/// node's reserved comm slots.
#[instrument(skip(circuit, roster), fields(nodes = roster.len()))]
pub fn first_come_first_served(
    circuit: &DqcCircuit,
    roster: &[QpuSpec],
) -> CompileResult<QubitAllocation> {
    if roster.is_empty() {
        return Err(CompileError::InsufficientNodes { needed: 1, got: 0 });
    }
    let total = circuit.total_qubits();
    check_leading_init(circuit.ops(), total)?;

    let n = total;
    let k = roster.len() as u32;
    let base = n / k;
    let extra = n % k;

    let mut allocation = QubitAllocation::default();
    let mut next_old_index = 0u32;
    for (position, qpu) in roster.iter().enumerate() {
        let data = base + u32::from((position as u32) < extra);
        for local in 0..data {
            allocation.lookup.insert(
                next_old_index,
                (qpu.comm_qubits + local, qpu.name.clone()),
            );
            next_old_index += 1;
        }
        allocation
            .node_sizes
            .insert(qpu.name.clone(), data + qpu.comm_qubits);
        allocation.roster.push(qpu.name.clone());
    }
    debug!(qubits = n, "allocated qubits first-come-first-served");
    Ok(allocation)
}

/// Check that the sequence opens with an `Init` enumerating `0..total`.
fn check_leading_init(ops: &[GateSpec], total: u32) -> CompileResult<()> {
    let Some(first) = ops.first() else {
        return Err(CompileError::MissingInit);
    };
    let GateSpec::Init { qubits, .. } = first else {
        return Err(CompileError::MissingInit);
    };
    if qubits.len() as u32 != total {
        return Err(CompileError::MalformedInit(format!(
            "expected {total} qubits, found {}",
            qubits.len()
        )));
    }
    for (expected, &found) in qubits.iter().enumerate() {
        if found != expected as u32 {
            return Err(CompileError::MalformedInit(format!(
                "expected index {expected} at position {expected}, found {found}"
            )));
        }
    }
    Ok(())
}

/// Rewrite a circuit's operands through an allocation.
///
/// Replaces the leading monolithic `Init` with one `Init` per node covering
/// that node's full range (comm slots included), rewrites every remaining
/// operand through the lookup and stamps `scheme` on each two-qubit gate
/// whose rewritten node names differ. Sets the node sizes and marks the
/// circuit partitioned.
pub fn apply_allocation(
    circuit: &mut DqcCircuit,
    allocation: &QubitAllocation,
    scheme: Scheme,
) -> CompileResult<()> {
    if circuit.ops().is_empty() {
        return Err(CompileError::MissingInit);
    }
    if allocation.roster.is_empty() {
        return Err(CompileError::InsufficientNodes { needed: 1, got: 0 });
    }
    {
        let ops = circuit.ops_mut().map_err(CompileError::Ir)?;

        // The leading Init is replaced below; rewrite everything after it.
        for spec in ops.iter_mut().skip(1) {
            match spec {
                GateSpec::Init { .. } => {}
                GateSpec::Measure { qubit, node } | GateSpec::Single { qubit, node, .. } => {
                    let (new_index, new_node) = allocation.translate(*qubit)?;
                    *qubit = new_index;
                    *node = new_node.to_string();
                }
                GateSpec::Two {
                    qubit_a,
                    node_a,
                    qubit_b,
                    node_b,
                    scheme: slot,
                    ..
                } => {
                    let (new_a, new_node_a) = allocation.translate(*qubit_a)?;
                    let (new_b, new_node_b) = allocation.translate(*qubit_b)?;
                    *qubit_a = new_a;
                    *node_a = new_node_a.to_string();
                    *qubit_b = new_b;
                    *node_b = new_node_b.to_string();
                    *slot = (node_a != node_b).then_some(scheme);
                }
            }
        }

        // The monolithic Init becomes the last node's Init; the others are
        // prepended below so the sequence opens with one Init per node in
        // roster order.
        let last = &allocation.roster[allocation.roster.len() - 1];
        ops[0] = GateSpec::Init {
            qubits: (0..allocation.node_sizes[last]).collect(),
            node: last.clone(),
        };
    }
    for name in allocation.roster[..allocation.roster.len() - 1].iter().rev() {
        let init = GateSpec::Init {
            qubits: (0..allocation.node_sizes[name]).collect(),
            node: name.clone(),
        };
        circuit.prepend(init).map_err(CompileError::Ir)?;
    }

    circuit.set_node_sizes(allocation.node_sizes.clone());
    debug!(nodes = allocation.roster.len(), "rewrote circuit operands");
    Ok(())
}

/// Split a two-register-space circuit in half over `node_0` and `node_1`.
///
/// Any odd remainder qubit goes to `node_0`. The low
/// `comm_qubits_per_node` positions of each node are reserved for comm
/// qubits. Operands are rewritten in place; node sizes and stage are set.
/// The scheme is not stamped here; callers follow up with
/// [`DqcCircuit::apply_scheme`].
#[instrument(skip(circuit))]
pub fn bisect(circuit: &mut DqcCircuit, comm_qubits_per_node: u32) -> CompileResult<()> {
    let total = circuit.total_qubits() + 2 * comm_qubits_per_node;
    let node_0_size = total.div_ceil(2);
    let node_1_size = total - node_0_size;
    let node_1_start = node_0_size;

    // Resolve register starts up front; ops_mut borrows the circuit.
    let mut starts: FxHashMap<String, u32> = FxHashMap::default();
    for spec in circuit.ops() {
        for name in spec.nodes() {
            if !starts.contains_key(name) {
                let qreg = circuit.qreg(name).map_err(CompileError::Ir)?;
                starts.insert(name.to_string(), qreg.starting_index);
            }
        }
    }

    let assign = |qubit: u32, register: &str| -> (u32, String) {
        let updated = qubit + starts[register] + comm_qubits_per_node;
        if updated >= node_1_start {
            (
                updated - node_1_start + comm_qubits_per_node,
                "node_1".to_string(),
            )
        } else {
            (updated, "node_0".to_string())
        }
    };

    for spec in circuit.ops_mut().map_err(CompileError::Ir)? {
        match spec {
            GateSpec::Init { .. } => {}
            GateSpec::Measure { qubit, node } | GateSpec::Single { qubit, node, .. } => {
                let (new_index, new_node) = assign(*qubit, node);
                *qubit = new_index;
                *node = new_node;
            }
            GateSpec::Two {
                qubit_a,
                node_a,
                qubit_b,
                node_b,
                ..
            } => {
                let (new_a, new_node_a) = assign(*qubit_a, node_a);
                let (new_b, new_node_b) = assign(*qubit_b, node_b);
                *qubit_a = new_a;
                *node_a = new_node_a;
                *qubit_b = new_b;
                *node_b = new_node_b;
            }
        }
    }

    let mut node_sizes = FxHashMap::default();
    node_sizes.insert("node_0".to_string(), node_0_size);
    node_sizes.insert("node_1".to_string(), node_1_size);
    circuit.set_node_sizes(node_sizes);
    Ok(())
}

/// Fold register-relative indices into the monolithic address space and
/// retag every operand with the monolithic processor, prepending an `Init`
/// over the full range.
pub fn flatten_monolithic(circuit: &mut DqcCircuit) -> CompileResult<()> {
    let mut starts: FxHashMap<String, u32> = FxHashMap::default();
    for spec in circuit.ops() {
        for name in spec.nodes() {
            if !starts.contains_key(name) {
                let qreg = circuit.qreg(name).map_err(CompileError::Ir)?;
                starts.insert(name.to_string(), qreg.starting_index);
            }
        }
    }

    for spec in circuit.ops_mut().map_err(CompileError::Ir)? {
        match spec {
            GateSpec::Init { .. } => {}
            GateSpec::Measure { qubit, node } | GateSpec::Single { qubit, node, .. } => {
                *qubit += starts[node.as_str()];
            }
            GateSpec::Two {
                qubit_a,
                node_a,
                qubit_b,
                node_b,
                ..
            } => {
                *qubit_a += starts[node_a.as_str()];
                *qubit_b += starts[node_b.as_str()];
            }
        }
    }
    circuit.retag_monolithic().map_err(CompileError::Ir)?;

    let total = circuit.total_qubits();
    circuit
        .prepend(GateSpec::Init {
            qubits: (0..total).collect(),
            node: dqc_ir::MONOLITHIC_NODE.to_string(),
        })
        .map_err(CompileError::Ir)?;
    Ok(())
}

/// Prepend one `Init` per node covering its full qubit range. Requires a
/// partitioned circuit; nodes are emitted in sorted order.
pub fn prepend_node_inits(circuit: &mut DqcCircuit) -> CompileResult<()> {
    if circuit.stage() != Stage::Partitioned || circuit.node_sizes().is_empty() {
        return Err(CompileError::NotPartitioned);
    }
    let mut names: Vec<(String, u32)> = circuit
        .node_sizes()
        .iter()
        .map(|(name, size)| (name.clone(), *size))
        .collect();
    names.sort_unstable();
    for (name, size) in names.into_iter().rev() {
        circuit
            .prepend(GateSpec::Init {
                qubits: (0..size).collect(),
                node: name,
            })
            .map_err(CompileError::Ir)?;
    }
    Ok(())
}
