//! Compilation for distributed quantum circuits.
//!
//! Two stages, in dependency order:
//!
//! 1. **Partitioning** ([`partition`]): allocate the qubits of a monolithic
//!    circuit to nodes ([`first_come_first_served`] over an arbitrary roster,
//!    or [`bisect`] over exactly two nodes) and rewrite every operand through
//!    the resulting lookup, stamping the remote-gate scheme on each gate that
//!    ends up spanning two nodes.
//! 2. **Scheduling** ([`greedy`]): pack the node-qualified sequence into
//!    per-node time slices, expanding each cross-node two-qubit gate into the
//!    communication primitives of its scheme.
//!
//! All failures are configuration errors: detected eagerly and never
//! retried, so the caller resupplies a corrected circuit.
//!
//! # Example
//!
//! ```rust
//! use dqc_compile::{
//!     apply_allocation, first_come_first_served, GreedyCompiler, QpuSpec,
//! };
//! use dqc_ir::{DqcCircuit, Scheme};
//!
//! let mut circuit = DqcCircuit::ghz(4).unwrap();
//! dqc_compile::flatten_monolithic(&mut circuit).unwrap();
//!
//! let roster = vec![QpuSpec::new("node_0", 1), QpuSpec::new("node_1", 1)];
//! let allocation = first_come_first_served(&circuit, &roster).unwrap();
//! apply_allocation(&mut circuit, &allocation, Scheme::Cat).unwrap();
//!
//! let program = GreedyCompiler::new().compile_circuit(&circuit).unwrap();
//! assert_eq!(program.num_nodes(), 2);
//! ```

pub mod error;
pub mod greedy;
pub mod partition;

pub use error::{CompileError, CompileResult};
pub use greedy::GreedyCompiler;
pub use partition::{
    apply_allocation, bisect, first_come_first_served, flatten_monolithic, prepend_node_inits,
    QpuSpec, QubitAllocation,
};
