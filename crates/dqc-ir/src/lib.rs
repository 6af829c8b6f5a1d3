//! Distributed Quantum Circuit Intermediate Representation
//!
//! This crate provides the core data structures for representing distributed
//! quantum circuits and their compiled per-node schedules. It forms the
//! foundation of the compilation and execution stack.
//!
//! # Overview
//!
//! A circuit enters as an ordered [`GateSpec`] sequence in which each gate is
//! tagged with the register (later: node) owning its operands. The
//! partitioner rewrites operands in place, the compiler consumes the
//! sequence read-only and emits one [`NodeSchedule`] per node, and each
//! schedule is owned by exactly one runtime instance.
//!
//! # Core Components
//!
//! - **Gates**: [`Gate`] for the routed gate vocabulary
//! - **Registers**: [`QuantumRegister`] ranges in a monolithic address space
//! - **Specs**: [`GateSpec`] node-qualified operations, [`Scheme`] remote-gate
//!   protocols, [`Operand`] local operand positions
//! - **Circuit**: [`DqcCircuit`] container with processing [`Stage`] tracking
//! - **Schedules**: [`Primitive`], [`TimeSlice`], [`NodeSchedule`],
//!   [`CompiledProgram`]
//!
//! # Example: Building a GHZ circuit
//!
//! ```rust
//! use dqc_ir::{DqcCircuit, Stage};
//!
//! let mut circuit = DqcCircuit::ghz(4).unwrap();
//! assert_eq!(circuit.stage(), Stage::Unpartitioned);
//! assert_eq!(circuit.total_qubits(), 4);
//!
//! // Prepare for automated partitioning.
//! circuit.retag_placeholder().unwrap();
//! assert_eq!(circuit.stage(), Stage::PreppedForPartitioning);
//! ```

pub mod circuit;
pub mod error;
pub mod gate;
pub mod op;
pub mod register;
pub mod schedule;
pub mod spec;

pub use circuit::{DqcCircuit, Stage};
pub use error::{IrError, IrResult};
pub use gate::Gate;
pub use op::{InstrKind, LocalOp, Operand};
pub use register::QuantumRegister;
pub use schedule::{CompiledProgram, NodeSchedule, Primitive, TimeSlice};
pub use spec::{
    CommKind, GateSpec, RemoteInteraction, Scheme, MONOLITHIC_NODE, PLACEHOLDER_NODE,
};
