//! Per-node execution runtime for compiled distributed quantum circuits.
//!
//! One [`NodeRuntime`] per QPU consumes its [`NodeSchedule`](dqc_ir::NodeSchedule)
//! as a single cooperative task: local operations batch into a pending
//! program flushed to the [`QuantumEngine`] collaborator, and communication
//! primitives suspend the task until the link layer delivers entanglement or
//! a partner's classical correction arrives. The [`Coordinator`] starts one
//! runtime per node of a [`CompiledProgram`](dqc_ir::CompiledProgram) and
//! observes all-nodes completion.
//!
//! # Concurrency model
//!
//! Node runtimes execute logically in parallel, interleaved by the tokio
//! scheduler; suspension yields the task, never an OS thread. No locking
//! guards schedules or qubits: each schedule has exactly one owning runtime
//! and the engine serializes access to a given physical qubit by
//! construction. The only cross-node ordering guarantees are the protocol's
//! own: a correction cannot complete before the matching classical message
//! was sent, and an entanglement request cannot resolve before both sides'
//! matching requests reached the link layer.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dqc_runtime::{Coordinator, SimulatedLinkLayer, StubEngine};
//!
//! # async fn run(program: dqc_ir::CompiledProgram) -> dqc_runtime::RuntimeResult<()> {
//! let coordinator = Coordinator::new(
//!     Arc::new(StubEngine::zeros()),
//!     Arc::new(SimulatedLinkLayer::perfect()),
//! );
//! let report = coordinator.execute(program).await?;
//! println!("{} nodes done", report.num_nodes());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod link;
pub mod message;
pub mod node;

pub use config::{RetryPolicy, RuntimeConfig};
pub use coordinator::{Coordinator, ExecutionReport};
pub use engine::{EngineOp, LocalProgram, ProgramOutput, QuantumEngine, StubEngine};
pub use error::{RuntimeError, RuntimeResult};
pub use link::{
    EntanglementKind, EntanglementOutcome, EntanglementRequest, EntanglementRole, LinkLayer,
    SimulatedLinkLayer, ENT_FAILED_LABEL, ENT_READY_LABEL, ENT_REQUEST_LABEL,
};
pub use message::{ClassicalEndpoint, ClassicalMessage, ClassicalRouter, CorrectionPayload};
pub use node::{NodeReport, NodeRuntime, NodeState};
