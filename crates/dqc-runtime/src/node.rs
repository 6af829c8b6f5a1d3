//! Per-node schedule execution.
//!
//! One [`NodeRuntime`] owns one [`NodeSchedule`] and runs as a single
//! cooperative task. Local operations accumulate into a pending program; on
//! reaching a communication primitive the pending program is flushed to the
//! engine and the primitive's protocol round runs. Every suspension point is
//! a named state with an explicit resume condition: awaiting the link layer
//! ([`NodeState::AwaitingEntanglement`]) or awaiting a partner's classical
//! correction ([`NodeState::AwaitingCorrection`]).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use dqc_ir::{CommKind, Gate, InstrKind, LocalOp, NodeSchedule, Operand, Primitive};

use crate::config::RuntimeConfig;
use crate::engine::{LocalProgram, ProgramOutput, QuantumEngine};
use crate::error::{RuntimeError, RuntimeResult};
use crate::link::{
    EntanglementKind, EntanglementOutcome, EntanglementRequest, EntanglementRole, LinkLayer,
};
use crate::message::{ClassicalEndpoint, CorrectionPayload};

/// Protocol state of a node runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    /// Created, not yet running.
    Idle,
    /// Consuming the current time slice.
    RunningSlice,
    /// Suspended on a link-layer ready/failed event.
    AwaitingEntanglement,
    /// Suspended on a partner's classical correction.
    AwaitingCorrection,
    /// Every slice has flushed.
    Done,
}

/// What one node did over a full run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    /// Node name.
    pub node: String,
    /// Time slices executed.
    pub slices_executed: usize,
    /// Local operations flushed to the engine.
    pub local_ops_executed: usize,
    /// Entanglement requests issued (retries included).
    pub entanglement_requests: u32,
    /// Classical corrections received and applied.
    pub corrections_received: u32,
    /// Classical messages sent to partners.
    pub messages_sent: u32,
    /// State at the end of the run.
    pub final_state: NodeState,
}

impl NodeReport {
    fn new(node: &str) -> Self {
        Self {
            node: node.to_string(),
            slices_executed: 0,
            local_ops_executed: 0,
            entanglement_requests: 0,
            corrections_received: 0,
            messages_sent: 0,
            final_state: NodeState::Idle,
        }
    }
}

/// Executes one node's compiled schedule against its collaborators.
pub struct NodeRuntime {
    name: String,
    schedule: NodeSchedule,
    engine: Arc<dyn QuantumEngine>,
    link: Arc<dyn LinkLayer>,
    endpoint: ClassicalEndpoint,
    config: RuntimeConfig,
    state: NodeState,
    /// Memory positions reserved for comm qubits.
    comm_positions: Vec<u32>,
    /// Free comm slots, lowest first.
    comm_free: Vec<u32>,
    /// Comm slot reserved by the last correction round; resolves `Comm`
    /// operands in subsequent local operations.
    active_comm: Option<u32>,
    pending: LocalProgram,
    next_measure_key: u32,
    report: NodeReport,
}

impl NodeRuntime {
    /// Create a runtime for one node's schedule.
    pub fn new(
        name: impl Into<String>,
        schedule: NodeSchedule,
        engine: Arc<dyn QuantumEngine>,
        link: Arc<dyn LinkLayer>,
        endpoint: ClassicalEndpoint,
        config: RuntimeConfig,
    ) -> Self {
        let name = name.into();
        let comm_positions: Vec<u32> = (0..config.comm_qubits_per_node).collect();
        Self {
            report: NodeReport::new(&name),
            pending: LocalProgram::new(&name),
            comm_free: comm_positions.clone(),
            comm_positions,
            name,
            schedule,
            engine,
            link,
            endpoint,
            config,
            state: NodeState::Idle,
            active_comm: None,
            next_measure_key: 0,
        }
    }

    /// Current protocol state.
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Run the schedule to completion.
    #[instrument(skip(self), fields(node = %self.name))]
    pub async fn run(mut self) -> RuntimeResult<NodeReport> {
        debug!(slices = self.schedule.num_slices(), "node runtime starting");
        self.state = NodeState::RunningSlice;
        let slices = std::mem::take(&mut self.schedule.slices);
        for slice in slices {
            for primitive in slice {
                self.step(primitive).await?;
            }
            self.report.slices_executed += 1;
        }
        self.flush().await?;
        self.state = NodeState::Done;
        self.report.final_state = NodeState::Done;
        debug!(
            ops = self.report.local_ops_executed,
            "node runtime done"
        );
        Ok(self.report)
    }

    async fn step(&mut self, primitive: Primitive) -> RuntimeResult<()> {
        match primitive {
            Primitive::Local(op) => self.stage_local(&op),
            Primitive::RequestEntangle { qubit, partner, .. } => {
                self.flush().await?;
                self.cat_entangle(qubit, &partner).await
            }
            Primitive::Correct { partner, kind } => {
                self.flush().await?;
                self.correct(&partner, kind, true).await
            }
            Primitive::CorrectTeleportOnly { partner, kind } => {
                self.flush().await?;
                self.correct(&partner, kind, false).await
            }
            Primitive::DisentangleStart { partner, .. } => {
                self.flush().await?;
                self.disentangle_start(&partner).await
            }
            Primitive::DisentangleEnd { qubit, partner, .. } => {
                self.flush().await?;
                self.disentangle_end(qubit, &partner).await
            }
            Primitive::BellMeasure { qubit, partner, .. } => {
                self.flush().await?;
                self.bell_measure(qubit, &partner).await
            }
        }
    }

    /// Resolve an operand to a concrete memory position.
    fn resolve(&self, operand: Operand) -> RuntimeResult<u32> {
        match operand {
            Operand::Pos(p) => Ok(p),
            Operand::Comm => self.active_comm.ok_or_else(|| {
                RuntimeError::protocol(
                    &self.name,
                    "comm placeholder used before any correction reserved a comm qubit",
                )
            }),
        }
    }

    /// Stage a local operation into the pending program.
    fn stage_local(&mut self, op: &LocalOp) -> RuntimeResult<()> {
        let mut positions = Vec::with_capacity(op.operands.len());
        for operand in &op.operands {
            positions.push(self.resolve(*operand)?);
        }
        match &op.instr {
            InstrKind::Gate(gate) => self.pending.apply(gate.clone(), positions),
            InstrKind::Init => self.pending.init(positions),
            InstrKind::Measure => {
                for position in positions {
                    let key = format!("m_local{}", self.next_measure_key);
                    self.next_measure_key += 1;
                    self.pending.measure(position, key);
                }
            }
        }
        // The teleport-only swap moves the comm-held operand back into its
        // data slot; the comm placeholder is spent after it.
        if op.uses_comm_operand() && matches!(&op.instr, InstrKind::Gate(Gate::Swap)) {
            self.active_comm = None;
        }
        Ok(())
    }

    /// Flush the pending program to the engine.
    async fn flush(&mut self) -> RuntimeResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let program = std::mem::replace(&mut self.pending, LocalProgram::new(&self.name));
        self.report.local_ops_executed += program.len();
        self.engine.execute(program).await?;
        Ok(())
    }

    /// Execute a protocol-internal program immediately.
    async fn run_now(&mut self, program: LocalProgram) -> RuntimeResult<ProgramOutput> {
        self.report.local_ops_executed += program.len();
        self.engine.execute(program).await
    }

    /// Lowest free comm slot, without claiming it.
    fn peek_free_comm(&self) -> RuntimeResult<u32> {
        self.comm_free.first().copied().ok_or_else(|| {
            RuntimeError::protocol(
                &self.name,
                "no comm qubits free: too many remote gates in this time slice",
            )
        })
    }

    /// Return a slot to the free list, keeping it ordered.
    fn release_comm(&mut self, slot: u32) {
        if !self.comm_free.contains(&slot) {
            self.comm_free.push(slot);
            self.comm_free.sort_unstable();
        }
    }

    /// Issue an entanglement request and suspend until it resolves,
    /// retrying per the configured policy.
    async fn entangle_with_retry(
        &mut self,
        role: EntanglementRole,
        partner: &str,
        comm_slot: u32,
    ) -> RuntimeResult<()> {
        self.state = NodeState::AwaitingEntanglement;
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = EntanglementRequest {
                id: Uuid::new_v4(),
                role,
                requester: self.name.clone(),
                partner: partner.to_string(),
                comm_qubit_indices: vec![comm_slot],
                count: 1,
                kind: EntanglementKind::BellPair,
            };
            self.report.entanglement_requests += 1;
            match self.link.request_entanglement(request).await? {
                EntanglementOutcome::Ready => {
                    self.state = NodeState::RunningSlice;
                    return Ok(());
                }
                EntanglementOutcome::Failed { reason } => {
                    warn!(
                        node = %self.name,
                        partner,
                        attempt,
                        reason,
                        "entanglement attempt failed"
                    );
                    if attempt >= max_attempts {
                        return Err(RuntimeError::EntanglementFailure {
                            partner: partner.to_string(),
                            attempts: attempt,
                            reason,
                        });
                    }
                }
            }
        }
    }

    /// Control side of cat communication: secure a pair, fold the data qubit
    /// into it and send the measurement outcome.
    async fn cat_entangle(&mut self, qubit: u32, partner: &str) -> RuntimeResult<()> {
        let comm_slot = self.peek_free_comm()?;
        self.entangle_with_retry(EntanglementRole::Sender, partner, comm_slot)
            .await?;
        let mut program = LocalProgram::new(&self.name);
        program.apply(Gate::CX, [qubit, comm_slot]);
        program.measure(comm_slot, "ma");
        let output = self.run_now(program).await?;
        let ma = output.outcome("ma")?;
        self.endpoint.send(partner, CorrectionPayload::CatBit(ma))?;
        self.report.messages_sent += 1;
        // The comm slot is measured out immediately, so it stays free.
        Ok(())
    }

    /// Correction round shared by cat and teleport targets. `reserve` keeps
    /// the comm slot claimed so the corrected operand survives later rounds;
    /// the teleport-only variant leaves it free.
    async fn correct(&mut self, partner: &str, kind: CommKind, reserve: bool) -> RuntimeResult<()> {
        let comm_slot = self.peek_free_comm()?;
        self.entangle_with_retry(EntanglementRole::Receiver, partner, comm_slot)
            .await?;
        if reserve {
            self.comm_free.retain(|&slot| slot != comm_slot);
        }
        self.active_comm = Some(comm_slot);

        self.state = NodeState::AwaitingCorrection;
        let payload = self.endpoint.recv_from(partner).await?;
        let mut program = LocalProgram::new(&self.name);
        match (kind, payload) {
            (CommKind::Cat, CorrectionPayload::CatBit(m)) => {
                if m == 1 {
                    program.apply(Gate::X, [comm_slot]);
                }
            }
            (CommKind::Tp, CorrectionPayload::TpBits { m1, m2 }) => {
                if m1 == 1 {
                    program.apply(Gate::X, [comm_slot]);
                }
                if m2 == 1 {
                    program.apply(Gate::Z, [comm_slot]);
                }
            }
            (expected, payload) => {
                return Err(RuntimeError::protocol(
                    &self.name,
                    format!("expected a {expected} correction from '{partner}', got {payload:?}"),
                ));
            }
        }
        if !program.is_empty() {
            self.run_now(program).await?;
        }
        self.report.corrections_received += 1;
        self.state = NodeState::RunningSlice;
        Ok(())
    }

    /// Target side of cat disentangling: measure out the comm half and send
    /// the outcome. Non-blocking for the sender.
    async fn disentangle_start(&mut self, partner: &str) -> RuntimeResult<()> {
        let comm_slot = self.active_comm.take().ok_or_else(|| {
            RuntimeError::protocol(&self.name, "disentangle without a reserved comm qubit")
        })?;
        let mut program = LocalProgram::new(&self.name);
        program.apply(Gate::H, [comm_slot]);
        program.measure(comm_slot, "mb");
        let output = self.run_now(program).await?;
        let mb = output.outcome("mb")?;
        self.endpoint.send(partner, CorrectionPayload::CatBit(mb))?;
        self.report.messages_sent += 1;
        self.release_comm(comm_slot);
        Ok(())
    }

    /// Control side of cat disentangling: await the partner's outcome and
    /// apply the conditional phase fix.
    async fn disentangle_end(&mut self, qubit: u32, partner: &str) -> RuntimeResult<()> {
        self.state = NodeState::AwaitingCorrection;
        let payload = self.endpoint.recv_from(partner).await?;
        let CorrectionPayload::CatBit(mb) = payload else {
            return Err(RuntimeError::protocol(
                &self.name,
                format!("expected a cat correction from '{partner}', got {payload:?}"),
            ));
        };
        if mb == 1 {
            let mut program = LocalProgram::new(&self.name);
            program.apply(Gate::Z, [qubit]);
            self.run_now(program).await?;
        }
        self.report.corrections_received += 1;
        self.state = NodeState::RunningSlice;
        Ok(())
    }

    /// Bell-measure a qubit against a fresh pair half and send both outcome
    /// bits. Non-blocking for the sender.
    async fn bell_measure(&mut self, qubit: Operand, partner: &str) -> RuntimeResult<()> {
        let comm_slot = self.peek_free_comm()?;
        let tele_qubit = self.resolve(qubit)?;
        self.entangle_with_retry(EntanglementRole::Sender, partner, comm_slot)
            .await?;

        let mut program = LocalProgram::new(&self.name);
        program.apply(Gate::CX, [tele_qubit, comm_slot]);
        program.apply(Gate::H, [tele_qubit]);
        program.measure(comm_slot, "m1");
        program.measure(tele_qubit, "m2");
        let output = self.run_now(program).await?;
        let m1 = output.outcome("m1")?;
        let m2 = output.outcome("m2")?;

        // Reset the measured-out qubit so its slot is reusable.
        let mut reset = LocalProgram::new(&self.name);
        reset.init([tele_qubit]);
        self.run_now(reset).await?;

        self.endpoint
            .send(partner, CorrectionPayload::TpBits { m1, m2 })?;
        self.report.messages_sent += 1;

        // Teleporting a comm-held operand back frees its slot.
        if self.comm_positions.contains(&tele_qubit) {
            self.release_comm(tele_qubit);
            if self.active_comm == Some(tele_qubit) {
                self.active_comm = None;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::SimulatedLinkLayer;
    use crate::message::ClassicalRouter;
    use crate::StubEngine;
    use async_trait::async_trait;

    /// Link-layer double that resolves immediately without pairing.
    struct AlwaysReady;

    #[async_trait]
    impl LinkLayer for AlwaysReady {
        async fn request_entanglement(
            &self,
            _request: EntanglementRequest,
        ) -> RuntimeResult<EntanglementOutcome> {
            Ok(EntanglementOutcome::Ready)
        }
    }

    /// Link-layer double that fails a fixed number of times, then succeeds.
    struct FailsThenReady {
        failures: tokio::sync::Mutex<u32>,
    }

    #[async_trait]
    impl LinkLayer for FailsThenReady {
        async fn request_entanglement(
            &self,
            _request: EntanglementRequest,
        ) -> RuntimeResult<EntanglementOutcome> {
            let mut failures = self.failures.lock().await;
            if *failures > 0 {
                *failures -= 1;
                return Ok(EntanglementOutcome::Failed {
                    reason: "attempt failed".into(),
                });
            }
            Ok(EntanglementOutcome::Ready)
        }
    }

    fn two_endpoints() -> (ClassicalEndpoint, ClassicalEndpoint) {
        let names = vec!["node_0".to_string(), "node_1".to_string()];
        let mut endpoints = ClassicalRouter::build(&names);
        (
            endpoints.remove("node_0").unwrap(),
            endpoints.remove("node_1").unwrap(),
        )
    }

    fn runtime_with(
        schedule: NodeSchedule,
        link: Arc<dyn LinkLayer>,
        endpoint: ClassicalEndpoint,
        config: RuntimeConfig,
    ) -> NodeRuntime {
        NodeRuntime::new(
            "node_0",
            schedule,
            Arc::new(StubEngine::zeros()),
            link,
            endpoint,
            config,
        )
    }

    #[tokio::test]
    async fn test_local_only_schedule_runs_to_done() {
        let schedule = NodeSchedule::from(vec![vec![
            Primitive::Local(LocalOp::single(Gate::X, 3)),
            Primitive::Local(LocalOp::single(Gate::Y, 2)),
        ]]);
        let (a, _b) = two_endpoints();
        let runtime = runtime_with(
            schedule,
            Arc::new(AlwaysReady),
            a,
            RuntimeConfig::default(),
        );
        let report = runtime.run().await.unwrap();
        assert_eq!(report.final_state, NodeState::Done);
        assert_eq!(report.slices_executed, 1);
        assert_eq!(report.local_ops_executed, 2);
        assert_eq!(report.entanglement_requests, 0);
    }

    #[tokio::test]
    async fn test_correct_rejects_wrong_payload_shape() {
        let schedule = NodeSchedule::from(vec![vec![Primitive::Correct {
            partner: "node_1".into(),
            kind: CommKind::Cat,
        }]]);
        let (a, b) = two_endpoints();
        // Partner sends teleport bits where a cat bit is expected.
        b.send("node_0", CorrectionPayload::TpBits { m1: 0, m2: 1 })
            .unwrap();
        let runtime = runtime_with(
            schedule,
            Arc::new(AlwaysReady),
            a,
            RuntimeConfig::default(),
        );
        let err = runtime.run().await.unwrap_err();
        assert!(matches!(err, RuntimeError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_no_free_comm_qubits_is_fatal() {
        let schedule = NodeSchedule::from(vec![vec![Primitive::RequestEntangle {
            qubit: 2,
            partner: "node_1".into(),
            kind: CommKind::Cat,
        }]]);
        let (a, _b) = two_endpoints();
        let config = RuntimeConfig {
            comm_qubits_per_node: 0,
            ..RuntimeConfig::default()
        };
        let runtime = runtime_with(schedule, Arc::new(AlwaysReady), a, config);
        let err = runtime.run().await.unwrap_err();
        assert!(matches!(err, RuntimeError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_entanglement_failure_without_retries() {
        let schedule = NodeSchedule::from(vec![vec![Primitive::RequestEntangle {
            qubit: 2,
            partner: "node_1".into(),
            kind: CommKind::Cat,
        }]]);
        let (a, _b) = two_endpoints();
        let link = Arc::new(FailsThenReady {
            failures: tokio::sync::Mutex::new(1),
        });
        let runtime = runtime_with(schedule, link, a, RuntimeConfig::default());
        let err = runtime.run().await.unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::EntanglementFailure { attempts: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_entanglement_retry_succeeds() {
        let schedule = NodeSchedule::from(vec![vec![Primitive::RequestEntangle {
            qubit: 2,
            partner: "node_1".into(),
            kind: CommKind::Cat,
        }]]);
        let (a, mut b) = two_endpoints();
        let link = Arc::new(FailsThenReady {
            failures: tokio::sync::Mutex::new(2),
        });
        let config = RuntimeConfig {
            retry: crate::RetryPolicy::attempts(3),
            ..RuntimeConfig::default()
        };
        let runtime = runtime_with(schedule, link, a, config);
        let report = runtime.run().await.unwrap();
        assert_eq!(report.entanglement_requests, 3);
        assert_eq!(report.final_state, NodeState::Done);
        // The cat outcome bit still went out after the retries.
        let payload = b.recv_from("node_0").await.unwrap();
        assert!(matches!(payload, CorrectionPayload::CatBit(_)));
    }

    #[tokio::test]
    async fn test_comm_accounting_across_cat_round() {
        // Target side of a full cat round: correct reserves the slot, the
        // interaction uses it, disentangle_start returns it.
        let schedule = NodeSchedule::from(vec![vec![
            Primitive::Correct {
                partner: "node_1".into(),
                kind: CommKind::Cat,
            },
            Primitive::Local(LocalOp::gate(Gate::CX, [Operand::Comm, Operand::Pos(4)])),
            Primitive::DisentangleStart {
                qubit: 4,
                partner: "node_1".into(),
                kind: CommKind::Cat,
            },
        ]]);
        let (a, mut b) = two_endpoints();
        b.send("node_0", CorrectionPayload::CatBit(1)).unwrap();
        let runtime = runtime_with(
            schedule,
            Arc::new(AlwaysReady),
            a,
            RuntimeConfig::default(),
        );
        let report = runtime.run().await.unwrap();
        assert_eq!(report.final_state, NodeState::Done);
        assert_eq!(report.corrections_received, 1);
        assert_eq!(report.messages_sent, 1);
        let outcome = b.recv_from("node_0").await.unwrap();
        assert!(matches!(outcome, CorrectionPayload::CatBit(_)));
    }

    #[tokio::test]
    async fn test_simulated_link_pairs_runtime_sides() {
        // Two runtimes over a real simulated link: control does a cat
        // entangle, target corrects. Both must reach Done.
        let link: Arc<dyn LinkLayer> = Arc::new(SimulatedLinkLayer::perfect());
        let (a, b) = two_endpoints();
        let engine = Arc::new(StubEngine::zeros());

        let control = NodeRuntime::new(
            "node_0",
            NodeSchedule::from(vec![vec![Primitive::RequestEntangle {
                qubit: 2,
                partner: "node_1".into(),
                kind: CommKind::Cat,
            }]]),
            engine.clone(),
            link.clone(),
            a,
            RuntimeConfig::default(),
        );
        let target = NodeRuntime::new(
            "node_1",
            NodeSchedule::from(vec![vec![Primitive::Correct {
                partner: "node_0".into(),
                kind: CommKind::Cat,
            }]]),
            engine,
            link,
            b,
            RuntimeConfig::default(),
        );

        let (control, target) = tokio::join!(
            tokio::spawn(control.run()),
            tokio::spawn(target.run())
        );
        assert_eq!(control.unwrap().unwrap().final_state, NodeState::Done);
        assert_eq!(target.unwrap().unwrap().final_state, NodeState::Done);
    }
}
