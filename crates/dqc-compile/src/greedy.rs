//! Greedy time-slice scheduling.
//!
//! Distributes a node-qualified gate sequence between nodes and splits it
//! into explicit time slices. Local gates are packed greedily into each
//! node's currently open slice; a cross-node two-qubit gate expands into the
//! communication primitives of its scheme. Only the safe-teleport scheme
//! forces a slice boundary: its second round must not be reordered before
//! the first has been acknowledged.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, instrument};

use dqc_ir::{
    CommKind, CompiledProgram, DqcCircuit, Gate, GateSpec, LocalOp, NodeSchedule, Operand,
    Primitive, RemoteInteraction, Scheme, TimeSlice, PLACEHOLDER_NODE,
};

use crate::error::{CompileError, CompileResult};

/// Accumulates one node's schedule during compilation; flushed into an
/// immutable [`NodeSchedule`] at the end.
#[derive(Debug, Default)]
struct ScheduleBuilder {
    slices: Vec<TimeSlice>,
}

impl ScheduleBuilder {
    fn new() -> Self {
        Self {
            slices: vec![vec![]],
        }
    }

    /// Append a primitive to the currently open slice.
    fn push(&mut self, primitive: Primitive) {
        if self.slices.is_empty() {
            self.slices.push(vec![]);
        }
        if let Some(open) = self.slices.last_mut() {
            open.push(primitive);
        }
    }

    /// Close the open slice and start a new one.
    fn open_new_slice(&mut self) {
        self.slices.push(vec![]);
    }

    /// Flush into an immutable schedule, dropping a trailing empty slice.
    fn finish(mut self) -> NodeSchedule {
        if self.slices.last().is_some_and(Vec::is_empty) {
            self.slices.pop();
        }
        NodeSchedule::from(self.slices)
    }
}

/// The greedy compiler.
///
/// With a roster, gates referencing nodes outside it fail eagerly; without
/// one, any concrete node name is accepted (a monolithic placeholder node is
/// handled like any other).
#[derive(Debug, Default)]
pub struct GreedyCompiler {
    roster: Option<FxHashSet<String>>,
}

impl GreedyCompiler {
    /// Create a compiler accepting any concrete node name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compiler that rejects nodes outside the given roster.
    pub fn with_roster(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            roster: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Compile a partitioned circuit.
    pub fn compile_circuit(&self, circuit: &DqcCircuit) -> CompileResult<CompiledProgram> {
        self.compile(circuit.ops())
    }

    /// Compile an ordered, node-qualified gate sequence into per-node
    /// schedules. Within a node, primitive order equals input program order.
    #[instrument(skip(self, specs), fields(ops = specs.len()))]
    pub fn compile(&self, specs: &[GateSpec]) -> CompileResult<CompiledProgram> {
        let mut builders: FxHashMap<String, ScheduleBuilder> = FxHashMap::default();

        for spec in specs {
            for node in spec.nodes() {
                self.check_node(node)?;
            }
            match spec {
                GateSpec::Init { qubits, node } => {
                    builder(&mut builders, node)
                        .push(Primitive::Local(LocalOp::init(qubits.iter().copied())));
                }
                GateSpec::Measure { qubit, node } => {
                    builder(&mut builders, node)
                        .push(Primitive::Local(LocalOp::measure(*qubit)));
                }
                GateSpec::Single { gate, qubit, node } => {
                    builder(&mut builders, node)
                        .push(Primitive::Local(LocalOp::single(gate.clone(), *qubit)));
                }
                GateSpec::Two {
                    interaction,
                    qubit_a,
                    node_a,
                    qubit_b,
                    node_b,
                    scheme,
                } => {
                    if node_a == node_b {
                        if scheme.is_some() {
                            return Err(CompileError::SchemeInvariant {
                                node_a: node_a.clone(),
                                node_b: node_b.clone(),
                            });
                        }
                        let RemoteInteraction::Gate(gate) = interaction else {
                            return Err(CompileError::BlockOnLocalGate);
                        };
                        builder(&mut builders, node_a).push(Primitive::Local(LocalOp::two(
                            gate.clone(),
                            *qubit_a,
                            *qubit_b,
                        )));
                    } else {
                        let Some(scheme) = scheme else {
                            return Err(CompileError::SchemeInvariant {
                                node_a: node_a.clone(),
                                node_b: node_b.clone(),
                            });
                        };
                        expand_remote(
                            &mut builders,
                            interaction,
                            *qubit_a,
                            node_a,
                            *qubit_b,
                            node_b,
                            *scheme,
                        );
                    }
                }
            }
        }

        let program = CompiledProgram {
            schedules: builders
                .into_iter()
                .map(|(node, b)| (node, b.finish()))
                .collect(),
        };
        debug!(
            nodes = program.num_nodes(),
            primitives = program.num_primitives(),
            "compiled gate sequence"
        );
        Ok(program)
    }

    fn check_node(&self, node: &str) -> CompileResult<()> {
        if node == PLACEHOLDER_NODE {
            return Err(CompileError::PlaceholderNode(node.to_string()));
        }
        if let Some(roster) = &self.roster {
            if !roster.contains(node) {
                return Err(CompileError::UnknownNode(node.to_string()));
            }
        }
        Ok(())
    }
}

fn builder<'a>(
    builders: &'a mut FxHashMap<String, ScheduleBuilder>,
    node: &str,
) -> &'a mut ScheduleBuilder {
    builders
        .entry(node.to_string())
        .or_insert_with(ScheduleBuilder::new)
}

/// The local operations enacted at the target node of a remote expansion.
fn interaction_ops(interaction: &RemoteInteraction, qubit_b: u32) -> Vec<LocalOp> {
    match interaction {
        // The comm qubit made available by the correction step acts as the
        // first operand.
        RemoteInteraction::Gate(gate) => vec![LocalOp::gate(
            gate.clone(),
            [Operand::Comm, Operand::Pos(qubit_b)],
        )],
        RemoteInteraction::Block(ops) => ops.clone(),
    }
}

/// Expand a cross-node two-qubit gate into its scheme's primitives, appended
/// to each side's currently open slice.
fn expand_remote(
    builders: &mut FxHashMap<String, ScheduleBuilder>,
    interaction: &RemoteInteraction,
    qubit_a: u32,
    node_a: &str,
    qubit_b: u32,
    node_b: &str,
    scheme: Scheme,
) {
    let kind: CommKind = scheme.comm_kind();
    match scheme {
        Scheme::Cat => {
            let control = builder(builders, node_a);
            control.push(Primitive::RequestEntangle {
                qubit: qubit_a,
                partner: node_b.to_string(),
                kind,
            });
            control.push(Primitive::DisentangleEnd {
                qubit: qubit_a,
                partner: node_b.to_string(),
                kind,
            });

            let target = builder(builders, node_b);
            target.push(Primitive::Correct {
                partner: node_a.to_string(),
                kind,
            });
            for op in interaction_ops(interaction, qubit_b) {
                target.push(Primitive::Local(op));
            }
            target.push(Primitive::DisentangleStart {
                qubit: qubit_b,
                partner: node_a.to_string(),
                kind,
            });
        }
        Scheme::TpRisky | Scheme::TpSafe => {
            let control = builder(builders, node_a);
            control.push(Primitive::BellMeasure {
                qubit: Operand::Pos(qubit_a),
                partner: node_b.to_string(),
                kind,
            });

            let target = builder(builders, node_b);
            target.push(Primitive::Correct {
                partner: node_a.to_string(),
                kind,
            });
            for op in interaction_ops(interaction, qubit_b) {
                target.push(Primitive::Local(op));
            }

            if scheme == Scheme::TpSafe {
                // Second round: teleport the operand back so the control holds
                // the result before any later gate on the same qubit.
                let target = builder(builders, node_b);
                target.open_new_slice();
                target.push(Primitive::BellMeasure {
                    qubit: Operand::Comm,
                    partner: node_a.to_string(),
                    kind,
                });

                let control = builder(builders, node_a);
                control.open_new_slice();
                control.push(Primitive::CorrectTeleportOnly {
                    partner: node_b.to_string(),
                    kind,
                });
                control.push(Primitive::Local(LocalOp::gate(
                    Gate::Swap,
                    [Operand::Comm, Operand::Pos(qubit_a)],
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dqc_ir::InstrKind;

    fn compile(specs: &[GateSpec]) -> CompiledProgram {
        GreedyCompiler::new().compile(specs).unwrap()
    }

    #[test]
    fn test_can_add_single_qubit_gates() {
        let program = compile(&[
            GateSpec::single(Gate::X, 3, "node_0"),
            GateSpec::single(Gate::Y, 2, "node_0"),
        ]);
        let expected = NodeSchedule::from(vec![vec![
            Primitive::Local(LocalOp::single(Gate::X, 3)),
            Primitive::Local(LocalOp::single(Gate::Y, 2)),
        ]]);
        assert_eq!(program.num_nodes(), 1);
        assert_eq!(program.schedule("node_0"), Some(&expected));
    }

    #[test]
    fn test_can_add_local_two_qubit_gates() {
        let program = compile(&[
            GateSpec::two_local(Gate::CX, 2, 3, "node_0"),
            GateSpec::two_local(Gate::CX, 1, 2, "node_1"),
        ]);
        assert_eq!(
            program.schedule("node_0"),
            Some(&NodeSchedule::from(vec![vec![Primitive::Local(
                LocalOp::two(Gate::CX, 2, 3)
            )]]))
        );
        assert_eq!(
            program.schedule("node_1"),
            Some(&NodeSchedule::from(vec![vec![Primitive::Local(
                LocalOp::two(Gate::CX, 1, 2)
            )]]))
        );
    }

    #[test]
    fn test_can_add_cat_cx() {
        let program = compile(&[GateSpec::two_remote(
            Gate::CX,
            2,
            "node_0",
            4,
            "node_1",
            Scheme::Cat,
        )]);
        let control = NodeSchedule::from(vec![vec![
            Primitive::RequestEntangle {
                qubit: 2,
                partner: "node_1".into(),
                kind: CommKind::Cat,
            },
            Primitive::DisentangleEnd {
                qubit: 2,
                partner: "node_1".into(),
                kind: CommKind::Cat,
            },
        ]]);
        let target = NodeSchedule::from(vec![vec![
            Primitive::Correct {
                partner: "node_0".into(),
                kind: CommKind::Cat,
            },
            Primitive::Local(LocalOp::gate(
                Gate::CX,
                [Operand::Comm, Operand::Pos(4)],
            )),
            Primitive::DisentangleStart {
                qubit: 4,
                partner: "node_0".into(),
                kind: CommKind::Cat,
            },
        ]]);
        assert_eq!(program.schedule("node_0"), Some(&control));
        assert_eq!(program.schedule("node_1"), Some(&target));
    }

    #[test]
    fn test_can_add_block_cat() {
        let block = vec![
            LocalOp::gate(Gate::CX, [Operand::Comm, Operand::Pos(4)]),
            LocalOp::single(Gate::X, 3),
            LocalOp::gate(Gate::CX, [Operand::Comm, Operand::Pos(2)]),
        ];
        let program = compile(&[GateSpec::two_remote(
            RemoteInteraction::Block(block.clone()),
            2,
            "node_0",
            4,
            "node_1",
            Scheme::Cat,
        )]);
        let target = program.schedule("node_1").unwrap();
        assert_eq!(target.num_slices(), 1);
        // Correct, then the three block ops verbatim, then disentangle_start.
        assert_eq!(target.slices[0].len(), 5);
        for (i, op) in block.iter().enumerate() {
            assert_eq!(target.slices[0][i + 1], Primitive::Local(op.clone()));
        }
    }

    #[test]
    fn test_can_add_tp_risky_cx() {
        let program = compile(&[GateSpec::two_remote(
            Gate::CX,
            2,
            "node_0",
            4,
            "node_1",
            Scheme::TpRisky,
        )]);
        assert_eq!(
            program.schedule("node_0"),
            Some(&NodeSchedule::from(vec![vec![Primitive::BellMeasure {
                qubit: Operand::Pos(2),
                partner: "node_1".into(),
                kind: CommKind::Tp,
            }]]))
        );
        assert_eq!(
            program.schedule("node_1"),
            Some(&NodeSchedule::from(vec![vec![
                Primitive::Correct {
                    partner: "node_0".into(),
                    kind: CommKind::Tp,
                },
                Primitive::Local(LocalOp::gate(
                    Gate::CX,
                    [Operand::Comm, Operand::Pos(4)],
                )),
            ]]))
        );
    }

    #[test]
    fn test_can_add_tp_safe_cx() {
        let program = compile(&[GateSpec::two_remote(
            Gate::CX,
            2,
            "node_0",
            4,
            "node_1",
            Scheme::TpSafe,
        )]);
        let control = NodeSchedule::from(vec![
            vec![Primitive::BellMeasure {
                qubit: Operand::Pos(2),
                partner: "node_1".into(),
                kind: CommKind::Tp,
            }],
            vec![
                Primitive::CorrectTeleportOnly {
                    partner: "node_1".into(),
                    kind: CommKind::Tp,
                },
                Primitive::Local(LocalOp::gate(
                    Gate::Swap,
                    [Operand::Comm, Operand::Pos(2)],
                )),
            ],
        ]);
        let target = NodeSchedule::from(vec![
            vec![
                Primitive::Correct {
                    partner: "node_0".into(),
                    kind: CommKind::Tp,
                },
                Primitive::Local(LocalOp::gate(
                    Gate::CX,
                    [Operand::Comm, Operand::Pos(4)],
                )),
            ],
            vec![Primitive::BellMeasure {
                qubit: Operand::Comm,
                partner: "node_0".into(),
                kind: CommKind::Tp,
            }],
        ]);
        assert_eq!(program.schedule("node_0"), Some(&control));
        assert_eq!(program.schedule("node_1"), Some(&target));
    }

    #[test]
    fn test_cat_does_not_force_slice_boundary() {
        let program = compile(&[
            GateSpec::two_remote(Gate::CX, 2, "node_0", 4, "node_1", Scheme::Cat),
            GateSpec::single(Gate::H, 1, "node_0"),
            GateSpec::single(Gate::Z, 4, "node_1"),
        ]);
        // Later local gates land in the same open slice on both sides.
        assert_eq!(program.schedule("node_0").unwrap().num_slices(), 1);
        assert_eq!(program.schedule("node_1").unwrap().num_slices(), 1);
    }

    #[test]
    fn test_tp_safe_later_gates_land_in_second_slice() {
        let program = compile(&[
            GateSpec::two_remote(Gate::CX, 2, "node_0", 4, "node_1", Scheme::TpSafe),
            GateSpec::single(Gate::H, 2, "node_0"),
        ]);
        let control = program.schedule("node_0").unwrap();
        assert_eq!(control.num_slices(), 2);
        assert_eq!(
            control.slices[1].last(),
            Some(&Primitive::Local(LocalOp::single(Gate::H, 2)))
        );
    }

    #[test]
    fn test_init_and_measure_become_local_ops() {
        let program = compile(&[
            GateSpec::Init {
                qubits: vec![0, 1, 2],
                node: "node_0".into(),
            },
            GateSpec::Measure {
                qubit: 1,
                node: "node_0".into(),
            },
        ]);
        let schedule = program.schedule("node_0").unwrap();
        assert!(matches!(
            &schedule.slices[0][0],
            Primitive::Local(LocalOp { instr: InstrKind::Init, operands }) if operands.len() == 3
        ));
        assert!(matches!(
            &schedule.slices[0][1],
            Primitive::Local(LocalOp { instr: InstrKind::Measure, .. })
        ));
    }

    #[test]
    fn test_determinism() {
        let specs = vec![
            GateSpec::single(Gate::H, 0, "node_0"),
            GateSpec::two_remote(Gate::CX, 0, "node_0", 1, "node_1", Scheme::Cat),
            GateSpec::two_remote(Gate::CZ, 1, "node_1", 0, "node_2", Scheme::TpSafe),
            GateSpec::single(Gate::X, 0, "node_2"),
        ];
        let first = compile(&specs);
        let second = compile(&specs);
        assert_eq!(first, second);
    }

    #[test]
    fn test_placeholder_node_rejected() {
        let result = GreedyCompiler::new().compile(&[GateSpec::single(
            Gate::H,
            0,
            PLACEHOLDER_NODE,
        )]);
        assert!(matches!(result, Err(CompileError::PlaceholderNode(_))));
    }

    #[test]
    fn test_unknown_node_rejected_with_roster() {
        let compiler = GreedyCompiler::with_roster(["node_0", "node_1"]);
        let result = compiler.compile(&[GateSpec::single(Gate::H, 0, "node_9")]);
        assert!(matches!(result, Err(CompileError::UnknownNode(_))));
    }

    #[test]
    fn test_scheme_invariant_enforced() {
        let missing = GateSpec::Two {
            interaction: RemoteInteraction::Gate(Gate::CX),
            qubit_a: 0,
            node_a: "node_0".into(),
            qubit_b: 1,
            node_b: "node_1".into(),
            scheme: None,
        };
        assert!(matches!(
            GreedyCompiler::new().compile(&[missing]),
            Err(CompileError::SchemeInvariant { .. })
        ));

        let spurious = GateSpec::Two {
            interaction: RemoteInteraction::Gate(Gate::CX),
            qubit_a: 0,
            node_a: "node_0".into(),
            qubit_b: 1,
            node_b: "node_0".into(),
            scheme: Some(Scheme::Cat),
        };
        assert!(matches!(
            GreedyCompiler::new().compile(&[spurious]),
            Err(CompileError::SchemeInvariant { .. })
        ));
    }
}
