//! Fleet coordination.
//!
//! The [`Coordinator`] instantiates one [`NodeRuntime`] per entry of a
//! [`CompiledProgram`], wires them to a shared classical network, link layer
//! and engine, and observes all-nodes completion before reporting the
//! circuit executed. It neither cancels nor watches for stalled siblings: a
//! node awaiting a correction that never arrives stays suspended, and a
//! fatal protocol error aborts only the node that hit it.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use dqc_ir::CompiledProgram;

use crate::config::RuntimeConfig;
use crate::engine::QuantumEngine;
use crate::error::{RuntimeError, RuntimeResult};
use crate::link::LinkLayer;
use crate::message::ClassicalRouter;
use crate::node::{NodeReport, NodeRuntime};

/// What a full execution did, per node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Per-node reports, sorted by node name.
    pub nodes: Vec<NodeReport>,
}

impl ExecutionReport {
    /// Number of nodes that ran.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Total local operations executed across the fleet.
    pub fn total_local_ops(&self) -> usize {
        self.nodes.iter().map(|n| n.local_ops_executed).sum()
    }

    /// Total entanglement requests issued across the fleet.
    pub fn total_entanglement_requests(&self) -> u32 {
        self.nodes.iter().map(|n| n.entanglement_requests).sum()
    }

    /// Report for one node, if it ran.
    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.node == name)
    }
}

/// Starts one runtime instance per node from a shared compiled schedule.
pub struct Coordinator {
    engine: Arc<dyn QuantumEngine>,
    link: Arc<dyn LinkLayer>,
    config: RuntimeConfig,
}

impl Coordinator {
    /// Create a coordinator over an engine and link layer, with the default
    /// runtime configuration.
    pub fn new(engine: Arc<dyn QuantumEngine>, link: Arc<dyn LinkLayer>) -> Self {
        Self {
            engine,
            link,
            config: RuntimeConfig::default(),
        }
    }

    /// Replace the runtime configuration.
    #[must_use]
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Execute a compiled program to completion across all nodes.
    #[instrument(skip(self, program), fields(nodes = program.num_nodes()))]
    pub async fn execute(&self, program: CompiledProgram) -> RuntimeResult<ExecutionReport> {
        let names: Vec<String> = program
            .node_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut endpoints = ClassicalRouter::build(&names);

        let mut handles = vec![];
        let mut schedules = program.schedules;
        for name in &names {
            let Some(schedule) = schedules.remove(name) else {
                continue;
            };
            let Some(endpoint) = endpoints.remove(name) else {
                return Err(RuntimeError::protocol(name, "node has no classical endpoint"));
            };
            debug!(node = %name, slices = schedule.num_slices(), "starting node runtime");
            let runtime = NodeRuntime::new(
                name.clone(),
                schedule,
                self.engine.clone(),
                self.link.clone(),
                endpoint,
                self.config.clone(),
            );
            handles.push((name.clone(), tokio::spawn(runtime.run())));
        }

        let mut reports = Vec::with_capacity(handles.len());
        let (names, futures): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        for (name, joined) in names.into_iter().zip(join_all(futures).await) {
            let report = joined.map_err(|e| RuntimeError::Join(name, e.to_string()))??;
            reports.push(report);
        }
        reports.sort_by(|a, b| a.node.cmp(&b.node));

        info!(
            nodes = reports.len(),
            ops = reports.iter().map(|r| r.local_ops_executed).sum::<usize>(),
            "circuit executed"
        );
        Ok(ExecutionReport { nodes: reports })
    }
}
