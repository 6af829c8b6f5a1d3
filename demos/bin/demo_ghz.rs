//! Distributed GHZ Preparation Demo
//!
//! Compiles a GHZ-preparation circuit for a fleet of QPUs and executes the
//! per-node schedules over the simulated fabric.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use dqc_demos::{ghz_over_fleet, print_header, print_result, print_section, print_success};
use dqc_runtime::{
    Coordinator, RetryPolicy, RuntimeConfig, SimulatedLinkLayer, StubEngine,
};

#[derive(Parser, Debug)]
#[command(name = "demo-ghz")]
#[command(about = "Distribute and execute GHZ state preparation")]
struct Args {
    /// Number of qubits in the GHZ state
    #[arg(short = 'n', long, default_value = "8")]
    qubits: u32,

    /// Number of QPU nodes in the fleet
    #[arg(short = 'k', long, default_value = "4")]
    nodes: usize,

    /// Comm qubits reserved per node (teleport schemes need at least 2)
    #[arg(short, long, default_value = "2")]
    comm_qubits: u32,

    /// Remote-gate scheme: cat, tp_risky (1tp) or tp_safe (2tp)
    #[arg(short, long, default_value = "cat")]
    scheme: String,

    /// Entanglement latency in milliseconds
    #[arg(long, default_value = "0")]
    latency_ms: u64,

    /// Per-request entanglement failure probability
    #[arg(long, default_value = "0.0")]
    failure_probability: f64,

    /// Total attempts per entanglement request
    #[arg(long, default_value = "1")]
    attempts: u32,

    /// Show the compiled per-node schedules as JSON
    #[arg(long)]
    show_schedules: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    print_header("Distributed GHZ Preparation Demo");

    let scheme = match args.scheme.parse() {
        Ok(scheme) => scheme,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    print_section("Problem Setup");
    print_result("Qubits", args.qubits);
    print_result("Nodes", args.nodes);
    print_result("Comm qubits per node", args.comm_qubits);
    print_result("Scheme", &args.scheme);

    let (circuit, program) = match ghz_over_fleet(args.qubits, args.nodes, args.comm_qubits, scheme)
    {
        Ok(compiled) => compiled,
        Err(e) => {
            eprintln!("Compilation failed: {e}");
            std::process::exit(1);
        }
    };

    print_section("Compiled Schedules");
    for node in program.node_names() {
        if let Some(schedule) = program.schedule(node) {
            print_result(
                node,
                format!(
                    "{} slice(s), {} primitive(s)",
                    schedule.num_slices(),
                    schedule.num_primitives()
                ),
            );
        }
    }
    print_result("Node sizes", format!("{:?}", circuit.node_sizes()));
    if args.show_schedules {
        match serde_json::to_string_pretty(&program) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Could not render schedules: {e}"),
        }
    }

    print_section("Execution");
    let engine = Arc::new(StubEngine::zeros());
    let link = Arc::new(SimulatedLinkLayer::new(
        Duration::from_millis(args.latency_ms),
        args.failure_probability,
        0,
    ));
    let coordinator = Coordinator::new(engine, link).with_config(RuntimeConfig {
        comm_qubits_per_node: args.comm_qubits,
        retry: RetryPolicy::attempts(args.attempts),
    });

    match coordinator.execute(program).await {
        Ok(report) => {
            for node in &report.nodes {
                print_result(
                    &node.node,
                    format!(
                        "{} slice(s), {} local op(s), {} entanglement request(s), \
                         {} correction(s)",
                        node.slices_executed,
                        node.local_ops_executed,
                        node.entanglement_requests,
                        node.corrections_received
                    ),
                );
            }
            print_success(&format!(
                "circuit executed across {} node(s)",
                report.num_nodes()
            ));
        }
        Err(e) => {
            eprintln!("Execution failed: {e}");
            std::process::exit(1);
        }
    }
}
