//! Demo suite for the distributed quantum circuit stack.
//!
//! Builds circuits, distributes them over a simulated fleet and executes the
//! compiled schedules end-to-end. See `bin/demo_ghz.rs` for the entry point.

use console::style;

use dqc_compile::{
    apply_allocation, first_come_first_served, flatten_monolithic, CompileResult, GreedyCompiler,
    QpuSpec,
};
use dqc_ir::{CompiledProgram, DqcCircuit, Scheme};

/// Print a demo header.
pub fn print_header(title: &str) {
    println!();
    println!("{}", style("═".repeat(60)).cyan());
    println!("{}", style(format!("  {title}")).cyan().bold());
    println!("{}", style("═".repeat(60)).cyan());
    println!();
}

/// Print a demo section.
pub fn print_section(title: &str) {
    println!();
    println!("{}", style(format!("▶ {title}")).green().bold());
    println!("{}", style("─".repeat(40)).dim());
}

/// Print a labeled result line.
pub fn print_result(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", style(format!("{label}:")).dim(), value);
}

/// Print a success line.
pub fn print_success(message: &str) {
    println!("{}", style(format!("✓ {message}")).green());
}

/// Distribute a GHZ-preparation circuit over `nodes` QPUs and compile it.
pub fn ghz_over_fleet(
    qubits: u32,
    nodes: usize,
    comm_qubits: u32,
    scheme: Scheme,
) -> CompileResult<(DqcCircuit, CompiledProgram)> {
    let mut circuit = DqcCircuit::ghz(qubits)?;
    flatten_monolithic(&mut circuit)?;

    let roster: Vec<QpuSpec> = (0..nodes)
        .map(|i| QpuSpec::new(format!("node_{i}"), comm_qubits))
        .collect();
    let allocation = first_come_first_served(&circuit, &roster)?;
    apply_allocation(&mut circuit, &allocation, scheme)?;
    circuit.lock();

    let compiler = GreedyCompiler::with_roster(roster.iter().map(|q| q.name.clone()));
    let program = compiler.compile_circuit(&circuit)?;
    Ok((circuit, program))
}
