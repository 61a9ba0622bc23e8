//! WARDEN Multi-Agent Safety Harness — Demo CLI
//!
//! Runs the reference coding-team scenarios, or replays a saved trace through
//! the pattern-based monitors.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- interception
//!   cargo run -p demo -- monitoring --log-dir ./logs
//!   cargo run -p demo -- replay ./logs/session_.../trace_<id>.json

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use warden_contracts::error::WardenResult;
use warden_judge::{JudgeConfig, JudgeFactory};
use warden_monitor::{
    MessageTamperingMonitor, MonitorConfig, MonitorPipeline, PromptInjectionMonitor,
    MESSAGE_TAMPERING, PROMPT_INJECTION,
};
use warden_ref_chat::scenarios::{interception, monitoring};
use warden_trace::persist;

// ── CLI definition ────────────────────────────────────────────────────────────

/// WARDEN — safety testing and runtime monitoring for multi-agent systems.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "WARDEN multi-agent safety harness demo",
    long_about = "Runs WARDEN scenarios on a scripted coding team, showing message\n\
                  interception, structured tracing, and live risk monitoring."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every scenario in sequence.
    RunAll {
        /// Save traces into a new log session under this directory.
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Scenario 1: rewrite every message the coder sends.
    Interception,
    /// Scenario 2: tamper with messages while monitors watch the trace.
    Monitoring {
        /// Save the trace into a new log session under this directory.
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Re-run the pattern monitors over a saved trace file.
    Replay {
        /// Path to a `trace_<id>.json` file.
        trace: PathBuf,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll { log_dir } => run_all(log_dir),
        Command::Interception => interception::run_scenario(),
        Command::Monitoring { log_dir } => monitoring::run_scenario(log_dir.as_deref()),
        Command::Replay { trace } => replay(trace),
    };

    match result {
        Ok(()) => {
            println!("All selected commands completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

fn run_all(log_dir: Option<PathBuf>) -> WardenResult<()> {
    interception::run_scenario()?;
    monitoring::run_scenario(log_dir.as_deref())?;
    Ok(())
}

fn replay(path: PathBuf) -> WardenResult<()> {
    let trace = persist::load_trace(&path)?;
    info!(trace_id = %trace.trace_id, steps = trace.agent_steps.len(), "replaying trace");

    // No LLM backend offline: both monitors use the pattern judge.
    let factory = JudgeFactory::new(JudgeConfig::default());
    let config = MonitorConfig::default();
    let mut pipeline = MonitorPipeline::new()
        .with_monitor(Box::new(MessageTamperingMonitor::new(
            factory.create("pattern", MESSAGE_TAMPERING)?,
            config,
        )?))
        .with_monitor(Box::new(PromptInjectionMonitor::new(
            factory.create("pattern", PROMPT_INJECTION)?,
            config,
        )?));

    println!("=== Replay: {} ===", path.display());
    println!();
    println!("  Task:     {}", trace.task);
    println!("  Success:  {}", trace.success);
    println!("  Steps:    {}", trace.agent_steps.len());
    println!("  Messages: {}", trace.messages.len());
    println!();

    let alerts = pipeline.process_trace(&trace);
    if alerts.is_empty() {
        println!("  No alerts raised.");
    }
    for alert in &alerts {
        println!(
            "  [{:<8}] {:<18} {:<5} {}",
            alert.severity, alert.risk_type, alert.recommended_action, alert.message
        );
    }
    println!();
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("WARDEN — Multi-Agent Safety Harness");
    println!("Scripted Coding Team Demo");
    println!("===================================");
    println!();
    println!("Per message in transit:");
    println!("  [1] Interception rules rewrite matching messages (source -> logical target)");
    println!("  [2] Each rewrite is logged as an intercept step with both contents");
    println!("  [3] The delivered message is logged to the trace");
    println!("  [4] Monitors judge every new step; the LLM judge falls back to patterns");
    println!();
}
