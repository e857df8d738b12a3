use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use puddlesim::{ScenarioConfig, VirtualTime};

/// Run a puddle scenario and report where every fog node ended up.
#[derive(Debug, Parser)]
#[command(name = "puddlesim", version, about)]
struct Args {
    /// TOML scenario file.
    scenario: PathBuf,

    /// Stop at this virtual time instead of the scenario's `end_time`.
    #[arg(long)]
    until: Option<u64>,

    /// Print the final state as JSON instead of a summary.
    #[arg(long)]
    json: bool,

    /// Log filter, used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&args.log))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let scenario = ScenarioConfig::load(&args.scenario)
        .with_context(|| format!("loading {}", args.scenario.display()))?;
    let (mut sim, mut rt) = scenario.build().context("building topology")?;

    let until = VirtualTime::new(args.until.unwrap_or(scenario.simulation.end_time));
    let processed = sim.run_until(until, &mut rt).context("simulation aborted")?;
    let now = sim.current_time();
    tracing::info!(events = processed, time = now.ticks(), "run finished");

    let snapshot = rt.snapshot(now);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("═══════════════════════════════════════════════════════");
    println!("  puddlesim: {}", args.scenario.display());
    println!("═══════════════════════════════════════════════════════");
    println!("  time:               {}", snapshot.time);
    println!("  events processed:   {}", processed);
    println!("  messages delivered: {}", snapshot.messages_delivered);
    println!("  active fog nodes:   {}", snapshot.active_fog_nodes);
    println!();
    for head in &snapshot.puddle_heads {
        let members: Vec<String> = head
            .members
            .iter()
            .filter_map(|m| snapshot.fog_nodes.iter().find(|n| n.id == *m))
            .map(|n| n.name.clone())
            .collect();
        println!(
            "  [L{}] {:<12} members: {}",
            head.level,
            head.name,
            if members.is_empty() { "-".to_string() } else { members.join(", ") }
        );
    }
    println!();
    for node in &snapshot.fog_nodes {
        println!(
            "  {:<12} ({:>8.2}, {:>8.2})  {:?}",
            node.name, node.position.x, node.position.y, node.state
        );
    }
    Ok(())
}
