use clap::Parser;
use railcam::{
    context::GamePhase, FrameReport, RailFollowingCamera, RailLoader, RigConfig, Scenario,
    ScenarioRun,
};
use serde::Serialize;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to rig.toml configuration file
    #[arg(short, long, default_value = "./rig.toml")]
    config: String,

    /// Rail file (JSON or YAML)
    #[arg(short, long)]
    rail: String,

    /// Scripted race to play back (JSON or YAML)
    #[arg(short, long)]
    scenario: String,

    /// Number of frames to simulate
    #[arg(short, long, default_value_t = 600)]
    frames: u32,

    /// Seconds per frame
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// Follow a single actor by name instead of the whole field
    #[arg(short, long)]
    target: Option<String>,

    /// Override log level (trace|debug|info|warn|error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Serialize)]
struct FrameLine<'a> {
    frame: u32,
    elapsed: f32,
    phase: GamePhase,
    #[serde(flatten)]
    report: &'a FrameReport,
}

fn init_tracing(config: &RigConfig, override_level: Option<&str>) {
    let log_level = override_level.unwrap_or(&config.logging.level).to_string();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    // frames go to stdout, logs to stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = RigConfig::load_or_default(&args.config);
    init_tracing(&config, args.log_level.as_deref());
    info!("Starting railcam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", args.config);

    let rail = Arc::new(RailLoader::load_from_file(&args.rail)?);
    info!(
        "Rail '{}': {} nodes, {:.1} units{}",
        rail.name(),
        rail.total_nodes(),
        rail.total_length(),
        if rail.is_looped() { ", looped" } else { "" }
    );

    let scenario = Scenario::load_from_file(&args.scenario)?;
    info!(
        "Scenario: {} actor(s), hazard: {}",
        scenario.actors.len(),
        scenario.hazard.is_some()
    );
    let mut run = ScenarioRun::new(scenario, Arc::clone(&rail));

    let target = match &args.target {
        Some(name) => match run.actor_id(name) {
            Some(id) => Some(id),
            None => {
                warn!("No actor named '{}', following the whole field", name);
                None
            }
        },
        None => None,
    };

    let mut camera = RailFollowingCamera::from_config(&config, Some(rail), target);
    camera.on_round_start(run.snapshot(), run.start_point())?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for frame in 0..args.frames {
        let snapshot = run.step(args.dt);
        let phase = snapshot.phase;
        let report = camera.late_update(snapshot, args.dt);
        let line = FrameLine {
            frame,
            elapsed: run.elapsed(),
            phase,
            report: &report,
        };
        serde_json::to_writer(&mut out, &line)?;
        writeln!(out)?;
    }
    out.flush()?;

    info!("Simulated {} frame(s)", args.frames);
    Ok(())
}
