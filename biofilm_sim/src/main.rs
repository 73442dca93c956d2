//! Biofilm Simulator CLI
//!
//! Run a single colony simulation or sweep strip geometries for half-lives.

use biofilm_core::RelationshipMode;
use biofilm_sim::{RunError, SimConfig, SimExport, SimFrame, SimWorld, StripSweep, SweepRunner};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Biofilm colony simulator
#[derive(Parser, Debug)]
#[command(name = "biofilm-sim")]
#[command(about = "Simulate bacterial colonies on strip-coated surfaces", long_about = None)]
struct Args {
    /// JSON configuration file; flags below override its fields
    #[arg(short, long)]
    config: Option<String>,

    /// Master seed for determinism
    #[arg(short, long)]
    seed: Option<u64>,

    /// Step budget
    #[arg(long)]
    steps: Option<u64>,

    /// Number of colonies
    #[arg(long)]
    colonies: Option<usize>,

    /// Agents per colony
    #[arg(short, long)]
    agents: Option<usize>,

    /// Relationship mode (cooperative, competitive)
    #[arg(short, long)]
    mode: Option<RelationshipMode>,

    /// Number of coated strips
    #[arg(long)]
    coated_strips: Option<usize>,

    /// Width of each coated strip
    #[arg(long)]
    coated_width: Option<f64>,

    /// Sweep strip geometries instead of running once
    #[arg(long)]
    sweep: bool,

    /// Largest coated strip count in a sweep
    #[arg(long, default_value = "4")]
    max_strips: usize,

    /// Coated widths per strip count in a sweep
    #[arg(long, default_value = "5")]
    width_steps: usize,

    /// Trials per geometry in a sweep
    #[arg(long, default_value = "1")]
    trials: usize,

    /// Export every frame of a single run to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// JSON output on stdout
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Loads the base configuration and applies flag overrides.
    fn resolve_config(&self) -> Result<SimConfig, RunError> {
        let mut config = match &self.config {
            Some(path) => SimConfig::from_json_file(path)?,
            None => SimConfig::default(),
        };

        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(steps) = self.steps {
            config.steps = steps;
        }
        if let Some(colonies) = self.colonies {
            config.colonies = colonies;
        }
        if let Some(agents) = self.agents {
            config.agents_per_colony = agents;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(strips) = self.coated_strips {
            config.coated_strips = strips;
        }
        if let Some(width) = self.coated_width {
            config.coated_width = width;
        }

        config.validate()?;
        Ok(config)
    }
}

fn run_single(args: &Args, config: SimConfig) -> Result<(), RunError> {
    let mut world = SimWorld::new(config)?;

    let outcome = match &args.export {
        Some(path) => {
            let mut export = SimExport::new(&world);
            let outcome = world.run_with(|w, _| export.add_frame(SimFrame::capture(w)))?;
            export.finalize(outcome);
            export.write_to_file(path)?;
            info!("Exported {} frames to {}", export.frames.len(), path);
            outcome
        }
        None => world.run()?,
    };

    if args.json {
        let summary = serde_json::json!({
            "seed": world.config().seed,
            "mode": world.config().mode.name(),
            "steps": world.current_step(),
            "colonies": world.colonies().len(),
            "population": world.population(),
            "food_left": world.food().len(),
            "half_life": outcome.half_life(),
            "outcome": outcome,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!(
            "{} after {} steps: {} colonies, {} agents, {} food left",
            outcome,
            world.current_step(),
            world.colonies().len(),
            world.population(),
            world.food().len()
        );
    }

    Ok(())
}

fn run_sweep(args: &Args, config: SimConfig) -> Result<(), RunError> {
    let sweep = StripSweep::new(args.max_strips, args.width_steps, config.surface.height())?;
    let rows = SweepRunner::new(config).with_trials(args.trials).run(&sweep);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    info!("");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("{:>3} {:>8} {:>8}  half-lives", "N", "d", "d2");
    for row in &rows {
        let half_lives: Vec<String> = row
            .half_lives()
            .iter()
            .map(|h| h.map_or_else(|| "N/A".to_string(), |s| s.to_string()))
            .collect();
        info!(
            "{:>3} {:>8.3} {:>8.3}  {}",
            row.spec.coated_strips,
            row.spec.coated_width,
            row.spec.uncoated_width,
            half_lives.join(" ")
        );
    }

    Ok(())
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    if !args.json {
        info!("Biofilm Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let result = args.resolve_config().and_then(|config| {
        if args.sweep {
            run_sweep(&args, config)
        } else {
            run_single(&args, config)
        }
    });

    if let Err(e) = result {
        error!("✗ {}", e);
        std::process::exit(1);
    }
}
