use anyhow::{Context, Result};
use clap::Parser;
use diffusion_sim_core::config::SimConfig;
use diffusion_sim_core::scenario::{self, DemoOptions, DemoReport};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "diffusion-sim",
    version,
    about = "Run the three-substance chemotaxis demo"
)]
struct Cli {
    /// Number of scheduler steps to run.
    #[arg(long, default_value_t = 2000)]
    steps: u64,

    /// Overrides the seed from the config file.
    #[arg(long)]
    seed: Option<u64>,

    /// Cells created for each of the two cell types.
    #[arg(long, default_value_t = 100)]
    cells_per_type: usize,

    /// JSON file with `SimConfig` fields; missing keys use the defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the time step from the config file.
    #[arg(long)]
    time_step: Option<f64>,

    /// Keep diffusion and behaviors on the main thread.
    #[arg(long)]
    sequential: bool,

    /// Print the full run report as JSON instead of the gene summary.
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<SimConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            SimConfig::from_json_str(&json)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => SimConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(time_step) = cli.time_step {
        config.time_step = time_step;
    }
    if cli.sequential {
        config.parallel = false;
    }
    config.validate().context("invalid simulation config")?;
    Ok(config)
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let options = DemoOptions {
        cells_per_type: cli.cells_per_type,
        ..DemoOptions::default()
    };
    info!(
        seed = config.seed,
        steps = cli.steps,
        cells_per_type = options.cells_per_type,
        parallel = config.parallel,
        "building demo"
    );

    let mut scheduler =
        scenario::reference_demo(config, &options).context("failed to build the demo")?;
    let summary = scheduler
        .simulate(cli.steps)
        .context("simulation failed")?;
    let gene_concentrations = scenario::first_agent_genes(&scheduler);

    if cli.json {
        let report = DemoReport {
            simulated_steps: scheduler.step_index(),
            gene_concentrations,
            summary,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Simulated {} steps ({} agents, {} divisions)",
        summary.final_step, summary.agent_count, summary.counters.divisions
    );
    for (index, concentration) in gene_concentrations.iter().enumerate() {
        println!("Gene {index} concentration: {concentration}");
    }
    Ok(())
}
