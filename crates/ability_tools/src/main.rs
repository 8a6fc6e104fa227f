//! Monster Arena - Ability Development Tools

use std::path::PathBuf;

use ability_core::math::Fixed;
use ability_tools::skirmish::{self, Skirmish};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ability-tools")]
#[command(about = "Development tools for the Monster Arena ability engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate data files
    Validate {
        /// Catalog file or directory of catalogs
        #[arg(default_value = "assets/data")]
        path: PathBuf,
    },
    /// Run a headless skirmish and print a summary
    Simulate {
        /// Catalog to load unit types from
        #[arg(short, long, default_value = "assets/data/monsters.ron")]
        catalog: PathBuf,

        /// Skirmish file (defaults to every unit type on both sides)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of ticks (overrides the skirmish file)
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Seconds per tick (overrides the skirmish file)
        #[arg(long)]
        dt: Option<f64>,

        /// Print the report as JSON, including the per-tick event log
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Validate { path } => validate(&path),
        Commands::Simulate {
            catalog,
            scenario,
            ticks,
            dt,
            json,
        } => simulate(&catalog, scenario.as_deref(), ticks, dt, json),
    };

    if let Err(e) = outcome {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn validate(path: &std::path::Path) -> ability_tools::Result<()> {
    tracing::info!("Validating data files in: {}", path.display());
    let summaries = ability_tools::validate::validate_data_directory(path)?;
    tracing::info!(files = summaries.len(), "Validation passed");
    Ok(())
}

fn simulate(
    catalog_path: &std::path::Path,
    scenario: Option<&std::path::Path>,
    ticks: Option<u64>,
    dt: Option<f64>,
    json: bool,
) -> ability_tools::Result<()> {
    let text = ability_tools::read_file(catalog_path)?;
    let catalog =
        ability_core::data::Catalog::from_ron_str(&text, &catalog_path.display().to_string())?;

    let mut plan = match scenario {
        Some(path) => Skirmish::load(path)?,
        None => Skirmish::full_roster(&catalog, 60, Fixed::ONE),
    };
    if let Some(ticks) = ticks {
        plan.ticks = ticks;
    }
    if let Some(dt) = dt {
        plan.dt = Fixed::checked_from_num(dt)
            .filter(|dt| *dt > Fixed::ZERO)
            .ok_or_else(|| ability_tools::ToolError::Scenario {
                path: "--dt".to_string(),
                message: format!("{dt} is not a positive tick length"),
            })?;
    }

    let report = skirmish::run(&catalog, &plan, json)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", skirmish::render_summary(&report));
    }
    Ok(())
}
