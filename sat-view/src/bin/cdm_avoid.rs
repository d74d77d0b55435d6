//! Searches for a collision-avoidance burn for the encounter in a CDM file.

use anyhow::{Context, Result};
use clap::Parser;
use sat_core::avoidance::{self, AvoidanceConfig};
use sat_core::cdm::Cdm;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Optimise an avoidance manoeuvre for a conjunction")]
struct Args {
    /// Conjunction Data Message (XML).
    cdm: PathBuf,

    /// JSON file with search settings; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// RNG seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of generations.
    #[arg(long)]
    generations: Option<usize>,

    /// Candidates per generation.
    #[arg(long)]
    population: Option<usize>,

    /// Target miss distance in metres.
    #[arg(long)]
    desired_miss: Option<f64>,

    /// Seconds between the end of the burn and TCA.
    #[arg(long)]
    lead_time: Option<f64>,

    /// Print the full solution as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            serde_json::from_str::<AvoidanceConfig>(&text)
                .with_context(|| format!("invalid settings in {}", path.display()))?
        }
        None => AvoidanceConfig::default(),
    };
    if let Some(v) = args.seed {
        cfg.seed = v;
    }
    if let Some(v) = args.generations {
        cfg.generations = v;
    }
    if let Some(v) = args.population {
        cfg.population = v;
    }
    if let Some(v) = args.desired_miss {
        cfg.desired_miss_distance = v;
    }
    if let Some(v) = args.lead_time {
        cfg.lead_time = v;
    }

    let cdm = Cdm::read(&args.cdm)?;
    log::info!(
        "{}: {} vs {} at {}, miss {:.1} m",
        cdm.header.message_id,
        cdm.object_name(0).unwrap_or("?"),
        cdm.object_name(1).unwrap_or("?"),
        cdm.relative.tca,
        cdm.relative.miss_distance
    );

    let solution = avoidance::optimise(&cdm, &cfg)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&solution)?);
    } else {
        let best = &solution.best;
        let m = &best.manoeuvre;
        println!(
            "thrust RTN [{:.6}, {:.6}, {:.6}] m/s^2 for {:.2} s",
            m.thrust.x, m.thrust.y, m.thrust.z, m.duration
        );
        println!(
            "delta-v {:.4} m/s, fuel {:.4} m/s, fitness {:.2}",
            m.delta_v().length(),
            best.fuel_cost,
            best.fitness
        );
        println!(
            "miss distance {:.1} m -> {:.1} m",
            solution.baseline.miss_distance, best.encounter.miss_distance
        );
    }
    Ok(())
}
