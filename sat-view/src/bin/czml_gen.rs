//! Writes a synthetic debris-field CZML document for the viewer.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use sat_core::generator::{self, GeneratorConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate a debris-field CZML document")]
struct Args {
    /// Output file.
    #[arg(short, long, default_value = "czml_data/simple.czml")]
    output: PathBuf,

    /// Number of random debris objects.
    #[arg(long, default_value_t = 100)]
    debris: usize,

    /// RNG seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Propagated span in seconds.
    #[arg(long, default_value_t = 86_400.0)]
    span: f64,

    /// Sampling step in seconds.
    #[arg(long, default_value_t = 60.0)]
    step: f64,

    /// Factor sample times are divided by.
    #[arg(long, default_value_t = 10.0)]
    time_scale: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = GeneratorConfig {
        debris: args.debris,
        span: args.span,
        step: args.step,
        time_scale: args.time_scale,
        seed: args.seed,
    };
    let packets = generator::generate(&cfg, Utc::now())?;

    if let Some(dir) = args.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(&packets)?;
    std::fs::write(&args.output, json)
        .with_context(|| format!("cannot write {}", args.output.display()))?;

    log::info!(
        "CZML file saved to {} ({} packets)",
        args.output.display(),
        packets.len()
    );
    Ok(())
}
