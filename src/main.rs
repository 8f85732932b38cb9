use std::{env, fs::File, path::Path, process, time::Instant};

use anyhow::Context;
use env_logger::{Env, Target};
use log::info;

use online_tuner::{specs::TunerConfig, training::RunContext};

fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating log file {}", path.display()))?;

    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(file)))
        .try_init()
        .context("installing the logger")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <config.json>", args[0]);
        process::exit(1);
    }

    let config = TunerConfig::load(&args[1])
        .with_context(|| format!("loading configuration {}", args[1]))?;

    let context = RunContext::new(config.run_prefix());
    let log_path = context.log_file();
    init_logging(&log_path)?;

    println!("online tuning: experiment {}", config.experiment_name);
    println!("logging to {}", log_path.display());
    info!("configuration: {config:?}");

    let start = Instant::now();
    let report = online_tuner::tune(&config).await?;
    let elapsed = start.elapsed().as_secs_f64();

    println!(
        "selected epoch {} (objective {:.2}), final weights in {}",
        report.selected.epoch,
        report.selected.objective,
        context.final_weights().display()
    );
    println!("elapsed time: {elapsed:.3}s");
    info!("elapsed time: {elapsed:.3}s");

    Ok(())
}
