use std::{env, time::Instant};

use anyhow::{Context, Result};
use quant_dqn::{AppConfig, CsvColumn, Environment, PriceSource};

fn main() -> Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => AppConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => AppConfig::default(),
    };

    let start = Instant::now();
    let prices = CsvColumn::new(&config.data.prices, &config.data.column)
        .close_prices()
        .with_context(|| format!("failed to read {}", config.data.prices.display()))?;
    let auxiliary = match &config.data.auxiliary {
        Some(path) => Some(
            CsvColumn::new(path, &config.data.column)
                .close_prices()
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => None,
    };
    log::info!(
        "took {}ms to load {} prices",
        start.elapsed().as_millis(),
        prices.len()
    );

    let mut env = Environment::new(config.training)?;
    let report = env.run_episode(&prices, auxiliary.as_deref())?;

    println!("\n--- Episode Finished ---");
    println!("Steps: {}", report.steps);
    println!("Training updates: {}", report.training_updates);
    println!("Mean squared TD error: {:.6}", report.mean_loss);
    println!("Buy and hold: {:.4}", report.benchmark_return);
    println!("Model: {:.4}", report.model_return);
    if !report.io_failures.is_empty() {
        println!("{} checkpoint/log writes failed", report.io_failures.len());
    }
    println!("----------------------\n");

    Ok(())
}
