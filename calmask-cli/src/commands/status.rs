use anyhow::Result;
use calmask_core::Operation;
use owo_colors::OwoColorize;

use crate::config;
use crate::pipeline;

pub async fn run() -> Result<()> {
    let cfg = config::load_config()?;
    let outcome = pipeline::compute_plan(&cfg).await?;

    if outcome.operations.is_empty() {
        println!(
            "Everything up to date ({} busy blocks tracked).",
            outcome.store.len()
        );
        return Ok(());
    }

    println!("Pending changes:");
    for operation in &outcome.operations {
        match operation {
            Operation::Create(candidate) => {
                println!(
                    "  {} {} ({} → {})",
                    "+".green(),
                    candidate.identity,
                    candidate.start.format("%Y-%m-%d %H:%M"),
                    candidate.end.format("%H:%M")
                );
            }
            Operation::Update(mapping, candidate) => {
                println!(
                    "  {} {} ({} → {})",
                    "~".yellow(),
                    candidate.identity,
                    mapping.start.format("%Y-%m-%d %H:%M"),
                    candidate.start.format("%Y-%m-%d %H:%M")
                );
            }
            Operation::Delete(mapping) => {
                println!(
                    "  {} {} ({})",
                    "-".red(),
                    mapping.identity,
                    mapping.start.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }

    println!("\nRun `calmask sync` to apply.");

    Ok(())
}
