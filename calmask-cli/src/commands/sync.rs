use anyhow::Result;
use calmask_core::{Operation, executor};
use owo_colors::OwoColorize;

use crate::graph::GraphClient;
use crate::pipeline;
use crate::{auth, config};

pub async fn run(dry_run: bool) -> Result<()> {
    let cfg = config::load_config()?;

    // Acquire credentials before fetching anything: an expired login
    // should fail fast, not after a full feed download.
    let access_token = if dry_run {
        None
    } else {
        Some(auth::get_access_token(&cfg.auth).await?)
    };

    let mut outcome = pipeline::compute_plan(&cfg).await?;
    println!(
        "{} candidates in the next {} days, {} skipped, {} tracked blocks",
        outcome.candidates,
        cfg.sync_days,
        outcome.skipped,
        outcome.store.len()
    );

    if outcome.operations.is_empty() {
        println!("Everything up to date.");
        return Ok(());
    }

    if dry_run {
        println!(
            "[dry run] would apply {} operations:",
            outcome.operations.len()
        );
        for operation in &outcome.operations {
            let (marker, identity) = match operation {
                Operation::Create(c) => ("create", &c.identity),
                Operation::Update(_, c) => ("update", &c.identity),
                Operation::Delete(m) => ("delete", &m.identity),
            };
            println!("  {marker} {identity}");
        }
        return Ok(());
    }

    let token = access_token.unwrap_or_default();
    let client = GraphClient::new(token, cfg.subject.clone());
    let summary = executor::apply(outcome.operations, &client, &mut outcome.store).await?;

    for failure in &summary.failures {
        let detail = if failure.error.is_transient() {
            "will retry next run"
        } else {
            "needs attention"
        };
        println!(
            "  {} {} {}: {} ({detail})",
            "✗".red(),
            failure.action,
            failure.identity,
            failure.error
        );
    }

    println!(
        "{} created, {} updated, {} deleted, {} skipped, {} failed",
        summary.created,
        summary.updated,
        summary.deleted,
        outcome.skipped,
        summary.failed()
    );

    Ok(())
}
