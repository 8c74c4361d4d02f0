use anyhow::Result;

use crate::{auth, config};

pub async fn run() -> Result<()> {
    let cfg = config::load_config()?;

    println!("Signing in to your work account...");
    auth::device_code_login(&cfg.auth).await?;

    println!("\nSigned in. Tokens cached at {}", config::tokens_path()?.display());
    println!("Run `calmask sync` to mirror your personal calendar.");

    Ok(())
}
