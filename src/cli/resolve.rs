use anyhow::{Context as _, Result};

use crate::{config::Config, sent::resolve_sent_folder};

/// Runs Sent folder discovery once and prints the outcome as JSON.
pub async fn resolve_sent(config: &Config) -> Result<()> {
    let connector = config
        .imap_connector()
        .context("IMAP host and credentials are required to resolve the Sent folder")?;
    let resolution = resolve_sent_folder(&connector).await?;
    println!("{}", serde_json::to_string_pretty(&resolution)?);
    Ok(())
}
