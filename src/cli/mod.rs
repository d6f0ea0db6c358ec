mod resolve;
mod serve;

use anyhow::Result;

use crate::config::{Command, Config};

pub async fn run(config: &Config) -> Result<()> {
    match config.command() {
        Command::Serve => serve::serve(config).await,
        Command::ResolveSent => resolve::resolve_sent(config).await,
    }
}
