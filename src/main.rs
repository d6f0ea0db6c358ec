mod cli;
mod config;
mod http;
mod imap;
mod logging;
mod message;
mod relay;
mod sent;
mod smtp;

use anyhow::Result;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let config = Config::load();
    cli::run(&config).await
}
