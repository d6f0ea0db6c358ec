mod imap;
mod smtp;

use std::net::SocketAddr;

use clap::{ArgAction, Parser, Subcommand, builder::BoolishValueParser};
use derive_getters::Getters;

pub use imap::ImapConfig;
pub use smtp::SmtpConfig;

use crate::imap::ImapConnector;

/// Relays mail submitted over HTTP to an SMTP server and keeps Sent copies
/// over IMAP.
#[derive(Parser, Getters)]
#[command(version, about)]
pub struct Config {
    #[command(subcommand)]
    #[getter(skip)]
    command: Option<Command>,

    /// Address the HTTP server listens on
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    listen_addr: SocketAddr,

    /// Append a copy of every sent message to the Sent folder
    #[arg(
        long,
        env = "SAVE_SENT_COPY",
        default_value = "false",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set
    )]
    save_sent_copy: bool,

    #[command(flatten)]
    smtp: SmtpConfig,

    #[command(flatten)]
    imap: ImapConfig,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the HTTP relay
    #[default]
    Serve,
    /// Discover the Sent folder once and print it as JSON
    ResolveSent,
}

impl Config {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn command(&self) -> Command {
        self.command.unwrap_or_default()
    }

    /// Connection parameters for IMAP, if a host and credentials are known.
    pub fn imap_connector(&self) -> Option<ImapConnector> {
        let host = self.imap.host().as_ref()?;
        let (user, pass) = self.imap.credentials(&self.smtp)?;
        Some(ImapConnector::new(
            host.clone(),
            self.imap.port(),
            self.imap.secure(),
            user,
            pass,
            self.imap.timeout(),
        ))
    }
}
