use std::time::Duration;

use clap::{ArgAction, Args, builder::BoolishValueParser};
use derive_getters::Getters;

use crate::config::SmtpConfig;

pub const DEFAULT_MAILBOX: &str = "Sent";

#[derive(Args, Getters)]
pub struct ImapConfig {
    /// IMAP server holding the Sent folder
    #[arg(id = "imap_host", long = "imap-host", env = "IMAP_HOST")]
    host: Option<String>,

    #[arg(id = "imap_port", long = "imap-port", env = "IMAP_PORT", default_value_t = 993)]
    port: u16,

    /// Use implicit TLS; otherwise STARTTLS is used when offered
    #[arg(
        id = "imap_secure",
        long = "imap-secure",
        env = "IMAP_SECURE",
        default_value = "true",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set
    )]
    secure: bool,

    /// Defaults to the SMTP user
    #[arg(id = "imap_user", long = "imap-user", env = "IMAP_USER")]
    user: Option<String>,

    /// Defaults to the SMTP password
    #[arg(
        id = "imap_pass",
        long = "imap-pass",
        env = "IMAP_PASS",
        hide_env_values = true
    )]
    #[getter(skip)]
    pass: Option<String>,

    /// Mailbox for Sent copies; discovered at startup when not set
    #[arg(id = "imap_mailbox", long = "imap-mailbox", env = "IMAP_MAILBOX")]
    mailbox: Option<String>,

    #[arg(
        id = "imap_timeout_secs",
        long = "imap-timeout-secs",
        env = "IMAP_TIMEOUT_SECS",
        default_value_t = 30
    )]
    timeout_secs: u64,
}

impl ImapConfig {
    /// IMAP credentials, each falling back to its SMTP counterpart.
    pub fn credentials(&self, smtp: &SmtpConfig) -> Option<(String, String)> {
        let user = self.user.as_deref().or(smtp.user().as_deref())?;
        let pass = self.pass.as_deref().or(smtp.password())?;
        Some((user.to_string(), pass.to_string()))
    }

    pub fn mailbox_or_default(&self) -> &str {
        self.mailbox.as_deref().unwrap_or(DEFAULT_MAILBOX)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
