use clap::{ArgAction, Args, builder::BoolishValueParser};
use derive_getters::Getters;

#[derive(Args, Getters)]
pub struct SmtpConfig {
    /// SMTP server to submit messages to
    #[arg(id = "smtp_host", long = "smtp-host", env = "SMTP_HOST")]
    host: String,

    #[arg(id = "smtp_port", long = "smtp-port", env = "SMTP_PORT", default_value_t = 587)]
    port: u16,

    /// Use implicit TLS instead of STARTTLS
    #[arg(
        id = "smtp_secure",
        long = "smtp-secure",
        env = "SMTP_SECURE",
        default_value = "false",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set
    )]
    secure: bool,

    #[arg(id = "smtp_user", long = "smtp-user", env = "SMTP_USER")]
    user: Option<String>,

    #[arg(
        id = "smtp_pass",
        long = "smtp-pass",
        env = "SMTP_PASS",
        hide_env_values = true
    )]
    #[getter(skip)]
    pass: Option<String>,

    /// Sender of every relayed message
    #[arg(id = "smtp_from", long = "smtp-from", env = "SMTP_FROM")]
    from: String,
}

impl SmtpConfig {
    pub fn credentials(&self) -> Option<(String, String)> {
        self.user.clone().zip(self.pass.clone())
    }

    pub(super) fn password(&self) -> Option<&str> {
        self.pass.as_deref()
    }
}
