use std::{fmt::Display, time::Duration};

use lettre::{
    AsyncSmtpTransport, AsyncTransport as _, Message, Tokio1Executor,
    transport::smtp::{self, authentication::Credentials},
};
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

/// Outcome of a successful submission, by envelope recipient.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
}

/// Submits finished messages to a mail server.
pub trait MailTransport: Send + Sync + 'static {
    fn submit(&self, message: Message) -> impl Future<Output = Result<Delivery, SmtpFailure>> + Send;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmtpErrorKind {
    Authentication,
    Connectivity,
    Tls,
    RecipientRejected,
    Unclassified,
}

impl SmtpErrorKind {
    /// Status code the failure is reported with over HTTP.
    pub fn status(self) -> u16 {
        match self {
            SmtpErrorKind::Authentication => 401,
            SmtpErrorKind::RecipientRejected => 422,
            SmtpErrorKind::Connectivity | SmtpErrorKind::Tls => 502,
            SmtpErrorKind::Unclassified => 500,
        }
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct SmtpFailure {
    kind: SmtpErrorKind,
    message: String,
}

impl SmtpFailure {
    pub fn new(kind: SmtpErrorKind, message: impl Display) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> SmtpErrorKind {
        self.kind
    }
}

impl From<smtp::Error> for SmtpFailure {
    fn from(error: smtp::Error) -> Self {
        let kind = if error.is_timeout() {
            SmtpErrorKind::Connectivity
        } else if error.is_tls() {
            SmtpErrorKind::Tls
        } else if let Some(code) = error.status() {
            code.to_string()
                .parse()
                .map_or(SmtpErrorKind::Unclassified, classify_reply)
        } else if error.is_client() || error.is_response() {
            SmtpErrorKind::Unclassified
        } else {
            // connection, network and DNS failures carry no reply code
            SmtpErrorKind::Connectivity
        };
        Self::new(kind, error)
    }
}

/// Maps an SMTP reply code to the failure it stands for. The code alone does
/// not tell which command failed, so 501 (syntax error in any argument) stays
/// unclassified.
pub fn classify_reply(code: u16) -> SmtpErrorKind {
    match code {
        530 | 534 | 535 | 538 => SmtpErrorKind::Authentication,
        550..=553 => SmtpErrorKind::RecipientRejected,
        _ => SmtpErrorKind::Unclassified,
    }
}

/// Submission through a configured relay.
pub struct SmtpRelay {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for SmtpRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpRelay").finish_non_exhaustive()
    }
}

impl SmtpRelay {
    /// STARTTLS unless `implicit_tls` is set; plain authentication when
    /// credentials are given.
    pub fn new(
        host: &str,
        port: u16,
        implicit_tls: bool,
        credentials: Option<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, SmtpFailure> {
        let builder = if implicit_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        };
        let builder = builder.port(port).timeout(Some(timeout));
        let builder = match credentials {
            Some((user, password)) => builder.credentials(Credentials::new(user, password)),
            None => builder,
        };
        Ok(Self {
            transport: builder.build(),
        })
    }

    /// Checks that the server can be reached. Only logs, since the server may
    /// come up later.
    pub async fn verify(&self) {
        match self.transport.test_connection().await {
            Ok(true) => info!("SMTP server is reachable"),
            Ok(false) => warn!("SMTP server rejected test connection"),
            Err(error) => warn!("SMTP connection test failed: {error}"),
        }
    }
}

impl MailTransport for SmtpRelay {
    async fn submit(&self, message: Message) -> Result<Delivery, SmtpFailure> {
        let accepted: Vec<String> = message
            .envelope()
            .to()
            .iter()
            .map(ToString::to_string)
            .collect();
        let response = self.transport.send(message).await?;
        debug!(
            "SMTP server answered {}: {}",
            response.code(),
            response.message().collect::<Vec<_>>().join(" ")
        );
        Ok(Delivery {
            accepted,
            rejected: Vec::new(),
        })
    }
}
