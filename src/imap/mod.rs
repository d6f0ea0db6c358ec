mod client;
mod connection;
mod error;
mod flag;
mod mailbox;

use std::time::Duration;

use derive_getters::Getters;
use log::debug;

pub use client::Capabilities;
use client::Client;
pub use client::Session;
pub use connection::ResponseCode;
pub use error::ImapError;
pub use flag::Flag;
pub use mailbox::MailboxDescriptor;
pub use mailbox::SENT_ATTRIBUTE;

/// Everything needed to open an authenticated session.
#[derive(Clone, Getters)]
pub struct ImapConnector {
    host: String,
    port: u16,
    implicit_tls: bool,
    username: String,
    #[getter(skip)]
    password: String,
    timeout: Duration,
}

impl ImapConnector {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        implicit_tls: bool,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            implicit_tls,
            username: username.into(),
            password: password.into(),
            timeout,
        }
    }

    /// Connects and logs in, giving up once the configured timeout elapsed.
    pub async fn connect(&self) -> Result<Session, ImapError> {
        debug!(
            "opening IMAP session to {}:{} as {}",
            self.host, self.port, self.username
        );
        tokio::time::timeout(self.timeout, async {
            let client = Client::connect(&self.host, self.port, self.implicit_tls).await?;
            client.login(&self.username, &self.password).await
        })
        .await
        .map_err(|_| ImapError::Timeout(self.timeout))?
    }
}

impl std::fmt::Debug for ImapConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapConnector")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("implicit_tls", &self.implicit_tls)
            .field("username", &self.username)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
