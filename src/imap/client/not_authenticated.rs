use log::{debug, warn};

use crate::imap::{
    ImapError,
    client::{
        Session,
        capability::{Capabilities, Capability},
    },
    connection::{Connection, ResponseCode, ResponseData, Status},
    mailbox::quote,
};

/// A connection that has been greeted but not logged in yet.
pub struct Client {
    connection: Connection,
    capabilities: Capabilities,
    preauthenticated: bool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("capabilities", &self.capabilities)
            .field("preauthenticated", &self.preauthenticated)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub async fn connect(host: &str, port: u16, implicit_tls: bool) -> Result<Self, ImapError> {
        let (connection, greeting) = Connection::connect_to(host, port, implicit_tls).await?;
        let client = Self::greeted(connection, greeting)?;
        if implicit_tls || client.preauthenticated {
            Ok(client)
        } else {
            client.start_tls_if_offered(host).await
        }
    }

    /// Builds a client on top of an arbitrary stream, without any TLS handling.
    #[cfg(test)]
    pub async fn from_transport(transport: Box<dyn crate::imap::connection::ImapTransport>) -> Result<Self, ImapError> {
        let (connection, greeting) = Connection::from_transport(transport).await?;
        Self::greeted(connection, greeting)
    }

    fn greeted(connection: Connection, greeting: ResponseData) -> Result<Self, ImapError> {
        let (status, code, information) = match greeting {
            ResponseData::Data {
                status,
                code,
                information,
            } => (status, code, information),
            other => {
                return Err(ImapError::Refused(format!("unexpected greeting {other:?}")));
            }
        };
        let preauthenticated = match status {
            Status::Ok => false,
            Status::PreAuth => true,
            Status::No | Status::Bad | Status::Bye => {
                return Err(ImapError::Refused(information.unwrap_or_default()));
            }
        };
        let mut capabilities = Capabilities::default();
        if let Some(ResponseCode::Capabilities(names)) = &code {
            capabilities.update(names.iter().map(String::as_str));
        }

        Ok(Self {
            connection,
            capabilities,
            preauthenticated,
        })
    }

    async fn refresh_capabilities(&mut self) -> Result<(), ImapError> {
        let responses = self.connection.execute("CAPABILITY").await?;
        update_capabilities(&mut self.capabilities, &responses);
        Ok(())
    }

    async fn start_tls_if_offered(mut self, host: &str) -> Result<Self, ImapError> {
        if !self.capabilities.is_known() {
            self.refresh_capabilities().await?;
        }
        if !self.capabilities.contains(Capability::StartTls) {
            warn!("IMAP server does not offer STARTTLS, continuing without encryption");
            return Ok(self);
        }
        debug!("STARTTLS");
        self.connection.execute("STARTTLS").await?;
        let connection = self.connection.upgrade_to_tls(host).await?;

        // capabilities announced before the handshake must not be trusted
        Ok(Self {
            connection,
            capabilities: Capabilities::default(),
            preauthenticated: false,
        })
    }

    pub async fn login(mut self, username: &str, password: &str) -> Result<Session, ImapError> {
        if self.preauthenticated {
            debug!("server greeted with PREAUTH, skipping login");
            return Ok(Session::new(self.connection, self.capabilities));
        }
        if self.capabilities.contains(Capability::LoginDisabled) {
            return Err(ImapError::Refused(
                "server disabled LOGIN on this connection".to_string(),
            ));
        }
        debug!("LOGIN <user> <password>");
        let command = format!("LOGIN {} {}", quote(username), quote(password));
        let (responses, code) = match self.connection.execute_with_code(&command).await {
            Ok(completion) => completion,
            Err(ImapError::No { .. }) => return Err(ImapError::LoginRejected),
            Err(error) => return Err(error),
        };

        // the server may announce different capabilities once authenticated
        let mut capabilities = Capabilities::default();
        if let Some(ResponseCode::Capabilities(names)) = &code {
            capabilities.update(names.iter().map(String::as_str));
        }
        update_capabilities(&mut capabilities, &responses);
        Ok(Session::new(self.connection, capabilities))
    }
}

pub(super) fn update_capabilities(capabilities: &mut Capabilities, responses: &[ResponseData]) {
    for response in responses {
        if let ResponseData::Capabilities(names) = response {
            capabilities.update(names.iter().map(String::as_str));
        }
    }
}
