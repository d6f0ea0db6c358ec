use std::{io, time::Duration};

use thiserror::Error;
use tokio_native_tls::native_tls;

use crate::imap::connection::{ResponseCode, Status};

#[derive(Debug, Error)]
pub enum ImapError {
    #[error("IMAP connection failed: {0}")]
    Io(#[from] io::Error),
    #[error("TLS negotiation with IMAP server failed: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("IMAP server closed the connection")]
    ConnectionClosed,
    #[error("IMAP server refused the connection: {0}")]
    Refused(String),
    #[error("username or password rejected")]
    LoginRejected,
    #[error("{command} failed: {information}")]
    No {
        command: String,
        code: Option<ResponseCode>,
        information: String,
    },
    #[error("{command} rejected as invalid: {information}")]
    Bad { command: String, information: String },
    #[error("unexpected {status:?} completion for {command}")]
    UnexpectedStatus { command: String, status: Status },
    #[error("response tag {received} does not match request tag {expected}")]
    UnexpectedTag { expected: String, received: String },
    #[error("IMAP operation timed out after {0:?}")]
    Timeout(Duration),
}

impl ImapError {
    /// Whether the server hinted that the target mailbox has to be created
    /// before the command can succeed.
    pub fn is_try_create(&self) -> bool {
        match self {
            ImapError::No {
                code: Some(ResponseCode::TryCreate),
                ..
            } => true,
            ImapError::No { information, .. } => information.contains("TRYCREATE"),
            _ => false,
        }
    }
}
