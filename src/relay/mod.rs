#[cfg(test)]
pub mod fake;

use std::{sync::Arc, time::Duration};

use lettre::{
    Message,
    address::AddressError,
    message::{
        Attachment as AttachmentPart, Mailbox, MultiPart, SinglePart, header::ContentType,
    },
};
use log::{debug, error, info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio_util::task::TaskTracker;

use crate::{
    message::{self, RawMessage, SendParamsBuilder},
    sent::SentCopyStore,
    smtp::{MailTransport, SmtpFailure},
};

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: Option<String>,
}

/// A send request whose fields have already been validated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SendRequest {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<Attachment>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub message_id: String,
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("invalid address {address}: {source}")]
    Address {
        address: String,
        source: AddressError,
    },
    #[error("invalid content type {0}")]
    ContentType(String),
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error(transparent)]
    Smtp(#[from] SmtpFailure),
}

enum Content {
    Single(SinglePart),
    Alternative(MultiPart),
}

/// Sends messages and, when asked to, keeps a copy of each one in the
/// background.
pub struct Relay<T, S> {
    transport: T,
    copies: Arc<S>,
    from: String,
    sender: Mailbox,
    save_copy: bool,
    copy_timeout: Duration,
    copy_tasks: TaskTracker,
}

impl<T, S> std::fmt::Debug for Relay<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("from", &self.from)
            .field("save_copy", &self.save_copy)
            .field("copy_timeout", &self.copy_timeout)
            .field("copy_tasks", &self.copy_tasks.len())
            .finish_non_exhaustive()
    }
}

impl<T: MailTransport, S: SentCopyStore> Relay<T, S> {
    pub fn new(
        transport: T,
        copies: S,
        from: impl Into<String>,
        save_copy: bool,
        copy_timeout: Duration,
    ) -> Result<Self, SendError> {
        let from = from.into();
        let sender = mailbox(&from)?;
        Ok(Self {
            transport,
            copies: Arc::new(copies),
            from,
            sender,
            save_copy,
            copy_timeout,
            copy_tasks: TaskTracker::new(),
        })
    }

    /// Waits for every Sent copy still in flight. Each one is bounded by the
    /// copy timeout.
    pub async fn shutdown(&self) {
        self.copy_tasks.close();
        if !self.copy_tasks.is_empty() {
            info!("waiting for {} Sent copies to finish", self.copy_tasks.len());
        }
        self.copy_tasks.wait().await;
    }

    pub async fn send(&self, request: SendRequest) -> Result<SendReceipt, SendError> {
        let message_id = message::message_id(&self.from);
        let message = self.build(&request, &message_id)?;

        let delivery = self.transport.submit(message).await.inspect_err(|failure| {
            warn!("sending {message_id} failed ({:?}): {failure}", failure.kind());
        })?;
        info!(
            "sent {message_id} to {} recipient(s)",
            delivery.accepted.len()
        );

        if self.save_copy {
            self.save_copy_of(&request, &message_id);
        }

        Ok(SendReceipt {
            message_id,
            accepted: delivery.accepted,
            rejected: delivery.rejected,
        })
    }

    fn build(&self, request: &SendRequest, message_id: &str) -> Result<Message, SendError> {
        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(request.subject.clone())
            .message_id(Some(message_id.to_string()));
        for address in &request.to {
            builder = builder.to(mailbox(address)?);
        }
        for address in &request.cc {
            builder = builder.cc(mailbox(address)?);
        }
        for address in &request.bcc {
            builder = builder.bcc(mailbox(address)?);
        }

        let content = match (&request.text, &request.html) {
            (Some(text), Some(html)) => {
                Content::Alternative(MultiPart::alternative_plain_html(text.clone(), html.clone()))
            }
            (None, Some(html)) => Content::Single(SinglePart::html(html.clone())),
            (text, None) => Content::Single(SinglePart::plain(text.clone().unwrap_or_default())),
        };

        if request.attachments.is_empty() {
            return Ok(match content {
                Content::Single(part) => builder.singlepart(part)?,
                Content::Alternative(parts) => builder.multipart(parts)?,
            });
        }

        let mut mixed = match content {
            Content::Single(part) => MultiPart::mixed().singlepart(part),
            Content::Alternative(parts) => MultiPart::mixed().multipart(parts),
        };
        for attachment in &request.attachments {
            let content_type = attachment.content_type.as_deref().unwrap_or(OCTET_STREAM);
            let content_type = ContentType::parse(content_type)
                .map_err(|_| SendError::ContentType(content_type.to_string()))?;
            mixed = mixed.singlepart(
                AttachmentPart::new(attachment.filename.clone())
                    .body(attachment.content.clone(), content_type),
            );
        }
        Ok(builder.multipart(mixed)?)
    }

    /// Composes the Sent copy and stores it on a detached task. The task is
    /// aborted once the copy timeout elapses.
    fn save_copy_of(&self, request: &SendRequest, message_id: &str) {
        let mut params = SendParamsBuilder::default();
        params
            .from(self.from.clone())
            .to(request.to.clone())
            .cc(request.cc.clone())
            .bcc(request.bcc.clone())
            .subject(request.subject.clone())
            .message_id(message_id);
        if let Some(text) = &request.text {
            params.text(text.clone());
        }
        if let Some(html) = &request.html {
            params.html(html.clone());
        }
        let raw = match params.build() {
            Ok(params) => message::compose(&params),
            Err(error) => {
                warn!("could not compose Sent copy of {message_id}: {error}");
                return;
            }
        };

        spawn_copy(
            &self.copy_tasks,
            Arc::clone(&self.copies),
            raw,
            self.copy_timeout,
        );
    }
}

fn spawn_copy<S: SentCopyStore>(
    tasks: &TaskTracker,
    copies: Arc<S>,
    raw: RawMessage,
    timeout: Duration,
) {
    let message_id = raw.message_id().to_string();
    let mut task = tokio::spawn(async move { copies.store(raw).await });
    // the supervisor only ends once the copy finished or was aborted
    tasks.spawn(async move {
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => debug!("Sent copy task for {message_id} finished"),
            Ok(Err(join_error)) => error!("Sent copy task for {message_id} failed: {join_error}"),
            Err(_) => {
                task.abort();
                warn!("saving Sent copy of {message_id} timed out after {timeout:?}");
            }
        }
    });
}

fn mailbox(address: &str) -> Result<Mailbox, SendError> {
    address.parse().map_err(|source| SendError::Address {
        address: address.to_string(),
        source,
    })
}
