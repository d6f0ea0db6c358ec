use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    imap::{Flag, ImapError},
    message::RawMessage,
    sent::{MailboxProber, SessionOpener},
};

/// Names tried after the configured mailbox, in order.
const FALLBACK_MAILBOXES: [&str; 6] = [
    "Sent",
    "Sent Items",
    "Sent Messages",
    "INBOX.Sent",
    "INBOX/Sent",
    "[Gmail]/Sent Mail",
];

/// Something that keeps a copy of every message that went out.
pub trait SentCopyStore: Send + Sync + 'static {
    fn store(&self, message: RawMessage) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Error)]
enum AppendError {
    #[error("could not open IMAP session: {0}")]
    Open(#[source] ImapError),
    #[error("none of the mailboxes {0:?} could be opened")]
    NoMailbox(Vec<String>),
    #[error("appending to {mailbox} failed: {source}")]
    Append { mailbox: String, source: ImapError },
}

/// Best-effort append of sent messages into a Sent-like mailbox. Failures
/// are logged and never reach the caller.
pub struct SentCopyAppender<O> {
    opener: Option<O>,
    enabled: bool,
    mailbox: String,
}

impl<O: SessionOpener> SentCopyAppender<O> {
    pub fn new(opener: Option<O>, enabled: bool, mailbox: impl Into<String>) -> Self {
        Self {
            opener,
            enabled,
            mailbox: mailbox.into(),
        }
    }

    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    pub fn set_mailbox(&mut self, mailbox: impl Into<String>) {
        self.mailbox = mailbox.into();
    }

    pub fn is_active(&self) -> bool {
        self.enabled && self.opener.is_some()
    }

    pub async fn append(&self, message: Option<&RawMessage>) {
        let (Some(opener), Some(message)) = (self.opener.as_ref().filter(|_| self.enabled), message)
        else {
            debug!("saving Sent copy skipped");
            return;
        };
        match self.append_with(opener, message).await {
            Ok(mailbox) => info!("saved copy of {} to {mailbox}", message.message_id()),
            Err(error) => warn!("could not save copy of {}: {error}", message.message_id()),
        }
    }

    async fn append_with(&self, opener: &O, message: &RawMessage) -> Result<String, AppendError> {
        let mut session = opener.open().await.map_err(AppendError::Open)?;
        let result = self.append_into(&mut session, message).await;
        session.close().await;
        result
    }

    async fn append_into<P: MailboxProber>(
        &self,
        session: &mut P,
        message: &RawMessage,
    ) -> Result<String, AppendError> {
        let candidates = self.candidates();
        let mut mailbox = None;
        for candidate in &candidates {
            match session.lock(candidate).await {
                Ok(()) => {
                    mailbox = Some(candidate.clone());
                    break;
                }
                Err(error) => debug!("cannot open {candidate}: {error}"),
            }
        }
        let mailbox = mailbox.ok_or(AppendError::NoMailbox(candidates))?;

        session
            .append_message(&mailbox, Flag::Seen.into(), message.as_bytes())
            .await
            .map_err(|source| AppendError::Append {
                mailbox: mailbox.clone(),
                source,
            })?;
        Ok(mailbox)
    }

    /// The configured mailbox first, then the fallbacks it is not already.
    fn candidates(&self) -> Vec<String> {
        let mut candidates = vec![self.mailbox.clone()];
        for fallback in FALLBACK_MAILBOXES {
            if !candidates
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(fallback))
            {
                candidates.push(fallback.to_string());
            }
        }
        candidates.retain(|candidate| !candidate.is_empty());
        candidates
    }
}

impl<O> SentCopyStore for SentCopyAppender<O>
where
    O: SessionOpener + 'static,
{
    async fn store(&self, message: RawMessage) {
        self.append(Some(&message)).await;
    }
}
