//! Transport and copy store doubles that record what the relay hands them.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use lettre::Message;
use tokio::sync::mpsc;

use crate::{
    message::RawMessage,
    sent::SentCopyStore,
    smtp::{Delivery, MailTransport, SmtpErrorKind, SmtpFailure},
};

#[derive(Clone, Default)]
pub struct FakeTransport {
    failure: Option<SmtpErrorKind>,
    submitted: Arc<Mutex<Vec<Message>>>,
}

impl FakeTransport {
    pub fn failing(kind: SmtpErrorKind) -> Self {
        Self {
            failure: Some(kind),
            ..Self::default()
        }
    }

    pub fn submitted(&self) -> Vec<Message> {
        self.submitted
            .lock()
            .expect("submitted messages should not be poisoned")
            .clone()
    }
}

impl MailTransport for FakeTransport {
    async fn submit(&self, message: Message) -> Result<Delivery, SmtpFailure> {
        if let Some(kind) = self.failure {
            return Err(SmtpFailure::new(kind, "simulated failure"));
        }
        let accepted = message
            .envelope()
            .to()
            .iter()
            .map(ToString::to_string)
            .collect();
        self.submitted
            .lock()
            .expect("submitted messages should not be poisoned")
            .push(message);
        Ok(Delivery {
            accepted,
            rejected: Vec::new(),
        })
    }
}

/// How the fake store reacts to a copy.
#[derive(Clone, Copy, Default)]
pub enum CopyBehaviour {
    #[default]
    Keep,
    Panic,
    Hang,
    Slow(Duration),
}

pub struct FakeCopyStore {
    behaviour: CopyBehaviour,
    copies: mpsc::UnboundedSender<RawMessage>,
}

impl FakeCopyStore {
    pub fn new(behaviour: CopyBehaviour) -> (Self, mpsc::UnboundedReceiver<RawMessage>) {
        let (copies, received) = mpsc::unbounded_channel();
        (Self { behaviour, copies }, received)
    }
}

/// Reports through the channel once the owning future is dropped.
struct DropSignal(mpsc::UnboundedSender<RawMessage>, Option<RawMessage>);

impl Drop for DropSignal {
    fn drop(&mut self) {
        if let Some(message) = self.1.take() {
            let _ = self.0.send(message);
        }
    }
}

impl SentCopyStore for FakeCopyStore {
    async fn store(&self, message: RawMessage) {
        match self.behaviour {
            CopyBehaviour::Keep => {
                let _ = self.copies.send(message);
            }
            CopyBehaviour::Panic => panic!("simulated append failure"),
            CopyBehaviour::Slow(delay) => {
                tokio::time::sleep(delay).await;
                let _ = self.copies.send(message);
            }
            CopyBehaviour::Hang => {
                let _signal = DropSignal(self.copies.clone(), Some(message));
                std::future::pending::<()>().await;
            }
        }
    }
}
