use enumflags2::BitFlags;
use jiff::Zoned;
use log::debug;

use crate::{
    imap::{Capabilities, Flag, ImapConnector, ImapError, MailboxDescriptor, Session},
    message::internal_date,
};

/// Mailbox operations the Sent folder algorithms need from one
/// authenticated session.
pub trait MailboxProber: Send {
    fn capabilities(&mut self) -> impl Future<Output = Result<Capabilities, ImapError>> + Send;

    fn list_folders(
        &mut self,
    ) -> impl Future<Output = Result<Vec<MailboxDescriptor>, ImapError>> + Send;

    fn list_special_use(
        &mut self,
    ) -> impl Future<Output = Result<Vec<MailboxDescriptor>, ImapError>> + Send;

    fn create_folder(
        &mut self,
        path: &str,
        special_use: Option<&str>,
    ) -> impl Future<Output = Result<(), ImapError>> + Send;

    /// Selects `path`. Only one mailbox is locked at a time.
    fn lock(&mut self, path: &str) -> impl Future<Output = Result<(), ImapError>> + Send;

    fn unlock(&mut self) -> impl Future<Output = Result<(), ImapError>> + Send;

    /// Appends with the current time as internal date.
    fn append_message(
        &mut self,
        path: &str,
        flags: BitFlags<Flag>,
        message: &[u8],
    ) -> impl Future<Output = Result<(), ImapError>> + Send;

    fn search_header(
        &mut self,
        header: &str,
        value: &str,
    ) -> impl Future<Output = Result<Vec<u32>, ImapError>> + Send;

    fn delete_messages(&mut self, uids: &[u32]) -> impl Future<Output = Result<(), ImapError>> + Send;

    /// Releases any lock and logs out. Consuming the session makes a second
    /// close impossible; failures are only logged.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Opens one authenticated session per call.
pub trait SessionOpener: Send + Sync {
    type Session: MailboxProber;

    fn open(&self) -> impl Future<Output = Result<Self::Session, ImapError>> + Send;
}

impl MailboxProber for Session {
    async fn capabilities(&mut self) -> Result<Capabilities, ImapError> {
        Session::capabilities(self).await
    }

    async fn list_folders(&mut self) -> Result<Vec<MailboxDescriptor>, ImapError> {
        self.list().await
    }

    async fn list_special_use(&mut self) -> Result<Vec<MailboxDescriptor>, ImapError> {
        Session::list_special_use(self).await
    }

    async fn create_folder(&mut self, path: &str, special_use: Option<&str>) -> Result<(), ImapError> {
        self.create(path, special_use).await
    }

    async fn lock(&mut self, path: &str) -> Result<(), ImapError> {
        self.select(path).await
    }

    async fn unlock(&mut self) -> Result<(), ImapError> {
        self.unselect().await
    }

    async fn append_message(
        &mut self,
        path: &str,
        flags: BitFlags<Flag>,
        message: &[u8],
    ) -> Result<(), ImapError> {
        let date = internal_date(&Zoned::now());
        self.append(path, flags, &date, message).await
    }

    async fn search_header(&mut self, header: &str, value: &str) -> Result<Vec<u32>, ImapError> {
        Session::search_header(self, header, value).await
    }

    async fn delete_messages(&mut self, uids: &[u32]) -> Result<(), ImapError> {
        self.delete(uids).await
    }

    async fn close(mut self) {
        if let Err(error) = self.unselect().await {
            debug!("releasing mailbox before logout failed: {error}");
        }
        if let Err(error) = self.logout().await {
            debug!("logout failed: {error}");
        }
    }
}

impl SessionOpener for ImapConnector {
    type Session = Session;

    async fn open(&self) -> Result<Session, ImapError> {
        self.connect().await
    }
}
