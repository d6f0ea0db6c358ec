mod appender;
#[cfg(test)]
pub mod fake;
mod prober;
mod resolver;

pub use appender::SentCopyAppender;
pub use appender::SentCopyStore;
pub use prober::MailboxProber;
pub use prober::SessionOpener;
pub use resolver::ResolutionResult;
pub use resolver::ResolveError;
pub use resolver::resolve_sent_folder;
