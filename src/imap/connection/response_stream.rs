use std::{
    borrow::Cow,
    pin::Pin,
    task::{Context, Poll, ready},
};

use futures::{SinkExt as _, Stream, TryStreamExt as _};
use imap_proto::Request;

use super::{codec::ResponseData, connection::ImapStream, tag_generator::TagGenerator};
use crate::imap::ImapError;

enum ResponseStreamState {
    Start,
    Sending,
    Receiving,
    Done,
}

/// Sends one tagged command and yields every response up to and including the
/// tagged completion.
pub struct ResponseStream<'a> {
    imap_stream: &'a mut ImapStream,
    state: ResponseStreamState,
    tag_generator: &'a mut TagGenerator,
    tag: String,
    command: &'a [u8],
}

impl<'a> ResponseStream<'a> {
    pub fn new(
        imap_stream: &'a mut ImapStream,
        tag_generator: &'a mut TagGenerator,
        command: &'a [u8],
    ) -> Self {
        Self {
            imap_stream,
            state: ResponseStreamState::Start,
            tag_generator,
            tag: String::with_capacity(0),
            command,
        }
    }

    fn start_sending(&mut self) -> Result<(), ImapError> {
        let tag = self.tag_generator.next();
        let request = Request(Cow::Borrowed(tag.as_bytes()), Cow::Borrowed(self.command));
        self.imap_stream.start_send_unpin(&request)?;
        self.tag = tag;
        self.state = ResponseStreamState::Sending;
        Ok(())
    }

    fn fail(&mut self, error: impl Into<ImapError>) -> Poll<Option<Result<ResponseData, ImapError>>> {
        self.state = ResponseStreamState::Done;
        Poll::Ready(Some(Err(error.into())))
    }

    /// Writes literal data after the server asked for it with a `+`
    /// continuation. The trailing CRLF ends the pending command line.
    pub async fn send_continuation(&mut self, data: &[u8]) -> Result<(), ImapError> {
        let request = Request(Cow::Borrowed(b"".as_slice()), Cow::Borrowed(data));
        self.imap_stream.send(&request).await?;
        Ok(())
    }
}

impl Stream for ResponseStream<'_> {
    type Item = Result<ResponseData, ImapError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match self.state {
                ResponseStreamState::Start => {
                    if let Err(error) = ready!(self.imap_stream.poll_ready_unpin(cx)) {
                        return self.fail(error);
                    }
                    if let Err(error) = self.start_sending() {
                        return self.fail(error);
                    }
                }
                ResponseStreamState::Sending => {
                    if let Err(error) = ready!(self.imap_stream.poll_flush_unpin(cx)) {
                        return self.fail(error);
                    }
                    self.state = ResponseStreamState::Receiving;
                }
                ResponseStreamState::Receiving => {
                    return match ready!(self.imap_stream.try_poll_next_unpin(cx)) {
                        None => self.fail(ImapError::ConnectionClosed),
                        Some(Ok(data)) => {
                            if let Some(tag) = data.request_id() {
                                if tag != self.tag {
                                    let error = ImapError::UnexpectedTag {
                                        expected: self.tag.clone(),
                                        received: tag.to_string(),
                                    };
                                    return self.fail(error);
                                }
                                self.state = ResponseStreamState::Done;
                            }
                            Poll::Ready(Some(Ok(data)))
                        }
                        Some(Err(error)) => self.fail(error),
                    };
                }
                ResponseStreamState::Done => return Poll::Ready(None),
            }
        }
    }
}
