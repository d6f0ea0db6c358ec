use futures::StreamExt as _;
use log::{debug, trace};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_native_tls::{TlsConnector, native_tls};
use tokio_util::codec::Framed;

use super::{
    codec::{ImapCodec, ResponseCode, ResponseData, Status},
    response_stream::ResponseStream,
    tag_generator::TagGenerator,
};
use crate::imap::ImapError;

pub trait ImapTransport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ImapTransport for T {}

pub type ImapStream = Framed<Box<dyn ImapTransport>, ImapCodec>;

pub struct Connection {
    stream: ImapStream,
    tag_generator: TagGenerator,
}

impl Connection {
    pub async fn connect_to(
        host: &str,
        port: u16,
        implicit_tls: bool,
    ) -> Result<(Self, ResponseData), ImapError> {
        debug!("connecting to {host}:{port}");
        let stream = TcpStream::connect((host, port)).await?;
        let transport: Box<dyn ImapTransport> = if implicit_tls {
            Box::new(tls_connector()?.connect(host, stream).await?)
        } else {
            Box::new(stream)
        };
        Self::from_transport(transport).await
    }

    /// Wraps an already established byte stream and reads the server greeting.
    pub async fn from_transport(
        transport: Box<dyn ImapTransport>,
    ) -> Result<(Self, ResponseData), ImapError> {
        let mut stream = Framed::new(transport, ImapCodec);
        let greeting = stream.next().await.ok_or(ImapError::ConnectionClosed)??;
        trace!("greeting = {greeting:?}");

        Ok((
            Connection {
                stream,
                tag_generator: TagGenerator::default(),
            },
            greeting,
        ))
    }

    /// Upgrades a plain connection after the server accepted `STARTTLS`.
    pub async fn upgrade_to_tls(self, host: &str) -> Result<Self, ImapError> {
        debug!("upgrading connection to TLS");
        let transport = self.stream.into_inner();
        let transport: Box<dyn ImapTransport> =
            Box::new(tls_connector()?.connect(host, transport).await?);
        Ok(Self {
            stream: Framed::new(transport, ImapCodec),
            tag_generator: self.tag_generator,
        })
    }

    pub fn send<'a>(&'a mut self, command: &'a str) -> ResponseStream<'a> {
        ResponseStream::new(
            &mut self.stream,
            &mut self.tag_generator,
            command.as_bytes(),
        )
    }

    /// Runs a command to completion and returns its untagged responses.
    pub async fn execute(&mut self, command: &str) -> Result<Vec<ResponseData>, ImapError> {
        let (untagged, _) = self.execute_with_code(command).await?;
        Ok(untagged)
    }

    /// Like [`Connection::execute`], but also hands back the response code of
    /// the tagged completion, e.g. `[CAPABILITY ...]` after LOGIN.
    pub async fn execute_with_code(
        &mut self,
        command: &str,
    ) -> Result<(Vec<ResponseData>, Option<ResponseCode>), ImapError> {
        let mut responses = self.send(command);
        let mut untagged = Vec::new();
        while let Some(response) = responses.next().await {
            match response? {
                done @ ResponseData::Done { .. } => return complete(command, done, untagged),
                other => untagged.push(other),
            }
        }
        Err(ImapError::ConnectionClosed)
    }

    /// Runs a command whose last argument is a synchronizing literal. The
    /// literal is only written once the server answers with `+`; a server that
    /// rejects the command right away never sees it.
    pub async fn execute_with_literal(
        &mut self,
        command: &str,
        literal: &[u8],
    ) -> Result<Vec<ResponseData>, ImapError> {
        let mut responses = self.send(command);
        let mut untagged = Vec::new();
        let mut literal_sent = false;
        while let Some(response) = responses.next().await {
            match response? {
                ResponseData::Continue { .. } if !literal_sent => {
                    trace!("sending {} byte literal", literal.len());
                    responses.send_continuation(literal).await?;
                    literal_sent = true;
                }
                done @ ResponseData::Done { .. } => {
                    return complete(command, done, untagged).map(|(untagged, _)| untagged);
                }
                other => untagged.push(other),
            }
        }
        Err(ImapError::ConnectionClosed)
    }
}

fn complete(
    command: &str,
    done: ResponseData,
    untagged: Vec<ResponseData>,
) -> Result<(Vec<ResponseData>, Option<ResponseCode>), ImapError> {
    let ResponseData::Done {
        status,
        code,
        information,
        ..
    } = done
    else {
        return Ok((untagged, None));
    };
    let command = command_name(command);
    match status {
        Status::Ok => {
            trace!("{command} completed: {information:?}");
            Ok((untagged, code))
        }
        Status::No => Err(ImapError::No {
            command,
            code,
            information: information.unwrap_or_default(),
        }),
        Status::Bad => Err(ImapError::Bad {
            command,
            information: information.unwrap_or_default(),
        }),
        Status::PreAuth | Status::Bye => Err(ImapError::UnexpectedStatus { command, status }),
    }
}

/// First word of a command line; arguments may carry credentials.
fn command_name(command: &str) -> String {
    command
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

fn tls_connector() -> Result<TlsConnector, ImapError> {
    Ok(TlsConnector::from(native_tls::TlsConnector::new()?))
}
