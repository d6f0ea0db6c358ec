use std::{borrow::Cow, io};

use bytes::{Buf as _, BufMut as _, BytesMut};
use imap_proto::{Capability, MailboxDatum, NameAttribute, Request, Response};
use log::trace;
use tokio_util::codec::{Decoder, Encoder};

use crate::imap::mailbox::MailboxDescriptor;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bad,
    PreAuth,
    Bye,
}

impl From<imap_proto::Status> for Status {
    fn from(value: imap_proto::Status) -> Self {
        match value {
            imap_proto::Status::Ok => Status::Ok,
            imap_proto::Status::No => Status::No,
            imap_proto::Status::Bad => Status::Bad,
            imap_proto::Status::PreAuth => Status::PreAuth,
            imap_proto::Status::Bye => Status::Bye,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseCode {
    TryCreate,
    Capabilities(Vec<String>),
    Other,
}

/// Owned form of a single server response.
///
/// `imap_proto` borrows from the read buffer, so everything the client cares
/// about is copied out before the buffer is advanced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseData {
    Done {
        tag: String,
        status: Status,
        code: Option<ResponseCode>,
        information: Option<String>,
    },
    Continue {
        information: Option<String>,
    },
    Data {
        status: Status,
        code: Option<ResponseCode>,
        information: Option<String>,
    },
    Capabilities(Vec<String>),
    List(MailboxDescriptor),
    Search(Vec<u32>),
    Other,
}

impl ResponseData {
    pub fn request_id(&self) -> Option<&str> {
        if let ResponseData::Done { tag, .. } = self {
            Some(tag)
        } else {
            None
        }
    }
}

impl From<Response<'_>> for ResponseData {
    fn from(response: Response<'_>) -> Self {
        match response {
            Response::Done {
                tag,
                status,
                code,
                information,
            } => ResponseData::Done {
                tag: tag.0,
                status: status.into(),
                code: code.map(response_code),
                information: information.map(Cow::into_owned),
            },
            Response::Continue { information, .. } => ResponseData::Continue {
                information: information.map(Cow::into_owned),
            },
            Response::Data {
                status,
                code,
                information,
            } => ResponseData::Data {
                status: status.into(),
                code: code.map(response_code),
                information: information.map(Cow::into_owned),
            },
            Response::Capabilities(capabilities) => {
                ResponseData::Capabilities(capabilities.iter().map(capability_name).collect())
            }
            Response::MailboxData(MailboxDatum::List {
                name_attributes,
                delimiter,
                name,
            }) => ResponseData::List(MailboxDescriptor::from_listing(
                &name,
                delimiter.as_deref(),
                name_attributes.iter().map(name_attribute),
            )),
            Response::MailboxData(MailboxDatum::Search(ids)) => ResponseData::Search(ids),
            other => {
                trace!("ignoring untagged response {other:?}");
                ResponseData::Other
            }
        }
    }
}

fn response_code(code: imap_proto::ResponseCode<'_>) -> ResponseCode {
    match code {
        imap_proto::ResponseCode::TryCreate => ResponseCode::TryCreate,
        imap_proto::ResponseCode::Capabilities(capabilities) => {
            ResponseCode::Capabilities(capabilities.iter().map(capability_name).collect())
        }
        _ => ResponseCode::Other,
    }
}

fn capability_name(capability: &Capability<'_>) -> String {
    match capability {
        Capability::Imap4rev1 => "IMAP4rev1".to_string(),
        Capability::Auth(mechanism) => format!("AUTH={mechanism}"),
        Capability::Atom(atom) => atom.to_string(),
    }
}

fn name_attribute(attribute: &NameAttribute<'_>) -> String {
    match attribute {
        NameAttribute::NoInferiors => r"\Noinferiors".to_string(),
        NameAttribute::NoSelect => r"\Noselect".to_string(),
        NameAttribute::Marked => r"\Marked".to_string(),
        NameAttribute::Unmarked => r"\Unmarked".to_string(),
        NameAttribute::All => r"\All".to_string(),
        NameAttribute::Archive => r"\Archive".to_string(),
        NameAttribute::Drafts => r"\Drafts".to_string(),
        NameAttribute::Flagged => r"\Flagged".to_string(),
        NameAttribute::Junk => r"\Junk".to_string(),
        NameAttribute::Sent => r"\Sent".to_string(),
        NameAttribute::Trash => r"\Trash".to_string(),
        NameAttribute::Extension(extension) => extension.to_string(),
        _ => format!("{attribute:?}"),
    }
}

#[derive(Debug, Default)]
pub struct ImapCodec;

impl Decoder for ImapCodec {
    type Item = ResponseData;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.is_empty() {
            return Ok(None);
        }
        let (consumed, response) = match Response::from_bytes(buf) {
            Ok((remaining, response)) => (buf.len() - remaining.len(), response.into()),
            Err(nom::Err::Incomplete(_)) => return Ok(None),
            Err(nom::Err::Error(error) | nom::Err::Failure(error)) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "{:?} while parsing {:?}",
                        error.code,
                        String::from_utf8_lossy(buf)
                    ),
                ));
            }
        };
        buf.advance(consumed);
        Ok(Some(response))
    }
}

impl<'a> Encoder<&'a Request<'a>> for ImapCodec {
    type Error = io::Error;

    fn encode(&mut self, request: &'a Request<'a>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if !request.0.is_empty() {
            dst.put_slice(&request.0);
            dst.put_u8(b' ');
        }
        dst.put_slice(&request.1);
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
