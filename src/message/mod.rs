use std::fmt::Write as _;

use derive_builder::Builder;
use derive_getters::Getters;
use jiff::{Timestamp, Zoned};
use rand::{Rng as _, distributions::Alphanumeric};

const CRLF: &str = "\r\n";
const FALLBACK_DOMAIN: &str = "localhost";

/// Everything the composer needs to render one message.
#[derive(Clone, Debug, PartialEq, Eq, Builder, Getters)]
#[builder(setter(into))]
pub struct SendParams {
    from: String,
    to: Vec<String>,
    #[builder(default)]
    cc: Vec<String>,
    #[builder(default)]
    bcc: Vec<String>,
    subject: String,
    #[builder(default, setter(into, strip_option))]
    text: Option<String>,
    #[builder(default, setter(into, strip_option))]
    html: Option<String>,
    #[builder(default, setter(into, strip_option))]
    message_id: Option<String>,
}

impl SendParams {
    /// Parameters for a message without body or copies.
    pub fn new(from: impl Into<String>, to: Vec<String>, subject: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to,
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: subject.into(),
            text: None,
            html: None,
            message_id: None,
        }
    }
}

/// An RFC 822 message as it is handed to the IMAP server.
#[derive(Clone, PartialEq, Eq)]
pub struct RawMessage {
    message_id: String,
    bytes: Vec<u8>,
}

impl RawMessage {
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for RawMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawMessage")
            .field("message_id", &self.message_id)
            .field("length", &self.bytes.len())
            .finish()
    }
}

pub fn compose(params: &SendParams) -> RawMessage {
    compose_at(params, &Zoned::now())
}

fn compose_at(params: &SendParams, now: &Zoned) -> RawMessage {
    let message_id = params
        .message_id
        .clone()
        .unwrap_or_else(|| message_id_at(&params.from, now.timestamp()));

    let mut message = String::new();
    header(&mut message, "Message-ID", &message_id);
    header(&mut message, "Date", &rfc2822_date(now));
    header(&mut message, "From", &params.from);
    header(&mut message, "To", &params.to.join(", "));
    if !params.cc.is_empty() {
        header(&mut message, "Cc", &params.cc.join(", "));
    }
    if !params.bcc.is_empty() {
        header(&mut message, "Bcc", &params.bcc.join(", "));
    }
    header(&mut message, "Subject", &params.subject);
    header(&mut message, "MIME-Version", "1.0");

    match (&params.text, &params.html) {
        (Some(text), Some(html)) => {
            let boundary = boundary();
            header(
                &mut message,
                "Content-Type",
                &format!("multipart/alternative; boundary=\"{boundary}\""),
            );
            message.push_str(CRLF);
            for (content_type, body) in [("text/plain", text), ("text/html", html)] {
                message.push_str(&format!("--{boundary}{CRLF}"));
                part(&mut message, content_type, body);
                message.push_str(CRLF);
            }
            message.push_str(&format!("--{boundary}--{CRLF}"));
        }
        (None, Some(html)) => part(&mut message, "text/html", html),
        (text, None) => part(&mut message, "text/plain", text.as_deref().unwrap_or_default()),
    }

    RawMessage {
        message_id,
        bytes: message.into_bytes(),
    }
}

fn header(message: &mut String, name: &str, value: &str) {
    write!(message, "{name}: {value}{CRLF}").expect("writing to a String should succeed");
}

fn part(message: &mut String, content_type: &str, body: &str) {
    header(message, "Content-Type", &format!("{content_type}; charset=UTF-8"));
    header(message, "Content-Transfer-Encoding", "8bit");
    message.push_str(CRLF);
    message.push_str(body);
}

/// `<millis.token@domain>`, with the domain taken from the sender address.
pub fn message_id(from: &str) -> String {
    message_id_at(from, Timestamp::now())
}

fn message_id_at(from: &str, now: Timestamp) -> String {
    format!(
        "<{}.{}@{}>",
        now.as_millisecond(),
        token(12),
        domain_of(from).unwrap_or(FALLBACK_DOMAIN)
    )
}

/// Domain part of `user@domain` or `Name <user@domain>`.
pub fn domain_of(address: &str) -> Option<&str> {
    let (_, domain) = address.rsplit_once('@')?;
    let domain = domain.trim().trim_end_matches('>').trim();
    (!domain.is_empty()).then_some(domain)
}

pub fn token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

fn boundary() -> String {
    format!("=_mailrelay_{}", token(24))
}

pub fn rfc2822_date(time: &Zoned) -> String {
    time.strftime("%a, %d %b %Y %H:%M:%S %z").to_string()
}

/// Date in the form APPEND expects, e.g. `19-Oct-2026 10:00:00 +0200`.
pub fn internal_date(time: &Zoned) -> String {
    time.strftime("%d-%b-%Y %H:%M:%S %z").to_string()
}
