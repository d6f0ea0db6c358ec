use std::collections::BTreeSet;

use derive_getters::Getters;
use utf7_imap::{decode_utf7_imap, encode_utf7_imap};

/// Attributes defined by RFC 6154 for well known mailbox roles.
const SPECIAL_USE_ATTRIBUTES: [&str; 7] = [
    r"\All",
    r"\Archive",
    r"\Drafts",
    r"\Flagged",
    r"\Junk",
    r"\Sent",
    r"\Trash",
];

pub const SENT_ATTRIBUTE: &str = r"\Sent";

const DEFAULT_DELIMITER: char = '/';

/// One entry of a LIST response, as seen at the time of listing.
#[derive(Clone, Debug, PartialEq, Eq, Getters)]
pub struct MailboxDescriptor {
    path: String,
    delimiter: char,
    flags: BTreeSet<String>,
    #[getter(skip)]
    special_use: Option<String>,
}

impl MailboxDescriptor {
    pub fn new(
        path: impl Into<String>,
        delimiter: char,
        flags: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let flags: BTreeSet<String> = flags.into_iter().map(Into::into).collect();
        let special_use = flags
            .iter()
            .find(|flag| {
                SPECIAL_USE_ATTRIBUTES
                    .iter()
                    .any(|attribute| attribute.eq_ignore_ascii_case(flag))
            })
            .cloned();
        Self {
            path: path.into(),
            delimiter,
            flags,
            special_use,
        }
    }

    /// Builds a descriptor from the raw wire name, which is modified UTF-7.
    /// Flat hierarchies (`NIL` delimiter) fall back to `/`.
    pub fn from_listing(
        name: &str,
        delimiter: Option<&str>,
        flags: impl IntoIterator<Item = String>,
    ) -> Self {
        let delimiter = delimiter
            .and_then(|delimiter| delimiter.chars().next())
            .unwrap_or(DEFAULT_DELIMITER);
        Self::new(decode_utf7_imap(name.to_string()), delimiter, flags)
    }

    pub fn special_use(&self) -> Option<&str> {
        self.special_use.as_deref()
    }

    pub fn is_sent(&self) -> bool {
        self.special_use()
            .is_some_and(|special_use| special_use.eq_ignore_ascii_case(SENT_ATTRIBUTE))
            || self
                .flags
                .iter()
                .any(|flag| flag.eq_ignore_ascii_case(SENT_ATTRIBUTE))
    }

    pub fn matches_path(&self, path: &str) -> bool {
        self.path.to_lowercase() == path.to_lowercase()
    }
}

/// Renders a string as an IMAP quoted string.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Mailbox name as it has to appear in a command.
pub fn wire_name(path: &str) -> String {
    quote(&encode_utf7_imap(path.to_string()))
}
