use base64::{Engine as _, engine::general_purpose::STANDARD};
use lettre::message::{Mailbox, header::ContentType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::relay::{Attachment, SendRequest};

/// One or many addresses, as clients may send either.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentBody {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    content: String,
    content_type: Option<String>,
}

/// Body of `POST /send` before validation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBody {
    to: Option<Recipients>,
    cc: Option<Recipients>,
    bcc: Option<Recipients>,
    #[serde(default)]
    subject: String,
    text: Option<String>,
    html: Option<String>,
    #[serde(default)]
    attachments: Vec<AttachmentBody>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
#[error("request failed validation on {} field(s)", .0.len())]
pub struct ValidationError(pub Vec<FieldError>);

impl SendBody {
    pub fn validate(self) -> Result<SendRequest, ValidationError> {
        let mut errors = Vec::new();

        let to = addresses("to", self.to, &mut errors);
        if to.is_empty() && !errors.iter().any(|error: &FieldError| error.field.starts_with("to")) {
            errors.push(FieldError::new("to", "at least one recipient is required"));
        }
        let cc = addresses("cc", self.cc, &mut errors);
        let bcc = addresses("bcc", self.bcc, &mut errors);

        if self.subject.trim().is_empty() {
            errors.push(FieldError::new("subject", "subject is required"));
        } else if self.subject.contains(['\r', '\n']) {
            errors.push(FieldError::new("subject", "subject must be a single line"));
        }

        let attachments = self
            .attachments
            .into_iter()
            .enumerate()
            .filter_map(|(index, attachment)| attachment.validate(index, &mut errors))
            .collect();

        if errors.is_empty() {
            Ok(SendRequest {
                to,
                cc,
                bcc,
                subject: self.subject,
                text: self.text,
                html: self.html,
                attachments,
            })
        } else {
            Err(ValidationError(errors))
        }
    }
}

impl AttachmentBody {
    fn validate(self, index: usize, errors: &mut Vec<FieldError>) -> Option<Attachment> {
        let field = |name: &str| format!("attachments[{index}].{name}");
        let before = errors.len();

        if self.filename.trim().is_empty() {
            errors.push(FieldError::new(field("filename"), "filename is required"));
        }
        let content = STANDARD
            .decode(self.content.trim())
            .inspect_err(|_| {
                errors.push(FieldError::new(field("content"), "content must be base64"));
            })
            .ok();
        if let Some(content_type) = &self.content_type
            && ContentType::parse(content_type).is_err()
        {
            errors.push(FieldError::new(
                field("contentType"),
                format!("{content_type} is not a valid content type"),
            ));
        }

        if errors.len() > before {
            return None;
        }
        Some(Attachment {
            filename: self.filename,
            content: content?,
            content_type: self.content_type,
        })
    }
}

fn addresses(
    field: &str,
    recipients: Option<Recipients>,
    errors: &mut Vec<FieldError>,
) -> Vec<String> {
    let (addresses, single) = match recipients {
        None => return Vec::new(),
        Some(Recipients::One(address)) => (vec![address], true),
        Some(Recipients::Many(addresses)) => (addresses, false),
    };
    for (index, address) in addresses.iter().enumerate() {
        if address.parse::<Mailbox>().is_err() {
            let field = if single {
                field.to_string()
            } else {
                format!("{field}[{index}]")
            };
            errors.push(FieldError::new(
                field,
                format!("{address} is not a valid email address"),
            ));
        }
    }
    addresses
}
