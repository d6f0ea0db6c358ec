use std::fmt::{self, Display};

use derive_getters::Getters;
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::{
    imap::{Flag, ImapError, MailboxDescriptor, SENT_ATTRIBUTE},
    message::{SendParams, compose, token},
    sent::{MailboxProber, SessionOpener},
};

const DEFAULT_DELIMITER: char = '/';

/// Localized names servers commonly give their Sent folder.
const SENT_NAMES: [&str; 10] = [
    "Sent",
    "Sent Items",
    "Sent Messages",
    "Sent Mail",
    "Enviados",
    "Elementos enviados",
    "Gesendet",
    "Gesendete Objekte",
    "Envoyés",
    "Éléments envoyés",
];

const PROBE_ADDRESS: &str = "mailrelay-probe@localhost";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    sent_path: String,
    delimiter: char,
    created: bool,
}

#[derive(Debug)]
pub struct CreationFailure {
    path: String,
    error: ImapError,
}

impl Display for CreationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.error)
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("could not open IMAP session: {0}")]
    Open(#[source] ImapError),
    #[error("could not list mailboxes: {0}")]
    List(#[source] ImapError),
    #[error("no Sent mailbox found and none could be created ({})", describe(.0))]
    Creation(Vec<CreationFailure>),
    #[error("probe append to {path} failed: {source}")]
    Probe { path: String, source: ImapError },
}

fn describe(failures: &[CreationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Finds the account's Sent folder, creating one if needed, and checks that
/// it accepts messages. The session is closed on every path.
pub async fn resolve_sent_folder<O: SessionOpener>(
    opener: &O,
) -> Result<ResolutionResult, ResolveError> {
    let mut session = opener.open().await.map_err(ResolveError::Open)?;
    let result = discover(&mut session).await;
    session.close().await;
    match &result {
        Ok(resolution) => info!(
            "resolved Sent folder to {} (created: {})",
            resolution.sent_path, resolution.created
        ),
        Err(error) => warn!("Sent folder discovery failed: {error}"),
    }
    result
}

async fn discover<P: MailboxProber>(prober: &mut P) -> Result<ResolutionResult, ResolveError> {
    warm_up(prober).await;

    let mut discovery = Discovery::default();
    for strategy in STRATEGIES {
        if let Some(mut resolution) = strategy.attempt(prober, &mut discovery).await? {
            debug!("{strategy:?} picked {}", resolution.sent_path);
            if validate(prober, &resolution.sent_path).await? {
                resolution.created = true;
            }
            return Ok(resolution);
        }
    }
    Err(ResolveError::Creation(discovery.creation_failures))
}

/// Touches INBOX so authentication and capability negotiation are done
/// before anything depends on them. Restrictive servers may refuse.
async fn warm_up<P: MailboxProber>(prober: &mut P) {
    if let Err(error) = prober.capabilities().await {
        warn!("could not query IMAP capabilities: {error}");
    }
    match prober.lock("INBOX").await {
        Ok(()) => {
            if let Err(error) = prober.unlock().await {
                warn!("could not release INBOX: {error}");
            }
        }
        Err(error) => warn!("could not open INBOX: {error}"),
    }
}

#[derive(Default)]
struct Discovery {
    delimiter: Option<char>,
    creation_failures: Vec<CreationFailure>,
}

impl Discovery {
    fn delimiter(&self) -> char {
        self.delimiter.unwrap_or(DEFAULT_DELIMITER)
    }
}

#[derive(Clone, Copy, Debug)]
enum Strategy {
    SpecialUse,
    NameMatch,
    Create,
}

/// Tried in order, the first one to find a folder wins.
const STRATEGIES: [Strategy; 3] = [Strategy::SpecialUse, Strategy::NameMatch, Strategy::Create];

impl Strategy {
    async fn attempt<P: MailboxProber>(
        self,
        prober: &mut P,
        discovery: &mut Discovery,
    ) -> Result<Option<ResolutionResult>, ResolveError> {
        match self {
            Strategy::SpecialUse => Ok(by_special_use(prober).await),
            Strategy::NameMatch => by_name(prober, discovery).await,
            Strategy::Create => Ok(by_creation(prober, discovery).await),
        }
    }
}

async fn by_special_use<P: MailboxProber>(prober: &mut P) -> Option<ResolutionResult> {
    let folders = match prober.list_special_use().await {
        Ok(folders) => folders,
        Err(error) => {
            warn!("listing special-use mailboxes failed: {error}");
            return None;
        }
    };
    let mut sent = folders.iter().filter(|folder| folder.is_sent());
    match (sent.next(), sent.next()) {
        (Some(folder), None) => Some(ResolutionResult {
            sent_path: folder.path().clone(),
            delimiter: folder.delimiter(),
            created: false,
        }),
        (Some(_), Some(_)) => {
            debug!("server marks several mailboxes as Sent, ignoring special-use");
            None
        }
        (None, _) => None,
    }
}

async fn by_name<P: MailboxProber>(
    prober: &mut P,
    discovery: &mut Discovery,
) -> Result<Option<ResolutionResult>, ResolveError> {
    let folders = prober.list_folders().await.map_err(ResolveError::List)?;
    let delimiter = detect_delimiter(folders.iter().map(|folder| folder.path().as_str()));
    discovery.delimiter = Some(delimiter);

    Ok(name_candidates(delimiter)
        .iter()
        .find_map(|candidate| folders.iter().find(|folder| folder.matches_path(candidate)))
        .map(|folder| ResolutionResult {
            sent_path: folder.path().clone(),
            delimiter,
            created: false,
        }))
}

async fn by_creation<P: MailboxProber>(
    prober: &mut P,
    discovery: &mut Discovery,
) -> Option<ResolutionResult> {
    let delimiter = discovery.delimiter();
    for path in creation_candidates(delimiter) {
        match prober.create_folder(&path, Some(SENT_ATTRIBUTE)).await {
            Ok(()) => {
                info!("created mailbox {path}");
                let sent_path = relisted(prober, &path).await.unwrap_or(path);
                return Some(ResolutionResult {
                    sent_path,
                    delimiter,
                    created: true,
                });
            }
            Err(error) => {
                debug!("creating {path} failed: {error}");
                discovery
                    .creation_failures
                    .push(CreationFailure { path, error });
            }
        }
    }
    None
}

/// Path of the freshly created mailbox as the server now lists it.
async fn relisted<P: MailboxProber>(prober: &mut P, path: &str) -> Option<String> {
    match prober.list_folders().await {
        Ok(folders) => folders
            .into_iter()
            .find(|folder| folder.matches_path(path))
            .map(|folder| folder.path().clone()),
        Err(error) => {
            warn!("listing mailboxes after creating {path} failed: {error}");
            None
        }
    }
}

/// Appends a throwaway message to prove `path` is writable, then tries to
/// remove it again. Returns whether the mailbox had to be created first.
async fn validate<P: MailboxProber>(prober: &mut P, path: &str) -> Result<bool, ResolveError> {
    let subject = format!("mailrelay probe {}", token(16));
    let probe = compose(&SendParams::new(
        PROBE_ADDRESS,
        vec![PROBE_ADDRESS.to_string()],
        &subject,
    ));
    let flags = Flag::Seen | Flag::Deleted;
    let probe_error = |source| ResolveError::Probe {
        path: path.to_string(),
        source,
    };

    let created = match prober.append_message(path, flags, probe.as_bytes()).await {
        Ok(()) => false,
        Err(error) if error.is_try_create() => {
            info!("{path} does not exist yet, creating it before probing again");
            prober
                .create_folder(path, Some(SENT_ATTRIBUTE))
                .await
                .map_err(probe_error)?;
            prober
                .append_message(path, flags, probe.as_bytes())
                .await
                .map_err(probe_error)?;
            true
        }
        Err(error) => return Err(probe_error(error)),
    };

    remove_probe(prober, path, &subject).await;
    Ok(created)
}

async fn remove_probe<P: MailboxProber>(prober: &mut P, path: &str, subject: &str) {
    let cleanup = async {
        prober.lock(path).await?;
        let uids = prober.search_header("Subject", subject).await?;
        prober.delete_messages(&uids).await?;
        prober.unlock().await
    };
    if let Err(error) = cleanup.await {
        warn!("could not remove probe message from {path}: {error}");
    }
}

/// First hierarchy separator seen in the listed paths.
fn detect_delimiter<'a>(paths: impl IntoIterator<Item = &'a str>) -> char {
    paths
        .into_iter()
        .find_map(|path| path.chars().find(|c| matches!(c, '/' | '.')))
        .unwrap_or(DEFAULT_DELIMITER)
}

fn name_candidates(delimiter: char) -> Vec<String> {
    SENT_NAMES
        .iter()
        .flat_map(|name| [(*name).to_string(), format!("INBOX{delimiter}{name}")])
        .collect()
}

fn creation_candidates(delimiter: char) -> [String; 3] {
    [
        format!("INBOX{delimiter}Sent"),
        format!("INBOX{delimiter}Sent Items"),
        "Sent".to_string(),
    ]
}

#[cfg(test)]
impl ResolutionResult {
    pub fn new(sent_path: impl Into<String>, delimiter: char, created: bool) -> Self {
        Self {
            sent_path: sent_path.into(),
            delimiter,
            created,
        }
    }
}
