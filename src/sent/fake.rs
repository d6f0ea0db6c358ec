//! In-memory stand-in for an IMAP account, shared between the opener and the
//! sessions it hands out so tests can inspect what happened.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, MutexGuard},
};

use enumflags2::BitFlags;

use crate::{
    imap::{Capabilities, Flag, ImapError, MailboxDescriptor, ResponseCode},
    sent::{MailboxProber, SessionOpener},
};

#[derive(Default)]
struct State {
    folders: Vec<MailboxDescriptor>,
    no_special_use: bool,
    messages: BTreeMap<String, Vec<Vec<u8>>>,
    refused_creates: BTreeSet<String>,
    refused_locks: BTreeSet<String>,
    trycreate_appends: usize,
    quota_exceeded: bool,
    failing_searches: bool,
    refuse_login: bool,
    calls: Vec<String>,
    opened: usize,
    closed: usize,
}

#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<State>>,
}

impl FakeServer {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake server state should not be poisoned")
    }

    pub fn set_folders(&self, folders: Vec<MailboxDescriptor>) {
        self.state().folders = folders;
    }

    pub fn set_special_use(&self, supported: bool) {
        self.state().no_special_use = !supported;
    }

    pub fn refuse_create(&self, path: &str) {
        self.state().refused_creates.insert(path.to_string());
    }

    pub fn refuse_lock(&self, path: &str) {
        self.state().refused_locks.insert(path.to_string());
    }

    /// The next `count` appends fail with a TRYCREATE hint.
    pub fn fail_appends_with_trycreate(&self, count: usize) {
        self.state().trycreate_appends = count;
    }

    pub fn fail_appends_with_quota(&self) {
        self.state().quota_exceeded = true;
    }

    pub fn fail_searches(&self) {
        self.state().failing_searches = true;
    }

    pub fn refuse_login(&self) {
        self.state().refuse_login = true;
    }

    pub fn calls_of(&self, command: &str) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.split(' ').next() == Some(command))
            .cloned()
            .collect()
    }

    pub fn count(&self, command: &str) -> usize {
        self.calls_of(command).len()
    }

    pub fn opened(&self) -> usize {
        self.state().opened
    }

    pub fn closed(&self) -> usize {
        self.state().closed
    }

    pub fn messages(&self, path: &str) -> Vec<Vec<u8>> {
        self.state().messages.get(path).cloned().unwrap_or_default()
    }
}

fn no(command: &str, code: Option<ResponseCode>, information: &str) -> ImapError {
    ImapError::No {
        command: command.to_string(),
        code,
        information: information.to_string(),
    }
}

fn subject_of(message: &[u8]) -> Option<String> {
    String::from_utf8_lossy(message)
        .lines()
        .find_map(|line| line.strip_prefix("Subject: ").map(ToString::to_string))
}

pub struct FakeSession {
    server: FakeServer,
    locked: Option<String>,
}

impl FakeSession {
    fn record(&self, call: String) {
        self.server.state().calls.push(call);
    }
}

impl MailboxProber for FakeSession {
    async fn capabilities(&mut self) -> Result<Capabilities, ImapError> {
        self.record("CAPABILITY".to_string());
        let names: &[&str] = if self.server.state().no_special_use {
            &["IMAP4rev1"]
        } else {
            &["IMAP4rev1", "SPECIAL-USE", "CREATE-SPECIAL-USE"]
        };
        Ok(Capabilities::from_names(names.iter().copied()))
    }

    async fn list_folders(&mut self) -> Result<Vec<MailboxDescriptor>, ImapError> {
        self.record("LIST".to_string());
        Ok(self.server.state().folders.clone())
    }

    async fn list_special_use(&mut self) -> Result<Vec<MailboxDescriptor>, ImapError> {
        self.record("LIST-SPECIAL-USE".to_string());
        let state = self.server.state();
        if state.no_special_use {
            Ok(state
                .folders
                .iter()
                .map(|folder| {
                    MailboxDescriptor::new(folder.path().clone(), folder.delimiter(), Vec::<String>::new())
                })
                .collect())
        } else {
            Ok(state.folders.clone())
        }
    }

    async fn create_folder(&mut self, path: &str, _special_use: Option<&str>) -> Result<(), ImapError> {
        self.record(format!("CREATE {path}"));
        let mut state = self.server.state();
        if state.refused_creates.contains(path) {
            return Err(no("CREATE", None, "Permission denied"));
        }
        if !state.folders.iter().any(|folder| folder.matches_path(path)) {
            state
                .folders
                .push(MailboxDescriptor::new(path, '/', [r"\Sent"]));
        }
        Ok(())
    }

    async fn lock(&mut self, path: &str) -> Result<(), ImapError> {
        self.record(format!("LOCK {path}"));
        self.locked = None;
        let state = self.server.state();
        let exists = path == "INBOX" || state.folders.iter().any(|folder| folder.matches_path(path));
        if state.refused_locks.contains(path) || !exists {
            return Err(no("SELECT", None, "Mailbox doesn't exist"));
        }
        drop(state);
        self.locked = Some(path.to_string());
        Ok(())
    }

    async fn unlock(&mut self) -> Result<(), ImapError> {
        if let Some(path) = self.locked.take() {
            self.record(format!("UNLOCK {path}"));
        }
        Ok(())
    }

    async fn append_message(
        &mut self,
        path: &str,
        _flags: BitFlags<Flag>,
        message: &[u8],
    ) -> Result<(), ImapError> {
        self.record(format!("APPEND {path}"));
        let mut state = self.server.state();
        if state.trycreate_appends > 0 {
            state.trycreate_appends -= 1;
            return Err(no(
                "APPEND",
                Some(ResponseCode::TryCreate),
                "Mailbox doesn't exist",
            ));
        }
        if state.quota_exceeded {
            return Err(no("APPEND", None, "Quota exceeded"));
        }
        state
            .messages
            .entry(path.to_string())
            .or_default()
            .push(message.to_vec());
        Ok(())
    }

    async fn search_header(&mut self, header: &str, value: &str) -> Result<Vec<u32>, ImapError> {
        self.record(format!("SEARCH {header} {value}"));
        let state = self.server.state();
        if state.failing_searches {
            return Err(no("UID", None, "Search failed"));
        }
        let Some(locked) = &self.locked else {
            return Err(ImapError::Bad {
                command: "UID".to_string(),
                information: "No mailbox selected".to_string(),
            });
        };
        Ok(state
            .messages
            .get(locked)
            .into_iter()
            .flatten()
            .zip(1..)
            .filter(|(message, _)| subject_of(message).as_deref() == Some(value))
            .map(|(_, uid)| uid)
            .collect())
    }

    async fn delete_messages(&mut self, uids: &[u32]) -> Result<(), ImapError> {
        self.record(format!("DELETE {uids:?}"));
        let Some(locked) = self.locked.clone() else {
            return Ok(());
        };
        let mut state = self.server.state();
        if let Some(messages) = state.messages.get_mut(&locked) {
            let mut uid = 0;
            messages.retain(|_| {
                uid += 1;
                !uids.contains(&uid)
            });
        }
        Ok(())
    }

    async fn close(mut self) {
        let _ = self.unlock().await;
        self.server.state().closed += 1;
    }
}

pub struct FakeOpener {
    server: FakeServer,
}

impl FakeOpener {
    pub fn new(server: FakeServer) -> Self {
        Self { server }
    }
}

impl SessionOpener for FakeOpener {
    type Session = FakeSession;

    async fn open(&self) -> Result<FakeSession, ImapError> {
        let mut state = self.server.state();
        state.opened += 1;
        if state.refuse_login {
            return Err(ImapError::LoginRejected);
        }
        Ok(FakeSession {
            server: self.server.clone(),
            locked: None,
        })
    }
}
