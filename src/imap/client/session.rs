use std::fmt::Write as _;

use enumflags2::BitFlags;
use log::{debug, trace, warn};

use crate::imap::{
    Flag, ImapError, MailboxDescriptor,
    client::{
        capability::{Capabilities, Capability},
        not_authenticated::update_capabilities,
    },
    connection::{Connection, ResponseData},
    mailbox::{quote, wire_name},
};

const LIST_ALL: &str = r#"LIST "" "*""#;
const LIST_SPECIAL_USE: &str = r#"LIST "" "*" RETURN (SPECIAL-USE)"#;

/// An authenticated IMAP session. At most one mailbox is selected at a time.
pub struct Session {
    connection: Connection,
    capabilities: Capabilities,
    selected: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("capabilities", &self.capabilities)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(super) fn new(connection: Connection, capabilities: Capabilities) -> Self {
        Self {
            connection,
            capabilities,
            selected: None,
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub async fn capabilities(&mut self) -> Result<Capabilities, ImapError> {
        if !self.capabilities.is_known() {
            debug!("CAPABILITY");
            let responses = self.connection.execute("CAPABILITY").await?;
            update_capabilities(&mut self.capabilities, &responses);
        }
        Ok(self.capabilities)
    }

    pub async fn list(&mut self) -> Result<Vec<MailboxDescriptor>, ImapError> {
        self.list_with(LIST_ALL).await
    }

    /// Lists every mailbox and asks for RFC 6154 attributes when the server
    /// supports them. Servers without SPECIAL-USE still get a plain LIST, as
    /// some of them report `\Sent` there anyway.
    pub async fn list_special_use(&mut self) -> Result<Vec<MailboxDescriptor>, ImapError> {
        let command = if self.capabilities().await?.contains(Capability::SpecialUse) {
            LIST_SPECIAL_USE
        } else {
            LIST_ALL
        };
        self.list_with(command).await
    }

    async fn list_with(&mut self, command: &str) -> Result<Vec<MailboxDescriptor>, ImapError> {
        debug!("{command}");
        let responses = self.connection.execute(command).await?;
        let mailboxes: Vec<MailboxDescriptor> = responses
            .into_iter()
            .filter_map(|response| match response {
                ResponseData::List(mailbox) => Some(mailbox),
                _ => None,
            })
            .collect();
        trace!("listed {} mailboxes", mailboxes.len());
        Ok(mailboxes)
    }

    /// Creates a mailbox, tagging it with a special-use attribute when one is
    /// given and the server supports CREATE-SPECIAL-USE.
    pub async fn create(
        &mut self,
        path: &str,
        special_use: Option<&str>,
    ) -> Result<(), ImapError> {
        let mut command = format!("CREATE {}", wire_name(path));
        if let Some(special_use) = special_use {
            if self
                .capabilities()
                .await?
                .contains(Capability::CreateSpecialUse)
            {
                write!(command, " (USE ({special_use}))")
                    .expect("writing to command buffer should succeed");
            } else {
                trace!("server cannot tag new mailboxes, creating {path} without {special_use}");
            }
        }
        debug!("{command}");
        self.connection.execute(&command).await?;
        Ok(())
    }

    pub async fn select(&mut self, path: &str) -> Result<(), ImapError> {
        let command = format!("SELECT {}", wire_name(path));
        debug!("{command}");
        // a failed SELECT leaves the session without a selected mailbox
        self.selected = None;
        self.connection.execute(&command).await?;
        self.selected = Some(path.to_string());
        Ok(())
    }

    /// Leaves the selected mailbox without expunging it. Servers lacking
    /// UNSELECT keep the mailbox selected until logout.
    pub async fn unselect(&mut self) -> Result<(), ImapError> {
        let Some(mailbox) = self.selected.take() else {
            return Ok(());
        };
        if self.capabilities().await?.contains(Capability::Unselect) {
            debug!("UNSELECT");
            self.connection.execute("UNSELECT").await?;
        } else {
            trace!("server lacks UNSELECT, leaving {mailbox} selected");
        }
        Ok(())
    }

    pub async fn append(
        &mut self,
        path: &str,
        flags: BitFlags<Flag>,
        internal_date: &str,
        message: &[u8],
    ) -> Result<(), ImapError> {
        let command = format!(
            "APPEND {} {} {} {{{}}}",
            wire_name(path),
            Flag::list(flags),
            quote(internal_date),
            message.len()
        );
        debug!("{command}");
        self.connection
            .execute_with_literal(&command, message)
            .await?;
        Ok(())
    }

    /// UIDs of messages in the selected mailbox whose header contains `value`.
    pub async fn search_header(&mut self, header: &str, value: &str) -> Result<Vec<u32>, ImapError> {
        let command = format!("UID SEARCH HEADER {} {}", quote(header), quote(value));
        debug!("{command}");
        let responses = self.connection.execute(&command).await?;
        Ok(responses
            .into_iter()
            .filter_map(|response| match response {
                ResponseData::Search(uids) => Some(uids),
                _ => None,
            })
            .flatten()
            .collect())
    }

    /// Flags the given messages as deleted and expunges exactly those when the
    /// server supports UIDPLUS.
    pub async fn delete(&mut self, uids: &[u32]) -> Result<(), ImapError> {
        if uids.is_empty() {
            return Ok(());
        }
        let uid_set = uids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let command = format!("UID STORE {uid_set} +FLAGS.SILENT ({})", Flag::Deleted);
        debug!("{command}");
        self.connection.execute(&command).await?;

        // a plain EXPUNGE would also remove messages the user marked deleted
        if self.capabilities().await?.contains(Capability::UidPlus) {
            let command = format!("UID EXPUNGE {uid_set}");
            debug!("{command}");
            self.connection.execute(&command).await?;
        } else {
            warn!("server lacks UIDPLUS, leaving UIDs {uid_set} flagged as deleted");
        }
        Ok(())
    }

    pub async fn logout(mut self) -> Result<(), ImapError> {
        debug!("LOGOUT");
        self.connection.execute("LOGOUT").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use rstest::*;
    use tokio::io::{AsyncBufReadExt as _, AsyncReadExt as _, AsyncWriteExt as _, BufReader};

    use super::*;
    use crate::imap::Client;

    /// One command the scripted server expects, and what it answers.
    struct Exchange {
        command: &'static str,
        literal: Option<usize>,
        untagged: &'static [&'static str],
        completion: &'static str,
    }

    fn exchange(
        command: &'static str,
        untagged: &'static [&'static str],
        completion: &'static str,
    ) -> Exchange {
        Exchange {
            command,
            literal: None,
            untagged,
            completion,
        }
    }

    /// Plays a fixed script on the server end of an in-memory stream and
    /// returns everything the client sent.
    fn scripted_server(
        greeting: &'static str,
        script: Vec<Exchange>,
    ) -> (
        tokio::io::DuplexStream,
        tokio::task::JoinHandle<Vec<String>>,
    ) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let handle = tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut read = BufReader::new(read);
            let mut received = Vec::new();
            write.write_all(greeting.as_bytes()).await.unwrap();
            for step in script {
                let mut line = String::new();
                read.read_line(&mut line).await.unwrap();
                let line = line.trim_end().to_string();
                let (tag, command) = line.split_once(' ').unwrap();
                assert_eq!(step.command, command);
                if let Some(length) = step.literal {
                    write.write_all(b"+ Ready for literal data\r\n").await.unwrap();
                    let mut literal = vec![0; length + 2];
                    read.read_exact(&mut literal).await.unwrap();
                    received.push(String::from_utf8(literal).unwrap());
                }
                for untagged in step.untagged {
                    write.write_all(untagged.as_bytes()).await.unwrap();
                    write.write_all(b"\r\n").await.unwrap();
                }
                write
                    .write_all(format!("{tag} {}\r\n", step.completion).as_bytes())
                    .await
                    .unwrap();
                received.push(line);
            }
            received
        });
        (client, handle)
    }

    const GREETING: &str = "* OK [CAPABILITY IMAP4rev1 SPECIAL-USE UNSELECT] ready\r\n";

    async fn logged_in(stream: tokio::io::DuplexStream) -> Session {
        let client = assert_ok!(Client::from_transport(Box::new(stream)).await);
        assert_ok!(client.login("user", "pa\"ss").await)
    }

    #[tokio::test]
    async fn test_login_quotes_credentials_and_lists_special_use() {
        let (stream, server) = scripted_server(
            GREETING,
            vec![
                exchange(
                    r#"LOGIN "user" "pa\"ss""#,
                    &["* CAPABILITY IMAP4rev1 SPECIAL-USE"],
                    "OK logged in",
                ),
                exchange(
                    LIST_SPECIAL_USE,
                    &[
                        r#"* LIST (\HasNoChildren) "/" INBOX"#,
                        r#"* LIST (\HasNoChildren \Sent) "/" "Sent Items""#,
                    ],
                    "OK done",
                ),
                exchange("LOGOUT", &["* BYE logging out"], "OK bye"),
            ],
        );

        let mut session = logged_in(stream).await;
        let mailboxes = assert_ok!(session.list_special_use().await);
        assert_ok!(session.logout().await);
        assert_ok!(server.await);

        assert_eq!(2, mailboxes.len());
        assert!(mailboxes[1].is_sent());
        assert_eq!("Sent Items", mailboxes[1].path());
    }

    #[tokio::test]
    async fn test_rejected_login() {
        let (stream, server) = scripted_server(
            GREETING,
            vec![exchange(
                r#"LOGIN "user" "pa\"ss""#,
                &[],
                "NO [AUTHENTICATIONFAILED] invalid credentials",
            )],
        );

        let client = assert_ok!(Client::from_transport(Box::new(stream)).await);
        let result = client.login("user", "pa\"ss").await;
        assert!(matches!(result, Err(ImapError::LoginRejected)));
        assert_ok!(server.await);
    }

    #[tokio::test]
    async fn test_append_sends_literal_after_continuation() {
        let message = b"Subject: hi\r\n\r\nbody";
        let (stream, server) = scripted_server(
            GREETING,
            vec![
                exchange(r#"LOGIN "user" "pa\"ss""#, &[], "OK logged in"),
                Exchange {
                    command: r#"APPEND "Sent" (\Seen) "19-Oct-2026 10:00:00 +0000" {19}"#,
                    literal: Some(message.len()),
                    untagged: &[],
                    completion: "OK [APPENDUID 1 7] done",
                },
            ],
        );

        let mut session = logged_in(stream).await;
        assert_ok!(
            session
                .append("Sent", Flag::Seen.into(), "19-Oct-2026 10:00:00 +0000", message)
                .await
        );
        let received = assert_ok!(server.await);

        assert_eq!("Subject: hi\r\n\r\nbody\r\n", received[1]);
    }

    #[tokio::test]
    async fn test_append_without_mailbox_reports_trycreate() {
        let (stream, server) = scripted_server(
            GREETING,
            vec![
                exchange(r#"LOGIN "user" "pa\"ss""#, &[], "OK logged in"),
                exchange(
                    r#"APPEND "Sent" (\Seen \Deleted) "19-Oct-2026 10:00:00 +0000" {4}"#,
                    &[],
                    "NO [TRYCREATE] Mailbox doesn't exist",
                ),
            ],
        );

        let mut session = logged_in(stream).await;
        let error = assert_err!(
            session
                .append(
                    "Sent",
                    Flag::Seen | Flag::Deleted,
                    "19-Oct-2026 10:00:00 +0000",
                    b"test"
                )
                .await
        );
        assert_ok!(server.await);

        assert!(error.is_try_create());
    }

    #[tokio::test]
    async fn test_select_search_delete_and_unselect() {
        let (stream, server) = scripted_server(
            GREETING,
            vec![
                exchange(r#"LOGIN "user" "pa\"ss""#, &[], "OK logged in"),
                exchange(
                    r#"CAPABILITY"#,
                    &["* CAPABILITY IMAP4rev1 UNSELECT UIDPLUS"],
                    "OK",
                ),
                exchange(
                    r#"SELECT "Sent""#,
                    &["* 3 EXISTS", "* FLAGS (\\Seen \\Deleted)"],
                    "OK [READ-WRITE] selected",
                ),
                exchange(
                    r#"UID SEARCH HEADER "Subject" "probe-1234""#,
                    &["* SEARCH 5 9"],
                    "OK searched",
                ),
                exchange(r"UID STORE 5,9 +FLAGS.SILENT (\Deleted)", &[], "OK stored"),
                exchange("UID EXPUNGE 5,9", &["* 2 EXPUNGE", "* 2 EXPUNGE"], "OK expunged"),
                exchange("UNSELECT", &[], "OK unselected"),
            ],
        );

        let mut session = logged_in(stream).await;
        assert_ok!(session.capabilities().await);
        assert_ok!(session.select("Sent").await);
        assert_eq!(Some("Sent"), session.selected());
        let uids = assert_ok!(session.search_header("Subject", "probe-1234").await);
        assert_eq!(vec![5, 9], uids);
        assert_ok!(session.delete(&uids).await);
        assert_ok!(session.unselect().await);
        assert_eq!(None, session.selected());
        assert_ok!(server.await);
    }

    #[tokio::test]
    async fn test_delete_without_uidplus_leaves_other_messages_alone() {
        let (stream, server) = scripted_server(
            GREETING,
            vec![
                exchange(
                    r#"LOGIN "user" "pa\"ss""#,
                    &[],
                    "OK [CAPABILITY IMAP4rev1 UNSELECT] logged in",
                ),
                exchange(r#"SELECT "Sent""#, &["* 4 EXISTS"], "OK [READ-WRITE] selected"),
                exchange(r"UID STORE 9 +FLAGS.SILENT (\Deleted)", &[], "OK stored"),
                exchange("UNSELECT", &[], "OK unselected"),
                exchange("LOGOUT", &["* BYE logging out"], "OK bye"),
            ],
        );

        let mut session = logged_in(stream).await;
        assert_ok!(session.select("Sent").await);
        assert_ok!(session.delete(&[9]).await);
        assert_ok!(session.unselect().await);
        assert_ok!(session.logout().await);
        let received = assert_ok!(server.await);

        assert!(!received.iter().any(|line| line.contains("EXPUNGE")));
    }

    #[tokio::test]
    async fn test_capabilities_from_login_completion_are_used() {
        let (stream, server) = scripted_server(
            GREETING,
            vec![
                exchange(
                    r#"LOGIN "user" "pa\"ss""#,
                    &[],
                    "OK [CAPABILITY IMAP4rev1 SPECIAL-USE UIDPLUS] logged in",
                ),
                exchange(LIST_SPECIAL_USE, &[r#"* LIST (\Sent) "/" Sent"#], "OK done"),
            ],
        );

        let mut session = logged_in(stream).await;
        let capabilities = assert_ok!(session.capabilities().await);
        assert!(capabilities.contains(Capability::UidPlus));
        let mailboxes = assert_ok!(session.list_special_use().await);
        assert_ok!(server.await);

        assert_eq!(1, mailboxes.len());
    }

    #[tokio::test]
    async fn test_create_with_special_use_when_supported() {
        let (stream, server) = scripted_server(
            GREETING,
            vec![
                exchange(
                    r#"LOGIN "user" "pa\"ss""#,
                    &["* CAPABILITY IMAP4rev1 CREATE-SPECIAL-USE"],
                    "OK logged in",
                ),
                exchange(r#"CREATE "INBOX.Sent" (USE (\Sent))"#, &[], "OK created"),
                exchange(r#"CREATE "Envoy&AOk-s""#, &[], "OK created"),
            ],
        );

        let mut session = logged_in(stream).await;
        assert_ok!(session.create("INBOX.Sent", Some(r"\Sent")).await);
        assert_ok!(session.create("Envoyés", None).await);
        assert_ok!(server.await);
    }
}
