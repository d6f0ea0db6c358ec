use std::{sync::Arc, time::Duration};

use anyhow::Result;
use log::{info, warn};

use crate::{
    config::Config,
    http,
    imap::ImapConnector,
    relay::Relay,
    sent::{SentCopyAppender, resolve_sent_folder},
    smtp::SmtpRelay,
};

const SMTP_TIMEOUT: Duration = Duration::from_secs(60);

pub async fn serve(config: &Config) -> Result<()> {
    let smtp = config.smtp();
    let transport = SmtpRelay::new(
        smtp.host(),
        smtp.port(),
        smtp.secure(),
        smtp.credentials(),
        SMTP_TIMEOUT,
    )?;
    transport.verify().await;

    let appender = sent_copy_appender(config).await;
    let relay = Relay::new(
        transport,
        appender,
        smtp.from().clone(),
        config.save_sent_copy(),
        config.imap().timeout(),
    )?;

    let relay = Arc::new(relay);
    http::serve(*config.listen_addr(), http::router(Arc::clone(&relay))).await?;
    relay.shutdown().await;
    info!("relay stopped");
    Ok(())
}

async fn sent_copy_appender(config: &Config) -> SentCopyAppender<ImapConnector> {
    let enabled = config.save_sent_copy();
    let connector = config.imap_connector();
    if !enabled {
        return SentCopyAppender::new(connector, false, config.imap().mailbox_or_default());
    }
    let Some(connector) = connector else {
        warn!("saving Sent copies is enabled but IMAP host or credentials are missing");
        return SentCopyAppender::new(None, true, config.imap().mailbox_or_default());
    };

    let mut appender =
        SentCopyAppender::new(Some(connector.clone()), true, config.imap().mailbox_or_default());
    if config.imap().mailbox().is_none() {
        let timeout = config.imap().timeout();
        match tokio::time::timeout(timeout, resolve_sent_folder(&connector)).await {
            Ok(Ok(resolution)) => appender.set_mailbox(resolution.sent_path().clone()),
            Ok(Err(error)) => warn!("keeping {} for Sent copies: {error}", appender.mailbox()),
            Err(_) => warn!(
                "Sent folder discovery timed out after {timeout:?}, keeping {}",
                appender.mailbox()
            ),
        }
    }
    if appender.is_active() {
        info!("saving Sent copies to {}", appender.mailbox());
    }
    appender
}
