use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl Mail {
    pub fn new(recipient: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, mail: &Mail) -> anyhow::Result<()>;
}

/// Sends `mail` in the background. The caller's outcome never depends on it.
pub fn dispatch(notifier: &Arc<dyn Notifier>, mail: Mail) {
    if mail.recipient.is_empty() {
        return;
    }

    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(err) = notifier.send(&mail).await {
            warn!(recipient = %mail.recipient, subject = %mail.subject, error = %err, "email sending failed");
        }
    });
}

/// Used when no mail relay is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, mail: &Mail) -> anyhow::Result<()> {
        info!(recipient = %mail.recipient, subject = %mail.subject, "{}", mail.body);
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Posts mail as JSON to an HTTP mail relay.
pub struct HttpMailer {
    http_client: reqwest::Client,
    config: MailConfig,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    async fn send(&self, mail: &Mail) -> anyhow::Result<()> {
        let mut request = self.http_client
            .post(&self.config.api_url)
            .json(&RelayRequest {
                from: &self.config.sender,
                to: &mail.recipient,
                subject: &mail.subject,
                text: &mail.body,
            });
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        request.send().await?.error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use tokio::sync::mpsc;

    use super::*;

    /// Forwards every mail to a channel so tests can await delivery.
    pub struct ChannelNotifier(pub mpsc::UnboundedSender<Mail>);

    #[async_trait]
    impl Notifier for ChannelNotifier {
        async fn send(&self, mail: &Mail) -> anyhow::Result<()> {
            self.0.send(mail.clone())?;
            Ok(())
        }
    }

    /// Reports every attempted mail to a channel, then fails the send.
    pub struct FailingNotifier(pub mpsc::UnboundedSender<Mail>);

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, mail: &Mail) -> anyhow::Result<()> {
            let _ = self.0.send(mail.clone());
            anyhow::bail!("relay unreachable")
        }
    }

    pub fn channel() -> (Arc<dyn Notifier>, mpsc::UnboundedReceiver<Mail>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelNotifier(tx)), rx)
    }

    pub fn failing() -> (Arc<dyn Notifier>, mpsc::UnboundedReceiver<Mail>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(FailingNotifier(tx)), rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_delivers_in_background() {
        let (notifier, mut rx) = testing::channel();
        dispatch(&notifier, Mail::new("p@example.com", "Hi", "Body"));

        let mail = rx.recv().await.unwrap();
        assert_eq!(mail.recipient, "p@example.com");
        assert_eq!(mail.subject, "Hi");
    }

    #[tokio::test]
    async fn dispatch_skips_empty_recipient() {
        let (notifier, mut rx) = testing::channel();
        dispatch(&notifier, Mail::new("", "Hi", "Body"));
        drop(notifier);

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let (notifier, mut attempts) = testing::failing();
        dispatch(&notifier, Mail::new("p@example.com", "Hi", "Body"));
        drop(notifier);

        let attempted = attempts.recv().await.unwrap();
        assert_eq!(attempted.recipient, "p@example.com");
        // The background task ends after the failed send and releases the notifier.
        assert!(attempts.recv().await.is_none());
    }
}
