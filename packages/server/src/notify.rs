use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailTemplate {
    Confirm,
    Reset,
}

/// A transactional email, rendered by whatever delivers it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Email {
    pub username: String,
    pub recipient: String,
    pub link: String,
    pub template: EmailTemplate,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail relay request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail relay rejected the message with status {0}")]
    Rejected(u16),
}

/// Delivery backend for account emails.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), NotifyError>;
}

/// Writes emails to the log instead of delivering them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        info!(
            username = %email.username,
            recipient = %email.recipient,
            template = ?email.template,
            link = %email.link,
            "Email not delivered (no mail relay configured)"
        );
        Ok(())
    }
}

/// Posts each email as JSON to an HTTP mail relay.
pub struct RelayNotifier {
    url: String,
    http: reqwest::Client,
}

impl RelayNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for RelayNotifier {
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        let resp = self.http.post(&self.url).json(email).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            warn!(status = %status, recipient = %email.recipient, "Mail relay returned non-success");
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// Keeps every email in memory so tests can follow the links.
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Email>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Link of the latest email of `template` sent to `recipient`.
    pub fn last_link(&self, recipient: &str, template: EmailTemplate) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|e| e.recipient == recipient && e.template == template)
            .map(|e| e.link)
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }
}
