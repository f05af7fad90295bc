//! Outbound email notifications.
//!
//! Delivery is fire-and-forget: a failed or debounced send never fails the
//! triggering operation. The [`Notifier`] trait is the seam tests substitute;
//! [`NotificationService`] layers templates, the per-conversation debounce
//! and the match-pair dedupe on top of whatever transport is configured.

pub mod service;
pub mod templates;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

pub use service::NotificationService;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A rendered email.
#[derive(Clone, Debug)]
pub struct EmailContent {
    pub subject: String,
    pub text: String,
}

/// Transport seam. Implementations must not block the caller on failure —
/// return `false` and log.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one email. Returns whether it was actually handed off.
    async fn deliver(&self, to: &str, content: EmailContent) -> bool;

    fn enabled(&self) -> bool {
        true
    }
}

// ── HTTP transport (Resend-style JSON POST) ──────────────────────────────────

pub struct HttpNotifier {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpNotifier {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn deliver(&self, to: &str, content: EmailContent) -> bool {
        let body = json!({
            "from": self.from,
            "to": [to],
            "subject": content.subject,
            "text": content.text,
        });
        match self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                info!(to, subject = %content.subject, "email sent");
                true
            }
            Ok(resp) => {
                warn!(to, status = %resp.status(), "email provider rejected send");
                false
            }
            Err(e) => {
                warn!(to, error = %e, "email delivery failed");
                false
            }
        }
    }
}

// ── Disabled transport ───────────────────────────────────────────────────────

/// Used when no email provider is configured. Logs what would have been sent.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn deliver(&self, to: &str, content: EmailContent) -> bool {
        info!(to, subject = %content.subject, "email disabled, skipping send");
        false
    }

    fn enabled(&self) -> bool {
        false
    }
}
