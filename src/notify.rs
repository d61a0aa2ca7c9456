//! Pushover notifications
//!
//! Missing credentials are not an error: sends return a failed result and the
//! pipeline carries on.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

/// Pushover message endpoint
pub const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Outcome of a notification attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationResult {
    pub success: bool,
    /// Receipt or error description from the service, when available
    pub message: Option<String>,
}

impl NotificationResult {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Deserialize)]
struct PushoverResponse {
    #[serde(default)]
    request: Option<String>,
}

/// Pushover notification sender
pub struct Notifier {
    http: reqwest::Client,
    user_key: String,
    api_token: String,
}

impl Notifier {
    pub fn new(user_key: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            user_key: user_key.into(),
            api_token: api_token.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.user_key.is_empty() && !self.api_token.is_empty()
    }

    /// Send a notification. Priority ranges from -2 (lowest) to 2 (emergency).
    pub async fn send(
        &self,
        title: &str,
        message: &str,
        priority: i8,
        url: Option<&str>,
    ) -> NotificationResult {
        if !self.is_configured() {
            debug!("Notifier credentials not configured, dropping notification");
            return NotificationResult::failed("credentials not configured");
        }

        let mut form: Vec<(&str, String)> = vec![
            ("token", self.api_token.clone()),
            ("user", self.user_key.clone()),
            ("title", title.to_string()),
            ("message", message.to_string()),
            ("priority", priority.to_string()),
        ];
        if let Some(url) = url {
            form.push(("url", url.to_string()));
        }

        match self.http.post(PUSHOVER_API_URL).form(&form).send().await {
            Ok(response) if response.status().is_success() => {
                let receipt = response
                    .json::<PushoverResponse>()
                    .await
                    .ok()
                    .and_then(|body| body.request);
                NotificationResult {
                    success: true,
                    message: receipt,
                }
            }
            Ok(response) => {
                error!(status = %response.status(), "Notification rejected");
                NotificationResult::failed(format!("service returned {}", response.status()))
            }
            Err(e) => {
                error!(error = %e, "Failed to send notification");
                NotificationResult::failed(e.to_string())
            }
        }
    }

    /// Tell the operator a disc needs manual review.
    pub async fn review_needed(
        &self,
        disc_label: &str,
        confidence: f64,
        review_url: &str,
    ) -> NotificationResult {
        let message = format!(
            "{disc_label} needs review ({:.0}% confidence)",
            confidence * 100.0
        );
        self.send("Review Needed", &message, 0, Some(review_url))
            .await
    }

    /// Tell the operator a disc finished processing.
    pub async fn disc_complete(
        &self,
        disc_label: &str,
        title: Option<&str>,
        year: Option<i32>,
    ) -> NotificationResult {
        let message = match (title, year) {
            (Some(title), Some(year)) => format!("{disc_label} identified as {title} ({year})"),
            (Some(title), None) => format!("{disc_label} identified as {title}"),
            _ => format!("{disc_label} has been processed"),
        };
        self.send("Disc Complete", &message, 0, None).await
    }

    /// Tell the operator a disc failed.
    pub async fn processing_error(&self, disc_label: &str, error: &str) -> NotificationResult {
        self.send("Ripping Error", &format!("{disc_label}: {error}"), 1, None)
            .await
    }
}
