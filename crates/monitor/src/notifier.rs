//! Digest delivery.
//!
//! The dispatcher only knows the [`Notifier`] trait; the production sink is
//! SendGrid's v3 mail endpoint.

use std::time::Duration;

use async_trait::async_trait;
use nano_notify_domain::EmailConfig;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;

pub const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// A rendered batch ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub subject: String,
    pub html_body: String,
    /// Plain-text line per event, in arrival order.
    pub lines: Vec<String>,
}

impl Digest {
    pub fn plain_body(&self) -> String {
        self.lines.join("\n")
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, digest: &Digest) -> Result<(), NotifierError>;
}

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("delivery rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

pub struct SendGridNotifier {
    client: Client,
    config: EmailConfig,
    endpoint: String,
}

impl SendGridNotifier {
    pub fn new(config: EmailConfig) -> Result<Self, NotifierError> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            config,
            endpoint: SENDGRID_ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn payload<'a>(&'a self, digest: &'a Digest) -> MailPayload<'a> {
        MailPayload {
            personalizations: vec![Personalization {
                to: self
                    .config
                    .to()
                    .iter()
                    .map(|email| Address { email })
                    .collect(),
            }],
            from: Address {
                email: self.config.from(),
            },
            subject: &digest.subject,
            content: vec![
                Content {
                    kind: "text/plain",
                    value: digest.plain_body(),
                },
                Content {
                    kind: "text/html",
                    value: digest.html_body.clone(),
                },
            ],
        }
    }
}

#[async_trait]
impl Notifier for SendGridNotifier {
    async fn send(&self, digest: &Digest) -> Result<(), NotifierError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.config.api_key())
            .json(&self.payload(digest))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(NotifierError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Debug, Serialize)]
struct MailPayload<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(rename = "type")]
    kind: &'static str,
    value: String,
}
