use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::outbox::EmailJob;

/// A delivery backend for queued email.
pub trait Mailer: Send + Sync + 'static {
    fn send(&self, job: &EmailJob) -> impl Future<Output = Result<()>> + Send;
}

/// Writes emails to the log instead of sending them. Default when no relay
/// is configured, which keeps local development self-contained.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    async fn send(&self, job: &EmailJob) -> Result<()> {
        info!(to = %job.to, subject = %job.subject, "email (log only)\n{}", job.html);
        Ok(())
    }
}

/// Posts each email as JSON to an HTTP mail relay.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

impl HttpMailer {
    pub fn new(endpoint: String, token: Option<String>, from: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building mail relay client")?;
        Ok(Self {
            client,
            endpoint,
            token,
            from,
        })
    }
}

impl Mailer for HttpMailer {
    async fn send(&self, job: &EmailJob) -> Result<()> {
        let payload = RelayPayload {
            from: &self.from,
            to: &job.to,
            subject: &job.subject,
            html: &job.html,
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        request
            .send()
            .await
            .context("mail relay unreachable")?
            .error_for_status()
            .context("mail relay rejected message")?;

        Ok(())
    }
}
