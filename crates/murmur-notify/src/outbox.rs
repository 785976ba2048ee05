use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::mailer::Mailer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailJob {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Sending half of the email queue. Cheap to clone; one per handler state.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<EmailJob>,
}

impl Outbox {
    /// Create an outbox and the receiver the worker will drain.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EmailJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a job. Never blocks and never fails the caller; a closed queue
    /// only means the worker is gone (shutdown), so the job is logged and dropped.
    pub fn enqueue(&self, job: EmailJob) {
        debug!("Queueing email '{}' to {}", job.subject, job.to);
        if let Err(e) = self.tx.send(job) {
            warn!("Mail worker is gone, dropping email to {}", e.0.to);
        }
    }
}

/// Drain the outbox until every [`Outbox`] handle is dropped.
///
/// Each job is attempted once. Failures are logged and the worker moves on.
pub async fn run_worker<M: Mailer>(mut rx: mpsc::UnboundedReceiver<EmailJob>, mailer: M) {
    info!("Mail worker started");

    while let Some(job) = rx.recv().await {
        match mailer.send(&job).await {
            Ok(()) => info!("Delivered '{}' to {}", job.subject, job.to),
            Err(e) => warn!("Failed to deliver '{}' to {}: {:#}", job.subject, job.to, e),
        }
    }

    info!("Mail worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recording {
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl Mailer for Recording {
        async fn send(&self, job: &EmailJob) -> anyhow::Result<()> {
            if job.to.starts_with("bounce") {
                anyhow::bail!("mailbox unavailable");
            }
            self.sent.lock().unwrap().push(job.to.clone());
            Ok(())
        }
    }

    fn job(to: &str) -> EmailJob {
        EmailJob {
            to: to.into(),
            subject: "hi".into(),
            html: "<p>hi</p>".into(),
        }
    }

    #[tokio::test]
    async fn worker_keeps_going_after_a_failure() {
        let (outbox, rx) = Outbox::channel();
        let mailer = Recording::default();
        let sent = mailer.sent.clone();

        outbox.enqueue(job("a@b.com"));
        outbox.enqueue(job("bounce@b.com"));
        outbox.enqueue(job("c@d.com"));
        drop(outbox);

        run_worker(rx, mailer).await;

        assert_eq!(*sent.lock().unwrap(), vec!["a@b.com", "c@d.com"]);
    }

    #[tokio::test]
    async fn enqueue_after_worker_exit_does_not_panic() {
        let (outbox, rx) = Outbox::channel();
        drop(rx);
        outbox.enqueue(job("a@b.com"));
    }
}
