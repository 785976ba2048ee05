//! Outbound email for Murmur.
//!
//! Handlers never talk to a mail provider directly. They push an
//! [`EmailJob`] onto the [`Outbox`]; a single worker task drains it and hands
//! each job to a [`Mailer`]. A slow or failing provider therefore never adds
//! latency to, or fails, the request that triggered the email.

pub mod mailer;
pub mod outbox;
pub mod templates;

pub use mailer::{HttpMailer, LogMailer, Mailer};
pub use outbox::{EmailJob, Outbox, run_worker};
