// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mail notifier adapter.
//!
//! The SMTP transport itself is an external collaborator; jobs only see
//! the trait. `NoopMailer` stands in when the `[mail]` section is not
//! configured.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Errors from mail operations
#[derive(Debug, Error)]
pub enum MailError {
    #[error("missing mail config")]
    MissingConfig,

    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Adapter for sending notification mail.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    /// Send a notification with the given body.
    async fn send(&self, body: &str) -> Result<(), MailError>;
}

/// Mailer used when mail is not configured: logs and succeeds.
#[derive(Clone, Default)]
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, body: &str) -> Result<(), MailError> {
        info!("mail not configured, dropping notification ({} bytes)", body.len());
        Ok(())
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake {
    #![cfg_attr(coverage_nightly, coverage(off))]

    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Fake mailer recording every body it is asked to send.
    #[derive(Clone, Default)]
    pub struct FakeMailer {
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl FakeMailer {
        pub fn new() -> Self {
            Self::default()
        }

        /// All bodies sent so far.
        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl Mailer for FakeMailer {
        async fn send(&self, body: &str) -> Result<(), MailError> {
            self.sent.lock().push(body.to_string());
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeMailer;

#[cfg(test)]
#[path = "mail_tests.rs"]
mod tests;
