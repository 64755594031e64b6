// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime error types.

use tbot_adapters::{ExchangeError, MailError};
use thiserror::Error;

/// Errors a job can surface to its supervisor.
///
/// A job returning `Err` stops; the supervisor logs it and leaves the
/// task unfinalized unless the job already set the flag itself.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error("{0}")]
    Other(String),
}

impl JobError {
    pub fn other(msg: impl Into<String>) -> Self {
        JobError::Other(msg.into())
    }
}
