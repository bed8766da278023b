// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Error types for edgebridge

use thiserror::Error;

/// Failures that can cross component boundaries.
///
/// `Config` is fatal at startup (exit code 1); everything else either aborts
/// startup with exit code 2 or is contained by the workflow loop.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("task error: {0}")]
    Task(String),

    #[error("dispatch error: {0}")]
    Dispatch(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Process exit code for a fatal error surfaced from `main`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => 1,
            _ => 2,
        }
    }
}
