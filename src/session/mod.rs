//! Capture session: reader loop → bounded channel → writer loop

mod manager;
mod reader;
mod state;

use std::io;

use thiserror::Error;

use crate::capture::SinkError;

pub use manager::{Session, SessionConfig};

/// Errors that end a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("sniffer stream read failed: {0}")]
    Source(#[source] io::Error),

    #[error("reader task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
