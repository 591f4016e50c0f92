//! Error taxonomy for the spectrogram pipeline.
//!
//! Every variant is recoverable at file (or channel) granularity: the
//! orchestrator logs it and moves on.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// File missing, unreadable, or not a recognized matrix container.
    #[error("failed to load {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    /// Recording lacks a column the channel map needs.
    #[error("channel {channel} needs column {index} but the recording has only {available} columns")]
    MissingColumn {
        channel: String,
        index: usize,
        available: usize,
    },

    /// Channel is too short for a single STFT window.
    #[error("channel {channel} has {samples} samples, fewer than one {window}-sample window")]
    InsufficientData {
        channel: String,
        samples: usize,
        window: usize,
    },

    /// Output path could not be created or written.
    #[error("failed to write {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },

    /// Run-wide constants that cannot produce a spectrogram.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a parser failure, keeping the whole context chain.
    pub(crate) fn load(path: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        Error::Load {
            path: path.into(),
            reason: format!("{err:#}"),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Error::Write {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// Whether the error only affects one channel rather than the whole file.
    pub fn is_channel_local(&self) -> bool {
        matches!(self, Error::InsufficientData { .. })
    }
}
