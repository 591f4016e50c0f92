//! Per-channel STFT spectrogram images from multi-channel EEG recordings.
//!
//! ```text
//!  files ─▶ loader ─▶ channels ─▶ spectrogram ─▶ render ─▶ PNG
//!               ▲                                   │
//!               └──────────── pipeline ─────────────┘
//! ```
//!
//! `splitter` is the optional step that files raw recordings into
//! per-attention-state subdirectories before a run.

pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod spectrogram;
pub mod splitter;

pub use config::{ChannelMap, RunConfig, SpectrogramConfig};
pub use data::model::{AttentionState, Channel, Recording};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, RunSummary};
pub use splitter::{SplitMode, SplitReport, split_by_state};
