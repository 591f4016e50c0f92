use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Recording – one loaded matrix file
// ---------------------------------------------------------------------------

/// A loaded recording: samples × variables, one column per variable.
///
/// Immutable once loaded; channels borrow from it.
#[derive(Debug, Clone)]
pub struct Recording {
    /// Source file the matrix was read from.
    pub path: PathBuf,
    /// Row = sample, column = variable.
    pub data: Array2<f64>,
    /// Sampling frequency stored in the file itself, when the container has one.
    pub sample_rate: Option<f64>,
}

impl Recording {
    pub fn new(path: impl Into<PathBuf>, data: Array2<f64>) -> Self {
        Self {
            path: path.into(),
            data,
            sample_rate: None,
        }
    }

    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_variables(&self) -> usize {
        self.data.ncols()
    }

    /// Column view of one variable. Caller checks bounds.
    pub fn column(&self, index: usize) -> ArrayView1<'_, f64> {
        self.data.index_axis(Axis(1), index)
    }

    /// File stem used to name output artifacts.
    pub fn identifier(&self) -> String {
        file_identifier(&self.path)
    }
}

pub(crate) fn file_identifier(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string())
}

// ---------------------------------------------------------------------------
// Channel – one named electrode time series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: String,
    pub samples: Vec<f64>,
}

impl Channel {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ---------------------------------------------------------------------------
// AttentionState – directory routing label
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AttentionState {
    Focused,
    Unfocused,
    Drowsy,
    All,
}

impl AttentionState {
    /// The three concrete labels, excluding `All`.
    pub const LABELS: [AttentionState; 3] = [
        AttentionState::Focused,
        AttentionState::Unfocused,
        AttentionState::Drowsy,
    ];

    /// Subdirectory name under the data root, `None` for `All`.
    pub fn dir_name(self) -> Option<&'static str> {
        match self {
            AttentionState::Focused => Some("focused"),
            AttentionState::Unfocused => Some("unfocused"),
            AttentionState::Drowsy => Some("drowsy"),
            AttentionState::All => None,
        }
    }

    /// Whether a file labeled `label` belongs to this selection.
    pub fn admits(self, label: AttentionState) -> bool {
        self == AttentionState::All || self == label
    }
}

impl fmt::Display for AttentionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttentionState::Focused => "FOCUSED",
            AttentionState::Unfocused => "UNFOCUSED",
            AttentionState::Drowsy => "DROWSY",
            AttentionState::All => "ALL",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AttentionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "focused" => Ok(AttentionState::Focused),
            "unfocused" => Ok(AttentionState::Unfocused),
            "drowsy" => Ok(AttentionState::Drowsy),
            "all" => Ok(AttentionState::All),
            other => Err(format!(
                "unknown attention state '{other}' (expected FOCUSED, UNFOCUSED, DROWSY or ALL)"
            )),
        }
    }
}

impl TryFrom<String> for AttentionState {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AttentionState> for String {
    fn from(state: AttentionState) -> Self {
        state.to_string()
    }
}
