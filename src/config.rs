use std::path::PathBuf;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Run-wide constants
// ---------------------------------------------------------------------------

/// Sampling rate of the headset, in Hz.
pub const SAMPLE_RATE_HZ: f64 = 128.0;
/// STFT segment length (15 s at 128 Hz).
pub const WINDOW_LEN: usize = 1920;
/// Samples shared by consecutive segments.
pub const WINDOW_OVERLAP: usize = WINDOW_LEN / 2;
pub const FFT_SIZE: usize = WINDOW_LEN;
/// Magnitudes below this are clamped before taking the logarithm.
pub const AMPLITUDE_FLOOR: f64 = 1e-10;

/// 0-based matrix column → electrode name.
///
/// The recording layout stores 14 EEG electrodes in columns 3..=16
/// (AF3 first, AF4 last); only the seven useful ones are kept.
pub const CHANNEL_COLUMNS: [(usize, &str); 7] = [
    (4, "F7"),
    (5, "F3"),
    (8, "P7"),
    (9, "O1"),
    (10, "O2"),
    (11, "P8"),
    (16, "AF4"),
];

// ---------------------------------------------------------------------------
// SpectrogramConfig
// ---------------------------------------------------------------------------

/// STFT and colour-scaling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrogramConfig {
    pub sample_rate: f64,
    pub window_len: usize,
    pub overlap: usize,
    pub fft_size: usize,
    pub amplitude_floor: f64,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE_HZ,
            window_len: WINDOW_LEN,
            overlap: WINDOW_OVERLAP,
            fft_size: FFT_SIZE,
            amplitude_floor: AMPLITUDE_FLOOR,
        }
    }
}

impl SpectrogramConfig {
    /// Distance between the starts of consecutive segments.
    pub fn hop(&self) -> usize {
        self.window_len - self.overlap
    }

    /// Number of one-sided frequency bins.
    pub fn n_freqs(&self) -> usize {
        self.fft_size / 2 + 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_len == 0 {
            return Err(Error::InvalidConfig("window length must be positive".into()));
        }
        if self.overlap >= self.window_len {
            return Err(Error::InvalidConfig(format!(
                "overlap {} must be smaller than window length {}",
                self.overlap, self.window_len
            )));
        }
        if self.fft_size < self.window_len {
            return Err(Error::InvalidConfig(format!(
                "FFT size {} is smaller than window length {}",
                self.fft_size, self.window_len
            )));
        }
        if self.sample_rate.is_nan() || self.sample_rate <= 0.0 {
            return Err(Error::InvalidConfig("sampling rate must be positive".into()));
        }
        if self.amplitude_floor.is_nan() || self.amplitude_floor <= 0.0 {
            return Err(Error::InvalidConfig("amplitude floor must be positive".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ChannelMap
// ---------------------------------------------------------------------------

/// Static column-index → electrode-name table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMap {
    entries: Vec<(usize, String)>,
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::new(CHANNEL_COLUMNS.iter().map(|&(i, n)| (i, n.to_string())))
    }
}

impl ChannelMap {
    pub fn new(entries: impl IntoIterator<Item = (usize, String)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// `(column, name)` pairs in table order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &str)> {
        self.entries.iter().map(|(i, n)| (*i, n.as_str()))
    }

    /// Minimum column count a recording needs.
    pub fn required_columns(&self) -> usize {
        self.entries.iter().map(|(i, _)| i + 1).max().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

/// Everything the orchestrator needs for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub data_root: PathBuf,
    pub output_root: PathBuf,
    pub spectrogram: SpectrogramConfig,
    pub channels: ChannelMap,
}

impl RunConfig {
    pub fn new(data_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            output_root: output_root.into(),
            spectrogram: SpectrogramConfig::default(),
            channels: ChannelMap::default(),
        }
    }

    pub fn with_spectrogram(mut self, spectrogram: SpectrogramConfig) -> Self {
        self.spectrogram = spectrogram;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_channel_map_needs_seventeen_columns() {
        let map = ChannelMap::default();
        assert_eq!(map.entries().count(), 7);
        assert_eq!(map.required_columns(), 17);
        let names: Vec<&str> = map.entries().map(|(_, n)| n).collect();
        assert_eq!(names, ["F7", "F3", "P7", "O1", "O2", "P8", "AF4"]);
    }

    #[test]
    fn default_spectrogram_config_is_valid() {
        let cfg = SpectrogramConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.hop(), 960);
        assert_eq!(cfg.n_freqs(), 961);
    }

    #[test]
    fn rejects_overlap_not_below_window() {
        let cfg = SpectrogramConfig {
            overlap: WINDOW_LEN,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_fft_shorter_than_window() {
        let cfg = SpectrogramConfig {
            fft_size: 64,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_rate() {
        let cfg = SpectrogramConfig {
            sample_rate: 0.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
