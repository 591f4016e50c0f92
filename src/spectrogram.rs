//! Short-time Fourier transform of one channel.
//!
//! Segmentation matches the usual scientific-Python convention: the signal is
//! zero-extended by half a window on both sides and zero-padded to a whole
//! number of hops. Each segment is weighted by a periodic Blackman window and
//! the one-sided magnitude is scaled by `1 / Σw`.

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::Array2;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::config::SpectrogramConfig;
use crate::data::model::Channel;
use crate::error::{Error, Result};

/// Time-frequency magnitude grid of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    /// `[frequency bin, frame]` magnitudes.
    pub magnitudes: Array2<f64>,
    /// Bin centre frequencies in Hz.
    pub frequencies: Vec<f64>,
    /// Segment centre times in seconds.
    pub times: Vec<f64>,
}

impl Spectrogram {
    pub fn n_freqs(&self) -> usize {
        self.magnitudes.nrows()
    }

    pub fn n_frames(&self) -> usize {
        self.magnitudes.ncols()
    }
}

/// Periodic Blackman window of length `n`.
pub fn blackman(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let x = 2.0 * PI * i as f64 / n as f64;
            0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
        })
        .collect()
}

/// Reusable STFT: window and FFT plan are built once per run.
pub struct SpectrogramGenerator {
    config: SpectrogramConfig,
    window: Vec<f64>,
    window_sum: f64,
    fft: Arc<dyn Fft<f64>>,
}

impl SpectrogramGenerator {
    pub fn new(config: SpectrogramConfig) -> Result<Self> {
        config.validate()?;
        let window = blackman(config.window_len);
        let window_sum: f64 = window.iter().sum();
        let fft = FftPlanner::<f64>::new().plan_fft_forward(config.fft_size);
        Ok(Self {
            config,
            window,
            window_sum,
            fft,
        })
    }

    pub fn config(&self) -> &SpectrogramConfig {
        &self.config
    }

    pub fn compute(&self, channel: &Channel) -> Result<Spectrogram> {
        let cfg = &self.config;
        let win = cfg.window_len;
        if channel.len() < win {
            return Err(Error::InsufficientData {
                channel: channel.name.clone(),
                samples: channel.len(),
                window: win,
            });
        }

        let hop = cfg.hop();
        let half = win / 2;
        let mut padded = Vec::with_capacity(channel.len() + win + hop);
        padded.resize(half, 0.0);
        padded.extend_from_slice(&channel.samples);
        padded.resize(padded.len() + half, 0.0);
        let rem = (padded.len() - win) % hop;
        if rem != 0 {
            padded.resize(padded.len() + hop - rem, 0.0);
        }

        let n_frames = (padded.len() - win) / hop + 1;
        let n_freqs = cfg.n_freqs();
        let mut magnitudes = Array2::zeros((n_freqs, n_frames));

        let zero = Complex::new(0.0, 0.0);
        let mut buf = vec![zero; cfg.fft_size];
        let mut scratch = vec![zero; self.fft.get_inplace_scratch_len()];

        for frame in 0..n_frames {
            let segment = &padded[frame * hop..frame * hop + win];
            for (slot, (x, w)) in buf.iter_mut().zip(segment.iter().zip(&self.window)) {
                *slot = Complex::new(x * w, 0.0);
            }
            buf[win..].fill(zero);
            self.fft.process_with_scratch(&mut buf, &mut scratch);
            for (k, bin) in buf.iter().take(n_freqs).enumerate() {
                magnitudes[[k, frame]] = bin.norm() / self.window_sum;
            }
        }

        let frequencies = (0..n_freqs)
            .map(|k| k as f64 * cfg.sample_rate / cfg.fft_size as f64)
            .collect();
        let times = (0..n_frames)
            .map(|f| (f * hop) as f64 / cfg.sample_rate)
            .collect();

        Ok(Spectrogram {
            magnitudes,
            frequencies,
            times,
        })
    }
}
