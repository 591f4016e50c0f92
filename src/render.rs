//! Rasterise a spectrogram to a colour-mapped PNG.

use std::path::Path;

use image::RgbImage;
use ndarray::Array2;

use crate::color::Colormap;
use crate::error::{Error, Result};
use crate::spectrogram::Spectrogram;

/// Magnitudes in dB, clamped at `floor` first.
pub fn to_decibels(magnitudes: &Array2<f64>, floor: f64) -> Array2<f64> {
    magnitudes.mapv(|m| 20.0 * m.max(floor).log10())
}

/// Scale to `[0, 1]` by this grid's own min/max. A flat grid maps to 0.
pub fn normalize(values: &Array2<f64>) -> Array2<f64> {
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = hi - lo;
    if span.is_nan() || span <= f64::EPSILON {
        return Array2::zeros(values.raw_dim());
    }
    values.mapv(|v| (v - lo) / span)
}

/// One pixel per (frame, bin); low frequencies at the bottom row.
pub fn render(spec: &Spectrogram, floor: f64, cmap: &Colormap) -> RgbImage {
    let scaled = normalize(&to_decibels(&spec.magnitudes, floor));
    let n_freqs = spec.n_freqs();
    RgbImage::from_fn(spec.n_frames() as u32, n_freqs as u32, |x, y| {
        let bin = n_freqs - 1 - y as usize;
        cmap.color_for(scaled[[bin, x as usize]])
    })
}

/// Save as PNG, creating parent directories.
pub fn save_png(image: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::write(parent, e))?;
    }
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| Error::write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::tempdir;

    fn spectrogram(magnitudes: Array2<f64>) -> Spectrogram {
        let (f, t) = magnitudes.dim();
        Spectrogram {
            magnitudes,
            frequencies: (0..f).map(|k| k as f64).collect(),
            times: (0..t).map(|k| k as f64).collect(),
        }
    }

    #[test]
    fn zero_magnitude_is_clamped_not_infinite() {
        let db = to_decibels(&array![[0.0, 1.0]], 1e-10);
        assert!((db[[0, 0]] + 200.0).abs() < 1e-9);
        assert_eq!(db[[0, 1]], 0.0);
    }

    #[test]
    fn flat_grid_normalizes_to_zero() {
        let n = normalize(&array![[3.0, 3.0], [3.0, 3.0]]);
        assert!(n.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn normalize_spans_unit_interval() {
        let n = normalize(&array![[-10.0, 0.0], [10.0, 5.0]]);
        assert_eq!(n[[0, 0]], 0.0);
        assert_eq!(n[[1, 0]], 1.0);
        assert_eq!(n[[0, 1]], 0.5);
    }

    #[test]
    fn image_is_frames_wide_and_bins_tall_with_low_freq_at_bottom() {
        // bin 0 loud, bin 2 quiet
        let spec = spectrogram(array![[1.0, 1.0, 1.0], [1e-3, 1e-3, 1e-3], [1e-6, 1e-6, 1e-6]]);
        let cmap = Colormap::viridis();
        let img = render(&spec, 1e-10, &cmap);
        assert_eq!(img.dimensions(), (3, 3));
        assert_eq!(*img.get_pixel(0, 2), cmap.color_for(1.0));
        assert_eq!(*img.get_pixel(0, 0), cmap.color_for(0.0));
    }

    #[test]
    fn save_creates_missing_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a/b/out.png");
        let img = render(&spectrogram(array![[1.0, 2.0]]), 1e-10, &Colormap::viridis());
        save_png(&img, &path).unwrap();
        let reread = image::open(&path).unwrap().to_rgb8();
        assert_eq!(reread, img);
    }

    #[test]
    fn unwritable_target_is_a_write_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let img = render(&spectrogram(array![[1.0]]), 1e-10, &Colormap::viridis());
        let err = save_png(&img, &blocker.join("out.png")).unwrap_err();
        assert!(matches!(err, Error::Write { .. }));
    }
}
