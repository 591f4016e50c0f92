//! Directory orchestrator: walk recordings, render one PNG per channel.
//!
//! Output mirrors the input tree:
//! `<output_root>/<relative dir>/<stem>/<stem>_<CHANNEL>.png`.
//! A bad file is logged and skipped; the run always reaches the end.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;

use crate::color::Colormap;
use crate::config::RunConfig;
use crate::data::channels::select_channels;
use crate::data::loader::{self, load_recording};
use crate::data::model::{AttentionState, file_identifier};
use crate::error::{Error, Result};
use crate::render::{render, save_png};
use crate::spectrogram::SpectrogramGenerator;

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// All loadable files under `root`, sorted, skipping the `exclude` directories.
///
/// Symlinked directories are not followed. Only an unreadable `root` is an
/// error; unreadable subdirectories and entries are logged and skipped.
pub fn discover_recordings(root: &Path, exclude: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if dir == root => return Err(e.into()),
            Err(e) => {
                warn!("cannot read {}: {e}", dir.display());
                continue;
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("cannot read an entry of {}: {e}", dir.display());
                    continue;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    warn!("cannot stat {}: {e}", path.display());
                    continue;
                }
            };
            if file_type.is_dir() {
                if !exclude.contains(&path) {
                    pending.push(path);
                }
            } else if file_type.is_symlink() && path.is_dir() {
                debug!("not following symlinked directory {}", path.display());
            } else if loader::is_supported(&path) {
                found.push(path);
            } else {
                debug!("ignoring {}", path.display());
            }
        }
    }
    found.sort();
    Ok(found)
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Aggregate outcome of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub files_succeeded: usize,
    pub files_failed: usize,
    pub images_written: usize,
    pub channels_skipped: usize,
    pub failures: Vec<FileFailure>,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.files_failed == 0
    }

    pub fn files_total(&self) -> usize {
        self.files_succeeded + self.files_failed
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(|e| Error::write(path, e))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::write(parent, e))?;
        }
        fs::write(path, text).map_err(|e| Error::write(path, e))
    }

    fn record_failure(&mut self, path: &Path, error: String) {
        warn!("skipping {}: {error}", path.display());
        self.files_failed += 1;
        self.failures.push(FileFailure {
            path: path.to_path_buf(),
            error,
        });
    }
}

/// What one file produced.
#[derive(Debug, Clone, Default)]
pub struct FileReport {
    pub images: Vec<PathBuf>,
    pub skipped_channels: Vec<String>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    config: RunConfig,
    generator: SpectrogramGenerator,
    colormap: Colormap,
}

impl Pipeline {
    pub fn new(config: RunConfig) -> Result<Self> {
        let generator = SpectrogramGenerator::new(config.spectrogram.clone())?;
        Ok(Self {
            config,
            generator,
            colormap: Colormap::viridis(),
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Directory a run over `scope` walks.
    pub fn scope_dir(&self, scope: AttentionState) -> PathBuf {
        match scope.dir_name() {
            Some(dir) => self.config.data_root.join(dir),
            None => self.config.data_root.clone(),
        }
    }

    /// Process every recording in scope. Only a missing or unreadable scope
    /// directory fails the run itself; per-file problems land in the summary.
    pub fn run(&self, scope: AttentionState) -> Result<RunSummary> {
        let root = self.scope_dir(scope);
        if !root.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input directory {} does not exist", root.display()),
            )));
        }

        let files = discover_recordings(&root, &[])?;
        info!("{scope}: {} recordings under {}", files.len(), root.display());

        let mut summary = RunSummary::default();
        for path in &files {
            // Images written before a mid-file failure stay on disk and are counted.
            let mut report = FileReport::default();
            let outcome = self.process_into(path, &mut report);
            summary.channels_skipped += report.skipped_channels.len();
            summary.images_written += report.images.len();
            match outcome {
                Ok(()) if report.images.is_empty() => summary.record_failure(
                    path,
                    "no channel is long enough for one STFT window".to_string(),
                ),
                Ok(()) => {
                    info!("{}: wrote {} images", path.display(), report.images.len());
                    summary.files_succeeded += 1;
                }
                Err(e) => summary.record_failure(path, e.to_string()),
            }
        }

        info!(
            "done: {} succeeded, {} failed, {} images, {} channels skipped",
            summary.files_succeeded,
            summary.files_failed,
            summary.images_written,
            summary.channels_skipped
        );
        Ok(summary)
    }

    /// Load → select → STFT → render for one file.
    pub fn process_file(&self, path: &Path) -> Result<FileReport> {
        let mut report = FileReport::default();
        self.process_into(path, &mut report)?;
        Ok(report)
    }

    /// Like [`Pipeline::process_file`], filling `report` as images land so a
    /// caller still sees them when a later channel fails.
    fn process_into(&self, path: &Path, report: &mut FileReport) -> Result<()> {
        let recording = load_recording(path)?;
        let expected = self.config.spectrogram.sample_rate;
        if let Some(rate) = recording.sample_rate {
            if (rate - expected).abs() > f64::EPSILON {
                warn!(
                    "{}: file says {rate} Hz, using the configured {expected} Hz",
                    path.display()
                );
            }
        }

        let channels = select_channels(&recording, &self.config.channels)?;
        let out_dir = self.output_dir_for(path);
        let stem = recording.identifier();
        let floor = self.config.spectrogram.amplitude_floor;

        for channel in &channels {
            let spec = match self.generator.compute(channel) {
                Ok(spec) => spec,
                Err(e) if e.is_channel_local() => {
                    warn!("{}: {e}", path.display());
                    report.skipped_channels.push(channel.name.clone());
                    continue;
                }
                Err(e) => return Err(e),
            };
            let image = render(&spec, floor, &self.colormap);
            let target = out_dir.join(format!("{stem}_{}.png", channel.name));
            save_png(&image, &target)?;
            debug!("wrote {}", target.display());
            report.images.push(target);
        }
        Ok(())
    }

    /// `<output_root>/<dir of path relative to data_root>/<stem>`.
    pub fn output_dir_for(&self, path: &Path) -> PathBuf {
        let relative = path
            .strip_prefix(&self.config.data_root)
            .unwrap_or(path);
        let parent = relative.parent().unwrap_or(Path::new(""));
        self.config
            .output_root
            .join(parent)
            .join(file_identifier(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpectrogramConfig;
    use crate::data::matfile;
    use ndarray::Array2;
    use tempfile::tempdir;

    fn small_config() -> SpectrogramConfig {
        SpectrogramConfig {
            window_len: 64,
            overlap: 32,
            fft_size: 64,
            ..Default::default()
        }
    }

    fn write_recording(path: &Path, rows: usize, cols: usize) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let data = Array2::from_shape_fn((rows, cols), |(r, c)| ((r * (c + 1)) as f64 * 0.1).sin());
        let file = fs::File::create(path).unwrap();
        matfile::write_mat(file, &[matfile::recording_struct(&data, 128.0)], true).unwrap();
    }

    fn pipeline(data: &Path, out: &Path) -> Pipeline {
        Pipeline::new(RunConfig::new(data, out).with_spectrogram(small_config())).unwrap()
    }

    #[test]
    fn valid_and_corrupt_file_yield_one_image_set() {
        let data = tempdir().unwrap();
        let out = tempdir().unwrap();
        write_recording(&data.path().join("eeg_record1.mat"), 200, 25);
        fs::write(data.path().join("eeg_record2.mat"), b"garbage").unwrap();

        let summary = pipeline(data.path(), out.path()).run(AttentionState::All).unwrap();
        assert_eq!(summary.files_succeeded, 1);
        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.images_written, 7);
        assert!(!summary.is_clean());
        assert!(summary.failures[0].path.ends_with("eeg_record2.mat"));

        let images = fs::read_dir(out.path().join("eeg_record1")).unwrap().count();
        assert_eq!(images, 7);
        assert!(out.path().join("eeg_record1/eeg_record1_AF4.png").is_file());
        assert!(!out.path().join("eeg_record2").exists());
    }

    #[test]
    fn output_mirrors_relative_directories() {
        let data = tempdir().unwrap();
        let out = tempdir().unwrap();
        write_recording(&data.path().join("focused/s1/rec_focused.mat"), 100, 17);

        let summary = pipeline(data.path(), out.path()).run(AttentionState::All).unwrap();
        assert!(summary.is_clean());
        assert!(out
            .path()
            .join("focused/s1/rec_focused/rec_focused_O2.png")
            .is_file());
    }

    #[test]
    fn state_scope_only_walks_its_subdirectory() {
        let data = tempdir().unwrap();
        let out = tempdir().unwrap();
        write_recording(&data.path().join("drowsy/a_drowsy.mat"), 100, 17);
        write_recording(&data.path().join("focused/b_focused.mat"), 100, 17);

        let summary = pipeline(data.path(), out.path()).run(AttentionState::Drowsy).unwrap();
        assert_eq!(summary.files_total(), 1);
        assert!(out.path().join("drowsy/a_drowsy").is_dir());
        assert!(!out.path().join("focused").exists());
    }

    #[test]
    fn missing_scope_directory_fails_the_run() {
        let data = tempdir().unwrap();
        let out = tempdir().unwrap();
        let result = pipeline(data.path(), out.path()).run(AttentionState::Unfocused);
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn narrow_matrix_is_skipped_with_failure() {
        let data = tempdir().unwrap();
        let out = tempdir().unwrap();
        write_recording(&data.path().join("narrow.mat"), 100, 10);

        let summary = pipeline(data.path(), out.path()).run(AttentionState::All).unwrap();
        assert_eq!(summary.files_failed, 1);
        assert!(summary.failures[0].error.contains("column"));
    }

    #[test]
    fn too_short_recording_writes_nothing() {
        let data = tempdir().unwrap();
        let out = tempdir().unwrap();
        write_recording(&data.path().join("short.mat"), 20, 17);

        let summary = pipeline(data.path(), out.path()).run(AttentionState::All).unwrap();
        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.channels_skipped, 7);
        assert_eq!(summary.images_written, 0);
        assert!(!out.path().join("short").exists());
    }

    #[test]
    fn discovery_is_sorted_and_filtered() {
        let data = tempdir().unwrap();
        fs::write(data.path().join("b.csv"), "1").unwrap();
        fs::write(data.path().join("a.mat"), "x").unwrap();
        fs::write(data.path().join("readme.txt"), "x").unwrap();
        fs::create_dir(data.path().join("skip")).unwrap();
        fs::write(data.path().join("skip/c.mat"), "x").unwrap();

        let found = discover_recordings(data.path(), &[data.path().join("skip")]).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["a.mat", "b.csv"]);
    }

    #[test]
    fn blocked_output_directory_fails_only_that_file() {
        let data = tempdir().unwrap();
        let out = tempdir().unwrap();
        write_recording(&data.path().join("a.mat"), 100, 17);
        write_recording(&data.path().join("b.mat"), 100, 17);
        fs::write(out.path().join("a"), b"not a directory").unwrap();

        let summary = pipeline(data.path(), out.path()).run(AttentionState::All).unwrap();
        assert_eq!(summary.files_succeeded, 1);
        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.images_written, 7);
        assert!(summary.failures[0].path.ends_with("a.mat"));
        assert!(summary.failures[0].error.contains("failed to write"));
        assert_eq!(fs::read_dir(out.path().join("b")).unwrap().count(), 7);
    }

    #[test]
    fn images_before_a_write_failure_are_counted() {
        let data = tempdir().unwrap();
        let out = tempdir().unwrap();
        write_recording(&data.path().join("rec.mat"), 100, 17);
        // O1 is the fourth channel; F7, F3 and P7 are written first.
        fs::create_dir_all(out.path().join("rec/rec_O1.png")).unwrap();

        let summary = pipeline(data.path(), out.path()).run(AttentionState::All).unwrap();
        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.files_succeeded, 0);
        assert_eq!(summary.images_written, 3);
        assert!(out.path().join("rec/rec_P7.png").is_file());
        assert!(!out.path().join("rec/rec_O2.png").exists());
    }

    #[cfg(unix)]
    #[test]
    fn discovery_does_not_follow_symlinked_directories() {
        let data = tempdir().unwrap();
        fs::write(data.path().join("a.mat"), "x").unwrap();
        fs::create_dir(data.path().join("sub")).unwrap();
        fs::write(data.path().join("sub/b.mat"), "x").unwrap();
        std::os::unix::fs::symlink(data.path(), data.path().join("sub/loop")).unwrap();
        std::os::unix::fs::symlink(data.path().join("sub"), data.path().join("alias")).unwrap();

        let found = discover_recordings(data.path(), &[]).unwrap();
        assert_eq!(found, [data.path().join("a.mat"), data.path().join("sub/b.mat")]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_recording_file_is_still_found() {
        let data = tempdir().unwrap();
        let elsewhere = tempdir().unwrap();
        fs::write(elsewhere.path().join("real.mat"), "x").unwrap();
        std::os::unix::fs::symlink(elsewhere.path().join("real.mat"), data.path().join("link.mat"))
            .unwrap();

        let found = discover_recordings(data.path(), &[]).unwrap();
        assert_eq!(found, [data.path().join("link.mat")]);
    }

    #[test]
    fn unreadable_root_is_an_error() {
        let data = tempdir().unwrap();
        let file = data.path().join("plain.mat");
        fs::write(&file, "x").unwrap();
        assert!(matches!(discover_recordings(&file, &[]), Err(Error::Io(_))));
    }

    #[test]
    fn summary_serializes_to_json_file() {
        let dir = tempdir().unwrap();
        let mut summary = RunSummary::default();
        summary.record_failure(Path::new("x.mat"), "boom".into());
        let path = dir.path().join("reports/summary.json");
        summary.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["files_failed"], 1);
        assert_eq!(value["failures"][0]["error"], "boom");
    }
}
