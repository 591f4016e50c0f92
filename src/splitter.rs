//! Route raw recordings into per-state subdirectories of the data root.
//!
//! A file's label comes from `attention_states.json` in the data root when
//! listed there, otherwise from a `focused` / `unfocused` / `drowsy` token in
//! its file stem. Files land in `<data_root>/<state>/<relative path>`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;

use crate::data::model::AttentionState;
use crate::error::{Error, Result};
use crate::pipeline::discover_recordings;

/// Optional file-name → state manifest in the data root.
pub const MANIFEST_FILE: &str = "attention_states.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMode {
    #[default]
    Copy,
    Move,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitReport {
    /// Newly written into a state directory.
    pub placed: usize,
    /// Destination existed with different bytes and was overwritten.
    pub replaced: usize,
    /// Destination already held identical bytes.
    pub already_present: usize,
    /// No label could be resolved.
    pub unlabeled: usize,
    /// Labeled, but not with the requested state.
    pub not_selected: usize,
    /// Could not be placed; left where it was.
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Label resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct StateLabels {
    manifest: BTreeMap<String, AttentionState>,
}

impl StateLabels {
    /// Read the manifest if the data root has one.
    pub fn load(data_root: &Path) -> Result<Self> {
        let path = data_root.join(MANIFEST_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)?;
        let manifest: BTreeMap<String, AttentionState> =
            serde_json::from_str(&text).map_err(|e| Error::Load {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        debug!("{} manifest entries from {}", manifest.len(), path.display());
        Ok(Self { manifest })
    }

    pub fn from_manifest(manifest: BTreeMap<String, AttentionState>) -> Self {
        Self { manifest }
    }

    pub fn label_for(&self, path: &Path) -> Option<AttentionState> {
        let listed = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| self.manifest.get(n))
            .copied();
        match listed {
            Some(AttentionState::All) => {
                warn!("{}: ALL is not a recording label", path.display());
                None
            }
            Some(state) => Some(state),
            None => label_from_name(path),
        }
    }
}

/// Whole-token match on the file stem, so `unfocused` never reads as `focused`.
pub fn label_from_name(path: &Path) -> Option<AttentionState> {
    let stem = path.file_stem()?.to_str()?.to_ascii_lowercase();
    stem.split(|c: char| !c.is_ascii_alphanumeric())
        .filter_map(|token| token.parse::<AttentionState>().ok())
        .find(|state| *state != AttentionState::All)
}

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

/// Copy or move every file admitted by `selection` into its state directory.
///
/// Re-running is a no-op for files already in place.
pub fn split_by_state(
    data_root: &Path,
    selection: AttentionState,
    mode: SplitMode,
) -> Result<SplitReport> {
    let labels = StateLabels::load(data_root)?;
    let state_dirs: Vec<PathBuf> = AttentionState::LABELS
        .iter()
        .filter_map(|s| s.dir_name())
        .map(|d| data_root.join(d))
        .collect();

    let mut report = SplitReport::default();
    for src in discover_recordings(data_root, &state_dirs)? {
        let Some(label) = labels.label_for(&src) else {
            debug!("{}: no attention-state label", src.display());
            report.unlabeled += 1;
            continue;
        };
        if !selection.admits(label) {
            report.not_selected += 1;
            continue;
        }
        let Some(dir) = label.dir_name() else {
            continue;
        };
        let relative = src.strip_prefix(data_root).unwrap_or(src.as_path());
        let dest = data_root.join(dir).join(relative);

        match place_file(&src, &dest, mode) {
            Ok(Placement::Placed) => report.placed += 1,
            Ok(Placement::Replaced) => {
                warn!("{}: replaced stale copy", dest.display());
                report.replaced += 1;
            }
            Ok(Placement::AlreadyPresent) => report.already_present += 1,
            Err(e) => {
                warn!("{}: skipped, {e}", src.display());
                report.failed += 1;
            }
        }
    }

    info!(
        "split {selection}: {} placed, {} replaced, {} already present, {} unlabeled, {} failed",
        report.placed, report.replaced, report.already_present, report.unlabeled, report.failed
    );
    Ok(report)
}

#[derive(Debug, PartialEq, Eq)]
enum Placement {
    Placed,
    Replaced,
    AlreadyPresent,
}

fn place_file(src: &Path, dest: &Path, mode: SplitMode) -> Result<Placement> {
    let mut placement = Placement::Placed;
    if dest.is_file() {
        if same_contents(src, dest)? {
            if mode == SplitMode::Move {
                fs::remove_file(src)?;
            }
            return Ok(Placement::AlreadyPresent);
        }
        placement = Placement::Replaced;
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::write(parent, e))?;
    }
    match mode {
        SplitMode::Copy => copy_atomic(src, dest)?,
        SplitMode::Move => {
            if fs::rename(src, dest).is_err() {
                // Cross-device: fall back to copy + delete.
                copy_atomic(src, dest)?;
                fs::remove_file(src)?;
            }
        }
    }
    Ok(placement)
}

/// Copy through a `.partial` sibling, then rename into place.
fn copy_atomic(src: &Path, dest: &Path) -> Result<()> {
    let mut partial = dest.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);
    if let Err(e) = fs::copy(src, &partial).and_then(|_| fs::rename(&partial, dest)) {
        if let Err(cleanup) = fs::remove_file(&partial) {
            debug!("{}: not removed: {cleanup}", partial.display());
        }
        return Err(Error::write(dest, e));
    }
    Ok(())
}

fn same_contents(a: &Path, b: &Path) -> Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }
    Ok(fs::read(a)? == fs::read(b)?)
}
