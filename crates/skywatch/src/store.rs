//! Artifact stores: single-slot latest snapshot and rolling time-named files.
//!
//! Each store exclusively owns its directory: one scheduler per store, no
//! locking. External readers are tolerated because every write lands via an
//! atomic rename.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::types::StorageError;

/// Timestamp layout embedded in rolling file names, one-second resolution.
const INSTANT_FORMAT: &str = "%Y%m%d_%H%M%S";

/// One file in a rolling directory, as seen by the retention policy.
#[derive(Debug, Clone)]
pub struct ArtifactEntry {
    pub path: PathBuf,
    pub file_name: String,
    /// Parsed from the embedded timestamp; falls back to filesystem mtime
    /// for names that don't carry one.
    pub captured_at: DateTime<Utc>,
    pub size: u64,
}

/// Single-slot cache holding only the most recently validated artifact.
#[derive(Debug, Clone)]
pub struct LatestSnapshotStore {
    dir: PathBuf,
    file_name: String,
}

impl LatestSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
        }
    }

    /// The fixed path readers observe.
    pub fn target_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Atomically replace the snapshot.
    ///
    /// Writes a temporary sibling first, then renames over the target;
    /// rename within one directory is atomic, so a reader sees the old
    /// complete file or the new one, never a partial write. Callers must
    /// only hand in validated payloads; an empty or failed fetch never
    /// reaches this method.
    pub fn put_latest(&self, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.dir)?;
        let target = self.target_path();
        let tmp = self.dir.join(format!(".{}.tmp", self.file_name));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &target)?;
        Ok(target)
    }
}

/// Directory accumulating timestamped artifacts under a retention policy.
#[derive(Debug, Clone)]
pub struct RollingStore {
    dir: PathBuf,
    prefix: String,
    extension: String,
}

impl RollingStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            extension: extension.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_name(&self, captured_at: DateTime<Utc>, seq: u32) -> String {
        let stamp = captured_at.format(INSTANT_FORMAT);
        if seq == 0 {
            format!("{}{}.{}", self.prefix, stamp, self.extension)
        } else {
            format!("{}{}-{}.{}", self.prefix, stamp, seq, self.extension)
        }
    }

    /// Store one artifact under its capture instant.
    ///
    /// Same-second collisions: a byte-identical write is a no-op returning
    /// the existing path; differing content lands under a `-1`, `-2`, …
    /// suffix. Existing data is never silently clobbered.
    pub fn put(&self, bytes: &[u8], captured_at: DateTime<Utc>) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.dir)?;
        let mut seq = 0u32;
        let path = loop {
            let name = self.entry_name(captured_at, seq);
            let candidate = self.dir.join(&name);
            if !candidate.exists() {
                break candidate;
            }
            if fs::read(&candidate)
                .map(|existing| existing == bytes)
                .unwrap_or(false)
            {
                return Ok(candidate);
            }
            seq += 1;
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.entry_name(captured_at, seq));
        let tmp = self.dir.join(format!(".{name}.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    /// Reserve a non-clobbering output path for an external writer (the
    /// capture command writes the file itself). Applies the same suffixing
    /// rule as [`put`](Self::put) against existing files.
    pub fn claim_path(&self, captured_at: DateTime<Utc>) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.dir)?;
        let mut seq = 0u32;
        loop {
            let candidate = self.dir.join(self.entry_name(captured_at, seq));
            if !candidate.exists() {
                return Ok(candidate);
            }
            seq += 1;
        }
    }

    /// List the directory as retention sees it.
    ///
    /// Dotfiles (in-flight temporaries) are skipped. Capture instants come
    /// from the embedded timestamp; files without one fall back to mtime so
    /// foreign files are still governed by the policy.
    pub fn entries(&self) -> Result<Vec<ArtifactEntry>, StorageError> {
        let mut out = Vec::new();
        if !self.dir.exists() {
            return Ok(out);
        }
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.starts_with('.') {
                continue;
            }
            let captured_at = find_instant(&file_name)
                .map(|naive| Utc.from_utc_datetime(&naive))
                .or_else(|| meta.modified().ok().map(DateTime::<Utc>::from))
                .unwrap_or_else(Utc::now);
            out.push(ArtifactEntry {
                path: entry.path(),
                file_name,
                captured_at,
                size: meta.len(),
            });
        }
        Ok(out)
    }
}

/// Scan a file name for an embedded `YYYYmmdd_HHMMSS` stamp. Works for any
/// prefix, so pinned artifacts named by other writers still sort correctly.
fn find_instant(file_name: &str) -> Option<NaiveDateTime> {
    let len = file_name.len();
    for start in 0..len.saturating_sub(14) {
        if let Some(window) = file_name.get(start..start + 15) {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(window, INSTANT_FORMAT) {
                return Some(parsed);
            }
        }
    }
    None
}
