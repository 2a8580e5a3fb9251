//! Bounded-count retention with permanent pin exemptions.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::store::{ArtifactEntry, RollingStore};
use crate::types::StorageError;

/// Decides whether an artifact is exempt from count-based eviction.
pub type PinPredicate = Arc<dyn Fn(&ArtifactEntry) -> bool + Send + Sync>;

/// How many unpinned artifacts a rolling directory may keep, and which
/// artifacts are exempt. Applied after every successful capture.
#[derive(Clone)]
pub struct RetentionPolicy {
    max_count: usize,
    pin: PinPredicate,
}

impl RetentionPolicy {
    /// Keep at most `max_count` unpinned artifacts; nothing pinned.
    /// `max_count` positivity is enforced at config validation.
    pub fn keep(max_count: usize) -> Self {
        Self {
            max_count,
            pin: Arc::new(|_| false),
        }
    }

    /// Pin artifacts whose file name starts with `prefix` (e.g. lightning
    /// frames named `THUNDER_…`). Pinned artifacts are excluded from the
    /// count and never auto-deleted.
    pub fn with_pin_prefix(self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.with_pin(move |entry: &ArtifactEntry| entry.file_name.starts_with(&prefix))
    }

    /// Pin by arbitrary predicate.
    pub fn with_pin<F>(mut self, pin: F) -> Self
    where
        F: Fn(&ArtifactEntry) -> bool + Send + Sync + 'static,
    {
        self.pin = Arc::new(pin);
        self
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    pub fn is_pinned(&self, entry: &ArtifactEntry) -> bool {
        (self.pin)(entry)
    }
}

impl fmt::Debug for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetentionPolicy")
            .field("max_count", &self.max_count)
            .finish_non_exhaustive()
    }
}

/// What one retention pass did.
#[derive(Debug, Default)]
pub struct EvictionReport {
    pub evicted: Vec<PathBuf>,
    pub kept: usize,
    pub pinned: usize,
}

impl RollingStore {
    /// Apply `policy` to this directory.
    ///
    /// Unpinned artifacts beyond the newest `max_count` are deleted,
    /// newest-first by capture instant. Idempotent: a second consecutive
    /// pass with no new artifacts evicts nothing. Deletions are best-effort;
    /// a failure is logged and skipped, and the pass after the next capture
    /// retries it.
    pub fn enforce(&self, policy: &RetentionPolicy) -> Result<EvictionReport, StorageError> {
        let entries = self
            .entries()
            .map_err(|e| StorageError::EvictionFailed(e.to_string()))?;
        let (pinned, mut unpinned): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|e| policy.is_pinned(e));
        unpinned.sort_by(|a, b| {
            b.captured_at
                .cmp(&a.captured_at)
                .then_with(|| b.file_name.cmp(&a.file_name))
        });

        let mut evicted = Vec::new();
        for stale in unpinned.iter().skip(policy.max_count()) {
            match fs::remove_file(&stale.path) {
                Ok(()) => evicted.push(stale.path.clone()),
                // Already gone is not a failure.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!("retention could not remove {}: {e}", stale.path.display());
                }
            }
        }

        Ok(EvictionReport {
            evicted,
            kept: unpinned.len().min(policy.max_count()),
            pinned: pinned.len(),
        })
    }
}
