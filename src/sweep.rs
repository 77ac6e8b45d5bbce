//! Reaping abandoned staging and processing files.
//!
//! A processing file normally lives only until its versions are produced,
//! but a user who uploads and never finishes cropping leaves one behind, and
//! a crash can strand staged copies. Both kinds of name end in the upload's
//! epoch-millisecond timestamp (`holiday_pic_1377287616449.jpg`), which is
//! all the sweeper needs to judge their age. Files without a timestamp are
//! never touched.
//!
//! [`BlobStore`] has no listing operation, so candidates are found by walking
//! the local directory; every delete still goes through the store.

use crate::imaging::Codec;
use crate::naming;
use crate::pipeline::Pipeline;
use crate::store::BlobStore;
use crate::types::CleanupFailure;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Separator between stem and timestamp in staging and processing names.
const STAMP_SEPARATOR: &str = "_";

#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepReport {
    pub removed: Vec<PathBuf>,
    /// Files left alone: too young or without a timestamp.
    pub kept: usize,
    pub failed: Vec<CleanupFailure>,
}

impl SweepReport {
    pub fn merge(&mut self, other: SweepReport) {
        self.removed.extend(other.removed);
        self.kept += other.kept;
        self.failed.extend(other.failed);
    }
}

/// Delete files under `dir` whose embedded timestamp is older than `max_age`
/// at `now_millis`. A missing directory is an empty sweep.
pub fn sweep_stale<S: BlobStore>(
    store: &S,
    dir: &Path,
    max_age: Duration,
    now_millis: u64,
) -> SweepReport {
    let mut report = SweepReport::default();
    if !dir.is_dir() {
        return report;
    }
    let cutoff = now_millis.saturating_sub(max_age.as_millis() as u64);

    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(dir).to_path_buf();
                warn!(path = %path.display(), error = %e, "Sweep could not read entry");
                report.failed.push(CleanupFailure {
                    path,
                    message: e.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        let stale = naming::extract_timestamp(&name, STAMP_SEPARATOR)
            .is_some_and(|stamp| stamp < cutoff);
        if !stale {
            report.kept += 1;
            continue;
        }

        match store.delete(entry.path()) {
            Ok(()) => {
                info!(path = %entry.path().display(), "Swept stale file");
                report.removed.push(entry.path().to_path_buf());
            }
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Sweep failed to remove");
                report.failed.push(CleanupFailure {
                    path: entry.path().to_path_buf(),
                    message: e.to_string(),
                });
            }
        }
    }
    report
}

impl<S: BlobStore, C: Codec> Pipeline<'_, S, C> {
    /// Sweep the staging and processing directories.
    pub fn sweep(&self, max_age: Duration) -> SweepReport {
        let now = self.clock.now_millis();
        let mut report = sweep_stale(self.store, &self.config.staging_dir, max_age, now);
        report.merge(sweep_stale(
            self.store,
            &self.config.processing_path(),
            max_age,
            now,
        ));
        report
    }
}
