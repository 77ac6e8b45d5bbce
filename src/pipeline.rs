//! The upload pipeline and its batch entry points.
//!
//! A [`Pipeline`] bundles the read-only context every operation needs: the
//! [`UploadConfig`], a [`BlobStore`], a [`Codec`] and a [`Clock`]. It holds no
//! mutable state, so one pipeline can serve any number of uploads, including
//! from rayon workers.
//!
//! The stages live in their own modules as further `impl Pipeline` blocks:
//!
//! ```text
//! UploadedFile ──validate──▶ Validated ──crop──▶ ProcessingFile ──process──▶ Vec<Artifact>
//!              (staging.rs)             (crop.rs)                (versions.rs)
//! ```
//!
//! This module adds the entry points that chain them: [`Pipeline::ingest`] for
//! one file end to end, and [`Pipeline::upload`] / [`Pipeline::upload_all`]
//! for validating a whole request.

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::imaging::Codec;
use crate::naming::{Clock, SystemClock};
use crate::store::BlobStore;
use crate::types::{CleanupFailure, ProcessOptions, Processed, UploadedFile, Validated};
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, warn};

static SYSTEM_CLOCK: SystemClock = SystemClock;

/// Read-only context for pipeline operations.
pub struct Pipeline<'a, S: BlobStore, C: Codec> {
    pub(crate) config: &'a UploadConfig,
    pub(crate) store: &'a S,
    pub(crate) codec: &'a C,
    pub(crate) clock: &'a dyn Clock,
}

/// Validation result for one file of a batch.
#[derive(Debug)]
pub struct FileOutcome {
    pub declared_name: String,
    pub result: Result<Validated, UploadError>,
}

impl<'a, S: BlobStore, C: Codec> Pipeline<'a, S, C> {
    pub fn new(config: &'a UploadConfig, store: &'a S, codec: &'a C) -> Self {
        Self {
            config,
            store,
            codec,
            clock: &SYSTEM_CLOCK,
        }
    }

    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &UploadConfig {
        self.config
    }

    /// Whether `file` arrived in one of the configured input fields.
    pub fn accepts(&self, file: &UploadedFile) -> bool {
        self.config
            .input_fields
            .iter()
            .any(|field| *field == file.field_name)
    }

    /// Validate every accepted file in order, stopping at the first failure.
    ///
    /// On failure, processing files already promoted by this call, and any
    /// originals preserved alongside them, are removed before the error is
    /// returned, so a failed request leaves nothing behind.
    pub fn upload(&self, files: &[UploadedFile]) -> Result<Vec<Validated>, UploadError> {
        let mut validated: Vec<Validated> = Vec::new();
        for file in files.iter().filter(|f| self.accepts(f)) {
            match self.validate(file) {
                Ok(v) => validated.push(v),
                Err(e) => {
                    for v in &validated {
                        self.remove_logged(&v.file.path);
                        if let Some(original) = &v.original {
                            self.remove_logged(&original.path);
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(validated)
    }

    /// Validate every accepted file independently, in parallel.
    ///
    /// One outcome per accepted file, in input order. A failure never affects
    /// its siblings.
    pub fn upload_all(&self, files: &[UploadedFile]) -> Vec<FileOutcome> {
        let accepted: Vec<&UploadedFile> = files.iter().filter(|f| self.accepts(f)).collect();
        accepted
            .par_iter()
            .map(|file| FileOutcome {
                declared_name: file.declared_name.clone(),
                result: self.validate(file),
            })
            .collect()
    }

    /// Validate, crop and version a single upload.
    ///
    /// When the original was preserved under a renamed file name, its name is
    /// passed on so `date` versions share its timestamp.
    pub fn ingest(
        &self,
        upload: &UploadedFile,
        options: &ProcessOptions,
    ) -> Result<Processed, UploadError> {
        let validated = self.validate(upload)?;
        let file = self.crop(validated.file, options.crop)?;

        let mut options = options.clone();
        if options.original_name.is_none() && self.config.originals.rename {
            options.original_name = validated.original.as_ref().map(|a| a.name.clone());
        }

        let versions = self.process(file, &options)?;
        Ok(Processed {
            original: validated.original,
            versions,
            cleanup: validated.cleanup,
        })
    }

    /// Delete `path`, logging instead of failing.
    pub(crate) fn remove_logged(&self, path: &Path) -> Option<CleanupFailure> {
        match self.store.delete(path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cleanup failed");
                Some(CleanupFailure {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::CropRect;
    use crate::imaging::backend::tests::{MockCodec, RecordedOp};
    use crate::mime::ImageKind;
    use crate::naming::FixedClock;
    use crate::store::tests::MemoryStore;
    use crate::test_helpers::{TS, jpeg_bytes, png_bytes, seed_upload, test_config};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Advances one millisecond per reading.
    struct SteppingClock(AtomicU64);

    impl Clock for SteppingClock {
        fn now_millis(&self) -> u64 {
            self.0.fetch_add(1, Ordering::SeqCst)
        }
    }

    fn upload_of(field: &str, name: &str) -> UploadedFile {
        UploadedFile {
            field_name: field.to_string(),
            temp_path: PathBuf::from("/upload").join(name),
            declared_name: name.to_string(),
            declared_size: 100,
        }
    }

    // =========================================================================
    // accepts
    // =========================================================================

    #[test]
    fn accepts_only_configured_fields() {
        let config = test_config(Path::new("/site"));
        let store = MemoryStore::new();
        let codec = MockCodec::new();
        let pipeline = Pipeline::new(&config, &store, &codec);

        assert!(pipeline.accepts(&upload_of("photo", "a.jpg")));
        assert!(!pipeline.accepts(&upload_of("avatar", "a.jpg")));
    }

    // =========================================================================
    // upload (fail-fast)
    // =========================================================================

    #[test]
    fn upload_validates_accepted_files_in_order() {
        let config = test_config(Path::new("/site"));
        let (store, a) = seed_upload(MemoryStore::new(), "a.jpg", &jpeg_bytes(8, 8));
        let (store, b) = seed_upload(store, "b.png", &png_bytes(8, 8));
        let mut ignored = b.clone();
        ignored.field_name = "other".into();
        let codec = MockCodec::with_dimensions(8, 8);
        let clock = FixedClock(TS);
        let pipeline = Pipeline::new(&config, &store, &codec).with_clock(&clock);

        let validated = pipeline.upload(&[a, ignored, b]).unwrap();
        let names: Vec<_> = validated.iter().map(|v| v.file.name.as_str()).collect();
        assert_eq!(
            names,
            vec![format!("a_{TS}.jpg"), format!("b_{TS}.png")]
        );
    }

    #[test]
    fn upload_fail_fast_removes_promoted_files() {
        let config = test_config(Path::new("/site"));
        let (store, good) = seed_upload(MemoryStore::new(), "good.jpg", &jpeg_bytes(8, 8));
        let (store, bad) = seed_upload(store, "bad.jpg", b"%PDF-1.4 not an image");
        let (store, never) = seed_upload(store, "never.png", &png_bytes(8, 8));
        let codec = MockCodec::with_dimensions(8, 8);
        let clock = FixedClock(TS);
        let pipeline = Pipeline::new(&config, &store, &codec).with_clock(&clock);

        let err = pipeline.upload(&[good, bad, never]).unwrap_err();
        assert!(matches!(err, UploadError::NotAnImage { ref name, .. } if name == "bad.jpg"));
        assert!(store.paths_under(&config.processing_path()).is_empty());
        // The third file was never identified
        assert_eq!(
            codec
                .get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Identify(_)))
                .count(),
            1
        );
    }

    #[test]
    fn upload_fail_fast_removes_preserved_originals() {
        let mut config = test_config(Path::new("/site"));
        config.originals.preserve = true;
        let (store, good) = seed_upload(MemoryStore::new(), "good.jpg", &jpeg_bytes(8, 8));
        let (store, bad) = seed_upload(store, "bad.jpg", b"plain text");
        let codec = MockCodec::with_dimensions(8, 8);
        let pipeline = Pipeline::new(&config, &store, &codec);

        assert!(pipeline.upload(&[good, bad]).is_err());
        assert!(store.paths_under(&config.originals_path()).is_empty());
        assert!(store.paths_under(&config.processing_path()).is_empty());
        assert_eq!(store.deletes_of(&config.originals_path().join("good.jpg")), 1);
    }

    // =========================================================================
    // upload_all (collect)
    // =========================================================================

    #[test]
    fn upload_all_reports_each_file() {
        let config = test_config(Path::new("/site"));
        let (store, good) = seed_upload(MemoryStore::new(), "good.jpg", &jpeg_bytes(8, 8));
        let (store, bad) = seed_upload(store, "bad.jpg", b"plain text");
        let (store, also_good) = seed_upload(store, "also.png", &png_bytes(8, 8));
        let codec = MockCodec::with_dimensions(8, 8);
        let pipeline = Pipeline::new(&config, &store, &codec);

        let outcomes = pipeline.upload_all(&[good, bad, also_good]);
        let names: Vec<_> = outcomes.iter().map(|o| o.declared_name.as_str()).collect();
        assert_eq!(names, vec!["good.jpg", "bad.jpg", "also.png"]);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(UploadError::NotAnImage { .. })
        ));
        assert!(outcomes[2].result.is_ok());
        assert_eq!(store.paths_under(&config.processing_path()).len(), 2);
    }

    // =========================================================================
    // ingest
    // =========================================================================

    #[test]
    fn ingest_runs_all_stages() {
        let config = test_config(Path::new("/site"));
        let (store, upload) = seed_upload(MemoryStore::new(), "me.png", &png_bytes(800, 600));
        let codec = MockCodec::with_dimensions(800, 600);
        let clock = FixedClock(TS);
        let pipeline = Pipeline::new(&config, &store, &codec).with_clock(&clock);

        let options = ProcessOptions {
            crop: Some(CropRect::new(0, 0, 400, 400)),
            ..ProcessOptions::default()
        };
        let processed = pipeline.ingest(&upload, &options).unwrap();

        let sizes: Vec<_> = processed
            .versions
            .iter()
            .map(|a| (a.version.as_deref().unwrap_or(""), a.width, a.height))
            .collect();
        assert_eq!(
            sizes,
            vec![("thmb", 32, 32), ("profile", 200, 200), ("full", 400, 400)]
        );
        assert!(processed.original.is_none());
        assert!(store.paths_under(&config.processing_path()).is_empty());
        assert!(store.paths_under(&config.staging_dir).is_empty());
        assert!(codec.get_operations().contains(&RecordedOp::Crop {
            kind: ImageKind::Png,
            rect: CropRect::new(0, 0, 400, 400)
        }));
    }

    #[test]
    fn ingest_date_versions_share_renamed_original_timestamp() {
        let mut config = test_config(Path::new("/site"));
        config.originals.preserve = true;
        config.originals.rename = true;
        config.versions = vec![crate::config::VersionSpec::new("thmb", Some(4), Some(4))];
        let (store, upload) = seed_upload(MemoryStore::new(), "cat.jpg", &jpeg_bytes(8, 8));
        let codec = MockCodec::with_dimensions(8, 8);
        let clock = SteppingClock(AtomicU64::new(TS));
        let pipeline = Pipeline::new(&config, &store, &codec).with_clock(&clock);

        let processed = pipeline.ingest(&upload, &ProcessOptions::default()).unwrap();
        let original = processed.original.unwrap();
        assert_eq!(original.name, format!("cat_{TS}.jpg"));
        assert_eq!(processed.versions[0].name, format!("{TS}_thmb.jpg"));
    }
}
