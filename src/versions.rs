//! Producing the configured versions of a processing file.
//!
//! Versions are produced strictly one after another, in configuration order,
//! and the first failure stops the run. The processing file is deleted once
//! the run ends, however it ends.

use crate::config::VersionSpec;
use crate::error::UploadError;
use crate::imaging::{Codec, PlanError, ResizeParams, plan_dimensions};
use crate::naming::{self, DirectoryMode, NamingConvention};
use crate::pipeline::Pipeline;
use crate::store::BlobStore;
use crate::types::{Artifact, ProcessOptions, ProcessingFile};
use std::path::PathBuf;
use tracing::{debug, info};

impl<S: BlobStore, C: Codec> Pipeline<'_, S, C> {
    /// Produce the configured versions with the configured naming.
    pub fn process(
        &self,
        file: ProcessingFile,
        options: &ProcessOptions,
    ) -> Result<Vec<Artifact>, UploadError> {
        self.process_versions(
            file,
            &self.config.versions,
            self.config.naming_convention,
            self.config.directories,
            options,
        )
    }

    /// Produce `versions` of `file`, then delete `file`.
    pub fn process_versions(
        &self,
        file: ProcessingFile,
        versions: &[VersionSpec],
        convention: NamingConvention,
        mode: DirectoryMode,
        options: &ProcessOptions,
    ) -> Result<Vec<Artifact>, UploadError> {
        let result = self.produce_versions(&file, versions, convention, mode, options);
        self.remove_logged(&file.path);
        result
    }

    fn produce_versions(
        &self,
        file: &ProcessingFile,
        versions: &[VersionSpec],
        convention: NamingConvention,
        mode: DirectoryMode,
        options: &ProcessOptions,
    ) -> Result<Vec<Artifact>, UploadError> {
        if file.width == 0 || file.height == 0 {
            return Err(UploadError::InvalidSourceDimensions {
                path: file.path.clone(),
                width: file.width,
                height: file.height,
            });
        }

        let bytes = self
            .store
            .read(&file.path)
            .map_err(|source| UploadError::Read {
                name: file.name.clone(),
                source,
            })?;

        let originals = &self.config.originals;
        let family = options
            .original_name
            .as_deref()
            .filter(|_| originals.rename)
            .map(|name| (name, originals.separator.as_str()));
        let base = naming::base_name(
            convention,
            &file.declared_name,
            options.custom_name.as_deref(),
            family,
            self.clock,
        );
        let ext = file.kind.canonical_extension();
        let encode = self.config.encode_settings(file.kind);
        debug!(base = %base, count = versions.len(), "Producing versions");

        let mut artifacts = Vec::with_capacity(versions.len());
        for version in versions {
            let (width, height) =
                plan_dimensions(version.width, version.height, file.width, file.height).map_err(
                    |PlanError::InvalidSourceDimensions { width, height }| {
                        UploadError::InvalidSourceDimensions {
                            path: file.path.clone(),
                            width,
                            height,
                        }
                    },
                )?;

            let (subdir, name) =
                naming::version_file_name(&base, &version.name, ext, &self.config.separator, mode);
            let rel_dir: PathBuf = match subdir {
                Some(dir) => self.config.upload_dir.join(dir),
                None => self.config.upload_dir.clone(),
            };
            let path = self.config.doc_root.join(&rel_dir).join(&name);

            let params = ResizeParams {
                width,
                height,
                fit: version.fit,
                encode,
            };
            let encoded = self
                .codec
                .resize(&bytes, file.kind, &params)
                .map_err(|source| UploadError::Encode {
                    path: path.clone(),
                    source,
                })?;
            self.store
                .write(&path, &encoded)
                .map_err(|source| UploadError::Write {
                    path: path.clone(),
                    source,
                })?;
            info!(version = %version.name, path = %path.display(), width, height, "Version written");

            artifacts.push(Artifact {
                url: self.config.url_for(&rel_dir, &name),
                name,
                path,
                width,
                height,
                mime: file.mime().to_string(),
                version: Some(version.name.clone()),
            });
        }
        Ok(artifacts)
    }
}
