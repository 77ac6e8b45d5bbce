//! Upload pipeline configuration.
//!
//! Handles loading, validating, and merging `imgstage.toml`. Stock defaults
//! are the base layer; the user file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! doc_root = "public"                  # Web document root
//! url_root = "/"                       # URL prefix for doc_root
//! rel_path = ""                        # Extra URL segment after url_root
//! staging_dir = "tmp/staging"          # Scratch space, not under doc_root
//! processing_dir = "images/processing" # Relative to doc_root
//! upload_dir = "images/uploaded"       # Relative to doc_root
//! separator = "_"                      # Between base name and version name
//! naming_convention = "date"           # date | original | custom
//! directories = "single"               # single | version
//! max_size_kb = 5126                   # Largest accepted upload
//! input_fields = ["photo"]             # Form fields carrying uploads
//!
//! [[versions]]                         # Processed in order
//! name = "thmb"
//! width = 32
//! height = 32
//!
//! [quality]
//! jpeg = 80                            # 0-100
//! png = 9                              # 0-9
//!
//! [gif]
//! transparent = true
//!
//! [originals]
//! preserve = false
//! rename = false
//! convention = "date"
//! separator = "_"
//! dir = "images/originals"
//!
//! [processing]
//! max_processes = 4                    # Omit for auto = CPU cores
//! ```
//!
//! Tables merge key-by-key over the defaults; arrays replace them, so a user
//! `[[versions]]` list is the complete list. Unknown keys are rejected to
//! catch typos early.

use crate::imaging::{EncodeSettings, Fit, PngCompression, Quality};
use crate::mime::ImageKind;
use crate::naming::{DirectoryMode, NamingConvention};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "imgstage.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `imgstage.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Filesystem directory served as the web root.
    pub doc_root: PathBuf,
    /// URL under which `doc_root` is served.
    pub url_root: String,
    /// Extra path segment inserted after `url_root` in every URL.
    pub rel_path: String,
    /// Scratch directory for staged uploads. Never served.
    pub staging_dir: PathBuf,
    /// Where validated files wait for cropping, relative to `doc_root`.
    pub processing_dir: PathBuf,
    /// Where versions are written, relative to `doc_root`.
    pub upload_dir: PathBuf,
    /// Joins the base name and version name in `single` mode.
    pub separator: String,
    pub naming_convention: NamingConvention,
    pub directories: DirectoryMode,
    pub max_size_kb: u64,
    /// Upload form fields the pipeline consumes; others are ignored.
    pub input_fields: Vec<String>,
    pub versions: Vec<VersionSpec>,
    pub quality: QualityConfig,
    pub gif: GifConfig,
    pub originals: OriginalsConfig,
    pub processing: ProcessingConfig,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            doc_root: PathBuf::from("public"),
            url_root: "/".to_string(),
            rel_path: String::new(),
            staging_dir: PathBuf::from("tmp/staging"),
            processing_dir: PathBuf::from("images/processing"),
            upload_dir: PathBuf::from("images/uploaded"),
            separator: "_".to_string(),
            naming_convention: NamingConvention::Date,
            directories: DirectoryMode::Single,
            max_size_kb: 5126,
            input_fields: vec!["photo".to_string()],
            versions: vec![
                VersionSpec::new("thmb", Some(32), Some(32)),
                VersionSpec::new("profile", Some(200), None),
                VersionSpec::new("full", None, None),
            ],
            quality: QualityConfig::default(),
            gif: GifConfig::default(),
            originals: OriginalsConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl UploadConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quality.jpeg > 100 {
            return Err(ConfigError::Validation("quality.jpeg must be 0-100".into()));
        }
        if self.quality.png > 9 {
            return Err(ConfigError::Validation("quality.png must be 0-9".into()));
        }
        if self.max_size_kb == 0 {
            return Err(ConfigError::Validation(
                "max_size_kb must be greater than 0".into(),
            ));
        }
        validate_separator("separator", &self.separator)?;
        validate_separator("originals.separator", &self.originals.separator)?;

        let mut seen = HashSet::new();
        for version in &self.versions {
            let valid_chars = version
                .name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
            if version.name.is_empty() || !valid_chars {
                return Err(ConfigError::Validation(format!(
                    "version name {:?} must be non-empty and use only a-z, 0-9, _ and -",
                    version.name
                )));
            }
            if !seen.insert(version.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate version name {:?}",
                    version.name
                )));
            }
        }
        Ok(())
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_kb.saturating_mul(1024)
    }

    pub fn processing_path(&self) -> PathBuf {
        self.doc_root.join(&self.processing_dir)
    }

    pub fn upload_path(&self) -> PathBuf {
        self.doc_root.join(&self.upload_dir)
    }

    pub fn originals_path(&self) -> PathBuf {
        self.doc_root.join(&self.originals.dir)
    }

    /// Public URL of `name` in `rel_dir` (relative to `doc_root`).
    ///
    /// `url_root + rel_path + rel_dir + "/" + name`, with exactly one slash
    /// between segments.
    pub fn url_for(&self, rel_dir: &Path, name: &str) -> String {
        let mut url = format!("{}{}", self.url_root, self.rel_path);
        let segments = rel_dir
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .chain(std::iter::once(name.to_string()));
        for segment in segments {
            let segment = segment.trim_matches('/');
            if segment.is_empty() {
                continue;
            }
            if !url.ends_with('/') {
                url.push('/');
            }
            url.push_str(segment);
        }
        url
    }

    /// Encoder settings for output of `kind`.
    pub fn encode_settings(&self, kind: ImageKind) -> EncodeSettings {
        EncodeSettings {
            kind,
            jpeg_quality: Quality::new(self.quality.jpeg),
            png_compression: PngCompression::new(self.quality.png),
            gif_transparent: self.gif.transparent,
        }
    }
}

fn validate_separator(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() || value.contains(['/', '\\']) {
        return Err(ConfigError::Validation(format!(
            "{key} must be non-empty and contain no path separators"
        )));
    }
    Ok(())
}

/// One derived version of every upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionSpec {
    pub name: String,
    /// Target width; absent or 0 derives it from the height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Target height; absent or 0 derives it from the width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default)]
    pub fit: Fit,
}

impl VersionSpec {
    pub fn new(name: &str, width: Option<u32>, height: Option<u32>) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            fit: Fit::Stretch,
        }
    }

    pub fn with_fit(mut self, fit: Fit) -> Self {
        self.fit = fit;
        self
    }
}

/// Encoder quality knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    /// JPEG quality (0-100).
    pub jpeg: u32,
    /// PNG compression level (0-9).
    pub png: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self { jpeg: 80, png: 9 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GifConfig {
    /// Keep GIF output on a transparent canvas instead of flattening it.
    pub transparent: bool,
}

impl Default for GifConfig {
    fn default() -> Self {
        Self { transparent: true }
    }
}

/// Preservation of the uploaded file next to its versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OriginalsConfig {
    pub preserve: bool,
    /// Rebuild the stored name instead of keeping the declared one.
    pub rename: bool,
    pub convention: NamingConvention,
    pub separator: String,
    /// Relative to `doc_root`.
    pub dir: PathBuf,
}

impl Default for OriginalsConfig {
    fn default() -> Self {
        Self {
            preserve: false,
            rename: false,
            convention: NamingConvention::Date,
            separator: "_".to_string(),
            dir: PathBuf::from("images/originals"),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of files validated in parallel by a batch.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.clamp(1, cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(UploadConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay, arrays included, replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as raw TOML. A missing file is `Ok(None)`.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto `base`, deserialize, and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<UploadConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: UploadConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `path` over the stock defaults. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<UploadConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// A fully commented `imgstage.toml` with every default spelled out.
pub fn stock_config_toml() -> &'static str {
    r##"# imgstage configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Filesystem directory served as the web root.
doc_root = "public"

# URL prefix under which doc_root is served, and an extra segment after it.
url_root = "/"
rel_path = ""

# Scratch directory for staged uploads. Keep it outside doc_root.
staging_dir = "tmp/staging"

# Validated uploads wait here until cropped and versioned (under doc_root).
processing_dir = "images/processing"

# Generated versions are written here (under doc_root).
upload_dir = "images/uploaded"

# Joins base name and version name: 1377287616449_thmb.jpg
separator = "_"

# Base name of generated versions:
#   date     -> upload time in epoch milliseconds
#   original -> sanitized name of the uploaded file
#   custom   -> sanitized name supplied by the caller
naming_convention = "date"

# single  -> all versions in upload_dir, version name in the file name
# version -> one subdirectory of upload_dir per version
directories = "single"

# Largest accepted upload, in KiB.
max_size_kb = 5126

# Upload form fields the pipeline consumes.
input_fields = ["photo"]

# ---------------------------------------------------------------------------
# Versions, processed in order. A list here replaces the whole default list.
# Omit width or height (or set it to 0) to derive it from the aspect ratio.
# fit = "stretch" resizes to exactly the planned size;
# fit = "fill" covers the planned size and center-crops the overflow.
# ---------------------------------------------------------------------------
[[versions]]
name = "thmb"
width = 32
height = 32
fit = "stretch"

[[versions]]
name = "profile"
width = 200
fit = "stretch"

[[versions]]
name = "full"
fit = "stretch"

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[quality]
# JPEG quality (0 = worst, 100 = best).
jpeg = 80
# PNG compression level (0 = fastest, 9 = smallest).
png = 9

[gif]
# Keep GIF transparency. When false, GIFs are flattened onto white.
transparent = true

# ---------------------------------------------------------------------------
# Original files
# ---------------------------------------------------------------------------
[originals]
# Store the uploaded file as-is next to its versions.
preserve = false
# Rebuild the stored name (sanitized stem, plus timestamp under "date").
rename = false
convention = "date"
separator = "_"
# Under doc_root.
dir = "images/originals"

# ---------------------------------------------------------------------------
# Parallel processing
# ---------------------------------------------------------------------------
[processing]
# Maximum files validated in parallel by a batch upload.
# Omit to use all CPU cores. Values above the core count are clamped.
# max_processes = 4
"##
}
