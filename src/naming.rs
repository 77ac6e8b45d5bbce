//! File naming for every artifact the pipeline writes.
//!
//! Names are derived, never trusted. Whatever a client calls its file, the
//! name that lands on disk is rebuilt from a sanitized stem, a separator, a
//! millisecond timestamp and/or a version name:
//!
//! ```text
//! staging      holiday photo.JPG  →  holiday_photo_1377287616449.jpg
//! original     holiday photo.JPG  →  holiday_photo_1377287616449.jpg   (rename, date)
//!                                 →  holiday_photo.jpg                  (rename, original)
//!                                 →  holiday photo.JPG                  (no rename)
//! version      base=1377287616449 →  1377287616449_thmb.jpg            (single dir)
//!                                 →  thmb/1377287616449.jpg            (version dirs)
//! ```
//!
//! Everything here is pure except the timestamp, which comes from a
//! [`Clock`] so tests can pin it.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Stem used when sanitizing leaves nothing behind.
pub const EMPTY_STEM: &str = "_tmp";

/// Strategy for deriving the base name of generated versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingConvention {
    /// Epoch milliseconds at processing time.
    Date,
    /// Sanitized stem of the uploaded file's declared name.
    Original,
    /// Sanitized caller-supplied name.
    Custom,
}

/// How versions of the same upload are told apart on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryMode {
    /// One directory, version name appended to the file name.
    Single,
    /// One subdirectory per version, identical file names.
    Version,
}

/// Source of epoch-millisecond timestamps.
pub trait Clock: Sync {
    fn now_millis(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.0
    }
}

/// Lower-case a name and replace anything outside `[a-z0-9_-]` with `_`.
///
/// Each offending character becomes exactly one underscore, so `"é"` maps to
/// `"_"`. An empty input yields [`EMPTY_STEM`].
pub fn sanitize(name: &str) -> String {
    if name.is_empty() {
        return EMPTY_STEM.to_string();
    }
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Lower-cased extension after the last dot, or `""` when there is none.
///
/// Unlike [`std::path::Path::extension`], a leading dot counts: `".jpg"` has
/// extension `"jpg"` and an empty root.
pub fn file_ext(name: &str) -> String {
    match name.rfind('.') {
        Some(pos) => name[pos + 1..].to_lowercase(),
        None => String::new(),
    }
}

/// Everything before the last dot, or the whole name when there is no dot.
pub fn file_root(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) => &name[..pos],
        None => name,
    }
}

/// Final component of a client-declared name.
///
/// Browsers and multipart encoders sometimes send full client paths
/// (`C:\fakepath\photo.jpg`); only the last segment is meaningful.
pub fn declared_file_name(declared: &str) -> &str {
    declared.rsplit(['/', '\\']).next().unwrap_or(declared)
}

fn with_ext(stem: String, ext: &str) -> String {
    if ext.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, ext.to_lowercase())
    }
}

/// Name for a file in the staging or processing directory.
///
/// `holiday photo.JPG` at `1377287616449` → `holiday_photo_1377287616449.jpg`.
pub fn staging_name(declared: &str, ext: &str, millis: u64) -> String {
    let stem = sanitize(file_root(declared_file_name(declared)));
    with_ext(format!("{}_{}", stem, millis), ext)
}

/// Name under which a preserved original is stored.
///
/// Without `rename` the declared file name is kept as-is (only the last path
/// segment, and only if it is a usable file name). With `rename`, the stem is
/// sanitized and, under [`NamingConvention::Date`], suffixed with
/// `separator + millis`.
pub fn original_name(
    declared: &str,
    rename: bool,
    convention: NamingConvention,
    separator: &str,
    millis: u64,
) -> String {
    let declared = declared_file_name(declared);
    if !rename && !matches!(declared, "" | "." | "..") {
        return declared.to_string();
    }
    let stem = sanitize(file_root(declared));
    let ext = file_ext(declared);
    match convention {
        NamingConvention::Date => with_ext(format!("{}{}{}", stem, separator, millis), &ext),
        NamingConvention::Original | NamingConvention::Custom => with_ext(stem, &ext),
    }
}

/// Base name shared by every version of one upload.
///
/// `family` is the stored name of the preserved original when originals are
/// renamed; under [`NamingConvention::Date`] its timestamp is reused so the
/// original and its versions share one key.
pub fn base_name(
    convention: NamingConvention,
    declared: &str,
    custom: Option<&str>,
    family: Option<(&str, &str)>,
    clock: &dyn Clock,
) -> String {
    match convention {
        NamingConvention::Date => family
            .and_then(|(name, separator)| extract_timestamp(name, separator))
            .unwrap_or_else(|| clock.now_millis())
            .to_string(),
        NamingConvention::Original => sanitize(file_root(declared_file_name(declared))),
        NamingConvention::Custom => sanitize(custom.unwrap_or("")),
    }
}

/// Relative location of one version: optional subdirectory plus file name.
pub fn version_file_name(
    base: &str,
    version: &str,
    ext: &str,
    separator: &str,
    mode: DirectoryMode,
) -> (Option<String>, String) {
    match mode {
        DirectoryMode::Single => (
            None,
            with_ext(format!("{}{}{}", base, separator, version), ext),
        ),
        DirectoryMode::Version => (Some(version.to_string()), with_ext(base.to_string(), ext)),
    }
}

/// Millisecond timestamp at the end of a renamed file's stem.
///
/// `test_1377287616449.jpg` with separator `_` → `Some(1377287616449)`.
pub fn extract_timestamp(name: &str, separator: &str) -> Option<u64> {
    let root = file_root(name);
    let stamp = if separator.is_empty() {
        root
    } else {
        root.rsplit(separator).next()?
    };
    if stamp.is_empty() || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stamp.parse().ok()
}

/// True when `name` is a single, plain path component.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !matches!(name, "." | "..")
        && !name.contains(['/', '\\'])
        && !name.contains('\0')
}
