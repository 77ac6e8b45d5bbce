//! # imgstage
//!
//! Staged validation and versioning of user-uploaded images. A web
//! application hands over the files from an upload request; imgstage decides
//! by content whether each one is a real GIF, JPEG or PNG, optionally keeps
//! the original, crops it, and writes a configured set of resized versions
//! under predictable names.
//!
//! # Architecture: Staged Pipeline
//!
//! Each upload moves through three directories, and only ever forwards bytes
//! that have passed the previous step:
//!
//! ```text
//! 1. Validate  temp upload  →  staging/     →  processing/   (sniff, correct, measure)
//! 2. Crop      processing/  →  processing/                   (in place, optional)
//! 3. Version   processing/  →  uploaded/                     (one file per version)
//! ```
//!
//! The staging directory is scratch space outside the document root and is
//! emptied before validation returns. The processing file is removed as soon
//! as versioning finishes, successfully or not. What remains is exactly the
//! versions (and the preserved original, if configured).
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | [`Pipeline`] context; batch `upload` / `upload_all`; one-shot `ingest` |
//! | [`staging`] | Stage 1: read, size check, stage, classify, promote, clean up |
//! | [`crop`] | Stage 2: crop the processing file in place; re-open by name |
//! | [`versions`] | Stage 3: sequential per-version resize, then processing cleanup |
//! | [`mime`] | Content sniffing to one of the allowed [`ImageKind`](mime::ImageKind)s |
//! | [`naming`] | Sanitized, timestamped names for every file the pipeline writes |
//! | [`imaging`] | Dimension planning, codec trait, `image`-crate backend |
//! | [`store`] | [`BlobStore`](store::BlobStore) trait and the atomic filesystem store |
//! | [`sweep`] | Removal of abandoned staging and processing files |
//! | [`config`] | `imgstage.toml` loading, merging over defaults, validation |
//! | [`types`] | Records passed between stages (`UploadedFile`, `Artifact`, ...) |
//! | [`error`] | [`UploadError`] with the path or name each failure concerns |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Content Decides the Type
//!
//! A file's name and the client's `Content-Type` are never consulted for its
//! type. The staged bytes are sniffed by magic number; a mislabeled file is
//! renamed to the extension its content implies, and anything outside the
//! allowed set is rejected before it reaches a served directory.
//!
//! ## Explicit Context, No Globals
//!
//! Configuration, storage, codec and clock are passed in through a
//! [`Pipeline`] value. Tests swap in an in-memory store, a recording codec
//! and a frozen clock; the CLI wires up [`store::FsStore`] and
//! [`imaging::RustBackend`].
//!
//! ## Deterministic Names
//!
//! Version names derive from a base name, a separator and the version name,
//! so regenerating a version overwrites it instead of adding a sibling. Under
//! the `date` convention the base is an epoch-millisecond timestamp, which
//! also lets [`sweep`] tell how old a leftover file is. Two uploads with the
//! same sanitized name in the same millisecond would collide; nothing guards
//! against that.

pub mod config;
pub mod crop;
pub mod error;
pub mod imaging;
pub mod mime;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod staging;
pub mod store;
pub mod sweep;
pub mod types;
pub mod versions;

pub use error::UploadError;
pub use pipeline::Pipeline;

#[cfg(test)]
pub(crate) mod test_helpers;
