//! CLI output formatting.
//!
//! # Output Format
//!
//! Every file gets a header line (positional index + declared name) followed
//! by indented detail lines.
//!
//! ## Validate
//!
//! ```text
//! 001 Holiday Pic.JPG
//!     Processing: holiday_pic_1377287616449.jpg (image/jpeg, 40x30)
//!     Original: Holiday Pic.JPG → /images/originals/Holiday Pic.JPG
//! 002 resume.jpg
//!     Rejected: "resume.jpg" is not an allowed image (unrecognized content)
//! ```
//!
//! ## Upload
//!
//! ```text
//! 001 Holiday Pic.JPG
//!     thmb: 32x32 → /images/uploaded/1377287616449_thmb.jpg
//!     profile: 200x150 → /images/uploaded/1377287616449_profile.jpg
//!
//! Processed 1 file, 0 failed
//! ```
//!
//! ## Sweep
//!
//! ```text
//! Removed tmp/staging/a_1377287616449.jpg
//!
//! Swept 1 file, kept 4, 0 failed
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::error::UploadError;
use crate::sweep::SweepReport;
use crate::types::{Artifact, CleanupFailure, Processed, Validated};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn error_line(err: &UploadError) -> String {
    let label = if err.is_rejection() { "Rejected" } else { "Error" };
    format!("{}{}: {}", indent(1), label, err)
}

fn cleanup_lines(cleanup: &[CleanupFailure]) -> impl Iterator<Item = String> + '_ {
    cleanup.iter().map(|c| {
        format!(
            "{}Cleanup failed: {} ({})",
            indent(1),
            c.path.display(),
            c.message
        )
    })
}

/// One artifact: `thmb: 32x32 → /url`, or `Original: name → /url`.
pub fn format_artifact(artifact: &Artifact) -> String {
    match &artifact.version {
        Some(version) => format!(
            "{}: {}x{} → {}",
            version, artifact.width, artifact.height, artifact.url
        ),
        None => format!("Original: {} → {}", artifact.name, artifact.url),
    }
}

pub fn format_validation(
    index: usize,
    declared: &str,
    result: &Result<Validated, UploadError>,
) -> Vec<String> {
    let mut lines = vec![format!("{} {}", format_index(index), declared)];
    match result {
        Ok(v) => {
            lines.push(format!(
                "{}Processing: {} ({}, {}x{})",
                indent(1),
                v.file.name,
                v.file.mime(),
                v.file.width,
                v.file.height
            ));
            if let Some(original) = &v.original {
                lines.push(format!("{}{}", indent(1), format_artifact(original)));
            }
            lines.extend(cleanup_lines(&v.cleanup));
        }
        Err(e) => lines.push(error_line(e)),
    }
    lines
}

pub fn format_processed(
    index: usize,
    declared: &str,
    result: &Result<Processed, UploadError>,
) -> Vec<String> {
    let mut lines = vec![format!("{} {}", format_index(index), declared)];
    match result {
        Ok(p) => {
            if let Some(original) = &p.original {
                lines.push(format!("{}{}", indent(1), format_artifact(original)));
            }
            for artifact in &p.versions {
                lines.push(format!("{}{}", indent(1), format_artifact(artifact)));
            }
            lines.extend(cleanup_lines(&p.cleanup));
        }
        Err(e) => lines.push(error_line(e)),
    }
    lines
}

/// Closing summary line for a batch.
pub fn format_summary(verb: &str, ok: usize, failed: usize) -> String {
    format!("{} {}, {} failed", verb, plural(ok, "file"), failed)
}

pub fn format_sweep(report: &SweepReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .removed
        .iter()
        .map(|p| format!("Removed {}", p.display()))
        .collect();
    lines.extend(
        report
            .failed
            .iter()
            .map(|f| format!("Failed {} ({})", f.path.display(), f.message)),
    );
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Swept {}, kept {}, {} failed",
        plural(report.removed.len(), "file"),
        report.kept,
        report.failed.len()
    ));
    lines
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

pub fn print_sweep(report: &SweepReport) {
    print_lines(&format_sweep(report));
}
