//! Artifact naming and path validation.
//!
//! Uploaded artifacts live at `{job_type}/{unique_timestamp}_{file_name}`.
//! The timestamp is milliseconds since the epoch and strictly increasing
//! within the process, so two uploads of the same file name never collide.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;
use crate::job_type::JobType;

/// File name used when the client supplies none (or nothing survives sanitizing).
pub const DEFAULT_FILE_NAME: &str = "upload.csv";

/// Maximum length of the sanitized file name component.
pub const MAX_FILE_NAME_LENGTH: usize = 128;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("static regex is valid"));

static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// Return a millisecond timestamp strictly greater than any previously returned.
pub fn next_unique_timestamp() -> i64 {
    unique_after(chrono::Utc::now().timestamp_millis())
}

fn unique_after(now_millis: i64) -> i64 {
    let mut last = LAST_TIMESTAMP.load(Ordering::Relaxed);
    loop {
        let candidate = now_millis.max(last + 1);
        match LAST_TIMESTAMP.compare_exchange_weak(
            last,
            candidate,
            Ordering::SeqCst,
            Ordering::Relaxed,
        ) {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

/// Reduce a client-supplied file name to a safe single path component.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned = UNSAFE_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        return DEFAULT_FILE_NAME.to_string();
    }

    // Keep the tail so the extension survives truncation.
    let chars: Vec<char> = cleaned.chars().collect();
    let start = chars.len().saturating_sub(MAX_FILE_NAME_LENGTH);
    chars[start..].iter().collect()
}

/// Build an artifact path from its parts.
pub fn artifact_path(job_type: JobType, timestamp_millis: i64, original_name: &str) -> String {
    format!(
        "{}/{}_{}",
        job_type.as_str(),
        timestamp_millis,
        sanitize_file_name(original_name)
    )
}

/// Build a fresh, collision-free artifact path for a new upload.
pub fn new_artifact_path(job_type: JobType, original_name: &str) -> String {
    artifact_path(job_type, next_unique_timestamp(), original_name)
}

/// Reject paths that could escape the storage root.
pub fn validate_artifact_path(path: &str) -> Result<(), CoreError> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");

    if invalid {
        Err(CoreError::Validation(format!(
            "Invalid artifact path '{path}'"
        )))
    } else {
        Ok(())
    }
}
