//! Upload intake limits and the checks run before an artifact is accepted.
//!
//! Checks run in a fixed order: credential, size, then daily quota.

use chrono::{NaiveTime, TimeZone, Utc};

use crate::error::CoreError;
use crate::signing::constant_time_eq;
use crate::types::Timestamp;

/// Default number of jobs accepted per UTC day.
pub const DEFAULT_MAX_DAILY_JOBS: i64 = 50;

/// Default maximum artifact size (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Compare the presented credential against the configured secret.
pub fn verify_credential(presented: Option<&str>, secret: &str) -> Result<(), CoreError> {
    let presented = presented
        .filter(|p| !p.is_empty())
        .ok_or_else(|| CoreError::Unauthorized("Missing intake credential".into()))?;

    if secret.is_empty() || !constant_time_eq(presented.as_bytes(), secret.as_bytes()) {
        return Err(CoreError::Unauthorized("Invalid intake credential".into()));
    }
    Ok(())
}

/// An artifact exactly at `max_bytes` is accepted; one byte more is not.
pub fn validate_upload_size(size: u64, max_bytes: u64) -> Result<(), CoreError> {
    if size > max_bytes {
        return Err(CoreError::PayloadTooLarge {
            size,
            max: max_bytes,
        });
    }
    Ok(())
}

/// `created_today` is the number of jobs already created since midnight UTC.
pub fn check_daily_quota(created_today: i64, limit: i64) -> Result<(), CoreError> {
    if created_today >= limit {
        return Err(CoreError::RateLimited { limit });
    }
    Ok(())
}

/// Midnight UTC of the day containing `now`.
pub fn start_of_day(now: Timestamp) -> Timestamp {
    Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN))
}
