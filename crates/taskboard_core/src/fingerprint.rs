//! Optimistic concurrency check.
//!
//! A task's `updated_at` is its only version. A client that wants conflict
//! detection sends back the value it last observed; the mutation proceeds
//! only when that value still equals the stored one at millisecond
//! resolution. Equality, not ordering: a fingerprint from the "future" is as
//! much a conflict as a stale one.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    Conflict,
}

/// The two conflict-control fields every guarded mutation accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrencyGuard {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub client_updated_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub force: bool,
}

impl ConcurrencyGuard {
    /// No fingerprint: the caller did not opt into conflict detection.
    pub fn unchecked() -> Self {
        Self::default()
    }

    pub fn observed(client_updated_at: OffsetDateTime) -> Self {
        Self {
            client_updated_at: Some(client_updated_at),
            force: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn check(&self, stored_updated_at: OffsetDateTime) -> Verdict {
        validate(stored_updated_at, self.client_updated_at, self.force)
    }
}

pub fn validate(
    stored_updated_at: OffsetDateTime,
    client_updated_at: Option<OffsetDateTime>,
    force: bool,
) -> Verdict {
    if force {
        return Verdict::Proceed;
    }

    match client_updated_at {
        None => Verdict::Proceed,
        Some(client) if same_instant(client, stored_updated_at) => Verdict::Proceed,
        Some(_) => Verdict::Conflict,
    }
}

pub fn same_instant(left: OffsetDateTime, right: OffsetDateTime) -> bool {
    epoch_millis(left) == epoch_millis(right)
}

pub fn epoch_millis(value: OffsetDateTime) -> i128 {
    value.unix_timestamp_nanos().div_euclid(1_000_000)
}

/// Accepts an RFC 3339 timestamp or integer milliseconds since the epoch.
pub fn parse_fingerprint(raw: &str) -> Result<OffsetDateTime, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("fingerprint is required"));
    }

    if let Ok(millis) = trimmed.parse::<i64>() {
        return OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
            .map_err(|_| AppError::invalid_input("fingerprint is out of range"));
    }

    OffsetDateTime::parse(trimmed, &Rfc3339)
        .map_err(|_| AppError::invalid_input("fingerprint must be RFC3339 or epoch milliseconds"))
}
