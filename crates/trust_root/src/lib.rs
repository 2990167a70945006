// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Build, edit and audit sigstore trusted root manifests.
//!
//! A trusted root lists the certificate authorities, timestamping
//! authorities, and transparency logs a verifier should trust, each with the
//! interval it is trusted for. Entries are kept as histories: adding a new
//! generation closes the validity of the one before it.
//!
//! - [`new_certificate_authority`] and [`new_transparency_log`] build entries
//!   from PEM inputs.
//! - [`TrustedRoot::add_authority`] and [`TrustedRoot::add_log`] append them.
//! - [`verify_trusted_root`] audits a manifest and reports every problem.

pub mod builder;
pub mod editor;
pub mod key;
pub mod signing_config;
pub mod trusted_root;
pub mod verify;

pub use builder::*;
pub use editor::*;
pub use key::*;
pub use signing_config::*;
pub use trusted_root::*;
pub use verify::*;

use chrono::{DateTime, Utc};
use thiserror::Error;
use x509_util::ChainError;

#[derive(Error, Debug)]
pub enum TrustRootError {
    #[error(transparent)]
    Der(#[from] der::Error),
    #[error(transparent)]
    Spki(#[from] spki::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("unsupported key: {0}")]
    UnsupportedKey(String),
    #[error("invalid validity window: {0}")]
    InvalidValidityWindow(#[from] WindowError),
    #[error("invalid {field} time '{value}': {source}")]
    InvalidTimestamp {
        field: &'static str,
        value: String,
        source: chrono::ParseError,
    },
}

/// Why a requested validity window was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("start {start} is before the root certificate's 'not before' {not_before}")]
    StartBeforeRoot {
        start: DateTime<Utc>,
        not_before: DateTime<Utc>,
    },
    #[error("start {start} is after the root certificate's 'not after' {not_after}")]
    StartAfterRoot {
        start: DateTime<Utc>,
        not_after: DateTime<Utc>,
    },
    #[error("end {end} is before start {start}")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

pub type Result<T> = std::result::Result<T, TrustRootError>;

/// Parses an RFC 3339 timestamp, normalizing it to UTC. `field` names the
/// value in the error.
///
/// # Errors
///
/// Returns [`TrustRootError::InvalidTimestamp`] if `value` is not RFC 3339.
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| TrustRootError::InvalidTimestamp {
            field,
            value: value.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp() {
        let want = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp("start", "2024-03-01T12:00:00Z").unwrap(), want);
        assert_eq!(
            parse_timestamp("start", "2024-03-01T14:00:00+02:00").unwrap(),
            want
        );
        assert!(matches!(
            parse_timestamp("end", "2024-03-01"),
            Err(TrustRootError::InvalidTimestamp { field: "end", .. })
        ));
    }
}
