// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Appending generations to the histories of a trusted root.

use crate::{
    CertificateAuthority, Result, TimeRange, TransparencyLogInstance, TrustRootError,
    TrustedRoot, WindowError,
};
use chrono::{DateTime, Utc};
use std::{fmt, str::FromStr};

/// An entry with a validity window that can be superseded by a later one.
pub trait Generation {
    fn valid_for(&self) -> &TimeRange;
    fn valid_for_mut(&mut self) -> &mut TimeRange;
    /// Label used in logs.
    fn label(&self) -> &str;
}

impl Generation for CertificateAuthority {
    fn valid_for(&self) -> &TimeRange {
        &self.valid_for
    }

    fn valid_for_mut(&mut self) -> &mut TimeRange {
        &mut self.valid_for
    }

    fn label(&self) -> &str {
        CertificateAuthority::label(self)
    }
}

impl Generation for TransparencyLogInstance {
    fn valid_for(&self) -> &TimeRange {
        &self.public_key.valid_for
    }

    fn valid_for_mut(&mut self) -> &mut TimeRange {
        &mut self.public_key.valid_for
    }

    fn label(&self) -> &str {
        &self.base_url
    }
}

/// Appends `entry` to `history`.
///
/// If the current last generation is still open, it is closed at `prev_end`,
/// or at the start of `entry` when `prev_end` is `None`. A generation that
/// already has an end is left alone.
///
/// # Errors
///
/// Returns [`WindowError::EndBeforeStart`] if the closing time precedes the
/// start of the generation being closed. The history is unchanged on error.
pub fn append<T: Generation>(
    history: &mut Vec<T>,
    entry: T,
    prev_end: Option<DateTime<Utc>>,
) -> std::result::Result<(), WindowError> {
    if let Some(last) = history.last_mut() {
        if last.valid_for().is_open() {
            let end = prev_end.unwrap_or(entry.valid_for().start);
            let start = last.valid_for().start;
            if end < start {
                return Err(WindowError::EndBeforeStart { start, end });
            }
            log::info!("Closing validity of {} at {end}", last.label());
            last.valid_for_mut().end = Some(end);
        }
    }
    log::info!(
        "Appending {} valid from {}",
        entry.label(),
        entry.valid_for().start
    );
    history.push(entry);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityKind {
    Certificate,
    Timestamping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Transparency,
    CertificateTransparency,
}

/// The history an entry is added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Authority(AuthorityKind),
    Log(LogKind),
}

impl EntryKind {
    pub const CA: Self = Self::Authority(AuthorityKind::Certificate);
    pub const TSA: Self = Self::Authority(AuthorityKind::Timestamping);
    pub const TLOG: Self = Self::Log(LogKind::Transparency);
    pub const CTLOG: Self = Self::Log(LogKind::CertificateTransparency);
}

impl FromStr for EntryKind {
    type Err = TrustRootError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ca" => Ok(Self::CA),
            "tsa" => Ok(Self::TSA),
            "tlog" => Ok(Self::TLOG),
            "ctlog" => Ok(Self::CTLOG),
            _ => Err(TrustRootError::MalformedInput(format!(
                "unknown entry type '{s}', expected one of ca, tsa, tlog, ctlog"
            ))),
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Authority(AuthorityKind::Certificate) => "ca",
            Self::Authority(AuthorityKind::Timestamping) => "tsa",
            Self::Log(LogKind::Transparency) => "tlog",
            Self::Log(LogKind::CertificateTransparency) => "ctlog",
        })
    }
}

impl TrustedRoot {
    /// Starts a manifest with an optional first certificate authority and
    /// timestamping authority.
    pub fn init(ca: Option<CertificateAuthority>, tsa: Option<CertificateAuthority>) -> Self {
        let mut root = Self::new();
        root.certificate_authorities.extend(ca);
        root.timestamp_authorities.extend(tsa);
        root
    }

    pub fn authorities(&self, kind: AuthorityKind) -> &[CertificateAuthority] {
        match kind {
            AuthorityKind::Certificate => &self.certificate_authorities,
            AuthorityKind::Timestamping => &self.timestamp_authorities,
        }
    }

    pub fn authorities_mut(&mut self, kind: AuthorityKind) -> &mut Vec<CertificateAuthority> {
        match kind {
            AuthorityKind::Certificate => &mut self.certificate_authorities,
            AuthorityKind::Timestamping => &mut self.timestamp_authorities,
        }
    }

    pub fn logs(&self, kind: LogKind) -> &[TransparencyLogInstance] {
        match kind {
            LogKind::Transparency => &self.tlogs,
            LogKind::CertificateTransparency => &self.ctlogs,
        }
    }

    pub fn logs_mut(&mut self, kind: LogKind) -> &mut Vec<TransparencyLogInstance> {
        match kind {
            LogKind::Transparency => &mut self.tlogs,
            LogKind::CertificateTransparency => &mut self.ctlogs,
        }
    }

    /// Appends a new authority generation. See [`append`].
    ///
    /// # Errors
    ///
    /// Returns an error if the previous generation cannot be closed.
    pub fn add_authority(
        &mut self,
        kind: AuthorityKind,
        entry: CertificateAuthority,
        prev_end: Option<DateTime<Utc>>,
    ) -> Result<()> {
        Ok(append(self.authorities_mut(kind), entry, prev_end)?)
    }

    /// Appends a new log generation. See [`append`].
    ///
    /// # Errors
    ///
    /// Returns an error if the previous generation cannot be closed.
    pub fn add_log(
        &mut self,
        kind: LogKind,
        entry: TransparencyLogInstance,
        prev_end: Option<DateTime<Utc>>,
    ) -> Result<()> {
        Ok(append(self.logs_mut(kind), entry, prev_end)?)
    }
}
