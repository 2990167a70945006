// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Consistency checks over the entries of a trusted root.
//!
//! Checks never stop at the first problem. Each one records a [`Finding`] in a
//! [`ValidationReport`] and moves on, so a single run lists everything that
//! needs fixing. Only entries that cannot be parsed at all abort verification.

use crate::{
    CertificateAuthority, KeyAlgorithm, KeyShape, Result, RsaPadding, TimeRange,
    TransparencyLogInstance, TrustedRoot,
};
use chrono::{DateTime, Utc};
use der::Decode;
use sha2::{Digest, Sha256};
use spki::SubjectPublicKeyInfoRef;
use std::fmt;
use x509_util::ChainCert;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Failure,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("WARN"),
            Self::Failure => f.write_str("FAIL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindingKind {
    EmptyChain,
    NotBeforeAfterStart {
        not_before: DateTime<Utc>,
        start: DateTime<Utc>,
    },
    NotAfterBeforeEnd {
        not_after: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    IssuerOrganizationMismatch {
        issuer: String,
        parent: String,
    },
    IssuerCommonNameMismatch {
        issuer: String,
        parent: String,
    },
    MissingSubjectKeyId,
    AuthorityKeyIdLengthMismatch {
        authority_key_id: usize,
        subject_key_id: usize,
    },
    AuthorityKeyIdMismatch {
        authority_key_id: String,
        subject_key_id: String,
    },
    RootNotCa,
    SubjectOrganizationMismatch {
        recorded: String,
        root: String,
    },
    SubjectCommonNameMismatch {
        recorded: String,
        root: String,
    },
    OutOfOrder {
        previous_entry: String,
        previous: DateTime<Utc>,
        start: DateTime<Utc>,
    },
    OpenBeforeLast {
        next: String,
    },
    InvalidPublicKey {
        reason: String,
    },
    LogIdMismatch {
        recorded: String,
        computed: String,
    },
    KeyDetailsMismatch {
        recorded: KeyAlgorithm,
        expected: Vec<KeyAlgorithm>,
    },
}

impl FindingKind {
    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingSubjectKeyId | Self::OutOfOrder { .. } | Self::OpenBeforeLast { .. } => {
                Severity::Warning
            }
            _ => Severity::Failure,
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyChain => write!(f, "certificate chain is empty"),
            Self::NotBeforeAfterStart { not_before, start } => {
                write!(f, "'not before' {not_before} is after validity start {start}")
            }
            Self::NotAfterBeforeEnd { not_after, end } => {
                write!(f, "'not after' {not_after} is before validity end {end}")
            }
            Self::IssuerOrganizationMismatch { issuer, parent } => write!(
                f,
                "issuer organization '{issuer}' does not match parent subject '{parent}'"
            ),
            Self::IssuerCommonNameMismatch { issuer, parent } => write!(
                f,
                "issuer common name '{issuer}' does not match parent subject '{parent}'"
            ),
            Self::MissingSubjectKeyId => write!(
                f,
                "parent has no subject key identifier, skipping authority key identifier check"
            ),
            Self::AuthorityKeyIdLengthMismatch {
                authority_key_id,
                subject_key_id,
            } => write!(
                f,
                "authority key identifier length {authority_key_id} does not match parent subject key identifier length {subject_key_id}"
            ),
            Self::AuthorityKeyIdMismatch {
                authority_key_id,
                subject_key_id,
            } => write!(
                f,
                "authority key identifier {authority_key_id} does not match parent subject key identifier {subject_key_id}"
            ),
            Self::RootNotCa => write!(
                f,
                "expected root certificate last, found non-CA certificate"
            ),
            Self::SubjectOrganizationMismatch { recorded, root } => write!(
                f,
                "recorded subject organization '{recorded}' does not match root '{root}'"
            ),
            Self::SubjectCommonNameMismatch { recorded, root } => write!(
                f,
                "recorded subject common name '{recorded}' does not match root '{root}'"
            ),
            Self::OutOfOrder {
                previous_entry,
                previous,
                start,
            } => write!(
                f,
                "validity start {start} is before the start {previous} of previous entry {previous_entry}"
            ),
            Self::OpenBeforeLast { next } => write!(
                f,
                "validity window has no end but is followed by {next}"
            ),
            Self::InvalidPublicKey { reason } => write!(f, "invalid public key: {reason}"),
            Self::LogIdMismatch { recorded, computed } => write!(
                f,
                "log ID {recorded} does not match public key digest {computed}"
            ),
            Self::KeyDetailsMismatch { recorded, expected } => {
                write!(f, "key details {recorded} do not match public key, expected ")?;
                for (i, alg) in expected.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" or ")?;
                    }
                    write!(f, "{alg}")?;
                }
                Ok(())
            }
        }
    }
}

/// One problem found in one entry, and optionally one certificate of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub entry: String,
    pub certificate: Option<String>,
    pub kind: FindingKind,
}

impl Finding {
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity(), self.entry)?;
        if let Some(cert) = &self.certificate {
            write!(f, " ({cert})")?;
        }
        write!(f, ": {}", self.kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    /// Valid unless there is at least one failure. Warnings do not count.
    pub fn is_valid(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity() == Severity::Failure)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity() == Severity::Warning)
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.findings.extend(other.findings);
    }

    fn record(&mut self, entry: &str, cert: Option<&ChainCert>, kind: FindingKind) {
        let finding = Finding {
            entry: entry.to_string(),
            certificate: cert.map(|c| c.subject.common_name.clone()),
            kind,
        };
        log::debug!("{finding}");
        self.findings.push(finding);
    }
}

/// Checks one authority's chain against its recorded subject and validity
/// window.
///
/// Every certificate must be valid for the whole window. Each certificate
/// except the root must name its parent as issuer and carry an authority key
/// identifier matching the parent's subject key identifier. The root must be
/// a CA and match the recorded subject.
///
/// # Errors
///
/// Returns an error if a certificate in the chain cannot be parsed.
pub fn verify_authority(ca: &CertificateAuthority) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();
    let label = ca.label();
    let chain = ca.cert_chain.parse()?;
    log::debug!("Verifying {} with {} certificate(s)", ca.subject, chain.len());

    let Some(root) = chain.last() else {
        report.record(label, None, FindingKind::EmptyChain);
        return Ok(report);
    };

    for (i, cert) in chain.iter().enumerate() {
        if cert.not_before > ca.valid_for.start {
            report.record(
                label,
                Some(cert),
                FindingKind::NotBeforeAfterStart {
                    not_before: cert.not_before,
                    start: ca.valid_for.start,
                },
            );
        }
        if let Some(end) = ca.valid_for.end {
            if cert.not_after < end {
                report.record(
                    label,
                    Some(cert),
                    FindingKind::NotAfterBeforeEnd {
                        not_after: cert.not_after,
                        end,
                    },
                );
            }
        }
        if let Some(parent) = chain.get(i + 1) {
            verify_link(&mut report, label, cert, parent);
        }
    }

    if !root.is_ca {
        report.record(label, Some(root), FindingKind::RootNotCa);
    }
    if ca.subject.organization != root.subject.organization {
        report.record(
            label,
            Some(root),
            FindingKind::SubjectOrganizationMismatch {
                recorded: ca.subject.organization.clone(),
                root: root.subject.organization.clone(),
            },
        );
    }
    if ca.subject.common_name != root.subject.common_name {
        report.record(
            label,
            Some(root),
            FindingKind::SubjectCommonNameMismatch {
                recorded: ca.subject.common_name.clone(),
                root: root.subject.common_name.clone(),
            },
        );
    }
    Ok(report)
}

fn verify_link(report: &mut ValidationReport, label: &str, cert: &ChainCert, parent: &ChainCert) {
    if cert.issuer.organization != parent.subject.organization {
        report.record(
            label,
            Some(cert),
            FindingKind::IssuerOrganizationMismatch {
                issuer: cert.issuer.organization.clone(),
                parent: parent.subject.organization.clone(),
            },
        );
    }
    if cert.issuer.common_name != parent.subject.common_name {
        report.record(
            label,
            Some(cert),
            FindingKind::IssuerCommonNameMismatch {
                issuer: cert.issuer.common_name.clone(),
                parent: parent.subject.common_name.clone(),
            },
        );
    }

    if parent.subject_key_id.is_empty() {
        report.record(label, Some(cert), FindingKind::MissingSubjectKeyId);
    } else if cert.authority_key_id.len() != parent.subject_key_id.len() {
        report.record(
            label,
            Some(cert),
            FindingKind::AuthorityKeyIdLengthMismatch {
                authority_key_id: cert.authority_key_id.len(),
                subject_key_id: parent.subject_key_id.len(),
            },
        );
    } else if cert.authority_key_id != parent.subject_key_id {
        report.record(
            label,
            Some(cert),
            FindingKind::AuthorityKeyIdMismatch {
                authority_key_id: hex::encode(&cert.authority_key_id),
                subject_key_id: hex::encode(&parent.subject_key_id),
            },
        );
    }
}

/// Verifies every authority in a history. Warns about generations whose
/// start precedes the previous generation's start, and about open-ended
/// generations that are not the last one.
///
/// # Errors
///
/// Returns an error if a certificate in any chain cannot be parsed.
pub fn verify_authorities(history: &[CertificateAuthority]) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();
    for ca in history {
        report.merge(verify_authority(ca)?);
    }
    let entries: Vec<_> = history.iter().map(|ca| (ca.label(), &ca.valid_for)).collect();
    check_history(&mut report, &entries);
    Ok(report)
}

/// Checks the soft invariants of a history: starts ascend and only the last
/// entry may be open-ended.
fn check_history(report: &mut ValidationReport, entries: &[(&str, &TimeRange)]) {
    for pair in entries.windows(2) {
        let [(previous_entry, previous), (label, current)] = pair else {
            continue;
        };
        if current.start < previous.start {
            report.record(
                label,
                None,
                FindingKind::OutOfOrder {
                    previous_entry: previous_entry.to_string(),
                    previous: previous.start,
                    start: current.start,
                },
            );
        }
        if previous.is_open() {
            report.record(
                previous_entry,
                None,
                FindingKind::OpenBeforeLast {
                    next: label.to_string(),
                },
            );
        }
    }
}

/// Checks that a log's ID is the SHA-256 digest of its public key and that
/// the recorded key details match the key. Either RSA padding is accepted.
pub fn verify_log(log: &TransparencyLogInstance) -> ValidationReport {
    let mut report = ValidationReport::default();
    let label = log.base_url.as_str();
    let raw = &log.public_key.raw_bytes;

    let computed = Sha256::digest(raw);
    if log.log_id.key_id.as_slice() != computed.as_slice() {
        report.record(
            label,
            None,
            FindingKind::LogIdMismatch {
                recorded: hex::encode(&log.log_id.key_id),
                computed: hex::encode(computed),
            },
        );
    }

    match expected_key_details(raw) {
        Ok(expected) => {
            if !expected.contains(&log.public_key.key_details) {
                report.record(
                    label,
                    None,
                    FindingKind::KeyDetailsMismatch {
                        recorded: log.public_key.key_details,
                        expected,
                    },
                );
            }
        }
        Err(e) => report.record(
            label,
            None,
            FindingKind::InvalidPublicKey {
                reason: e.to_string(),
            },
        ),
    }
    report
}

fn expected_key_details(spki: &[u8]) -> Result<Vec<KeyAlgorithm>> {
    let spki = SubjectPublicKeyInfoRef::from_der(spki)?;
    let shape = KeyShape::from_spki(&spki)?;
    let default = KeyAlgorithm::classify(&shape, RsaPadding::Pkcs1v15)?;
    let mut expected = vec![default];
    if default.is_rsa() {
        expected.push(KeyAlgorithm::classify(&shape, RsaPadding::Pss)?);
    }
    Ok(expected)
}

/// Verifies every log in a history. See [`verify_log`].
pub fn verify_logs(history: &[TransparencyLogInstance]) -> ValidationReport {
    let mut report = ValidationReport::default();
    for log in history {
        report.merge(verify_log(log));
    }
    let entries: Vec<_> = history
        .iter()
        .map(|log| (log.base_url.as_str(), &log.public_key.valid_for))
        .collect();
    check_history(&mut report, &entries);
    report
}

/// Verifies every history of a manifest into one report.
///
/// # Errors
///
/// Returns an error if a certificate in any chain cannot be parsed.
pub fn verify_trusted_root(root: &TrustedRoot) -> Result<ValidationReport> {
    let mut report = verify_authorities(&root.certificate_authorities)?;
    report.merge(verify_authorities(&root.timestamp_authorities)?);
    report.merge(verify_logs(&root.tlogs));
    report.merge(verify_logs(&root.ctlogs));
    log::info!(
        "Verified trusted root: {} failure(s), {} warning(s)",
        report.failures().count(),
        report.warnings().count()
    );
    Ok(report)
}
