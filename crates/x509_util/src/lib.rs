// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Utilities for X.509 operations on trusted root certificate bundles.
//!
//! Certificates are reduced to the handful of fields that trusted root
//! tooling cares about ([`ChainCert`]), collected into a de-duplicated
//! [`CertPool`], and ordered leaf first with [`order_chain`].

use chrono::{DateTime, Utc};
use const_oid::db::rfc4519::{COMMON_NAME, ORGANIZATION_NAME};
use der::{asn1::Any, Decode, Encode, Tag, Tagged};
use sha2::{Digest, Sha256};
use std::collections::{hash_map::Entry, HashMap};
use std::fmt;
use x509_cert::{
    ext::pkix::{AuthorityKeyIdentifier, BasicConstraints, SubjectKeyIdentifier},
    name::Name,
    time::Time,
    Certificate,
};

#[derive(thiserror::Error, Debug)]
pub enum ChainError {
    #[error(transparent)]
    Der(#[from] der::Error),
    #[error("incomplete certificate chain: {remaining} certificate(s) do not link to a self-signed root")]
    IncompleteChain { remaining: usize },
    #[error("certificate {field} is out of range")]
    InvalidTime { field: &'static str },
}

/// The organization and common name of an X.509 distinguished name.
///
/// Organization is taken from the first `O` attribute and common name from the
/// last `CN` attribute. Missing attributes are empty strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NameInfo {
    pub organization: String,
    pub common_name: String,
}

impl NameInfo {
    pub fn new(organization: impl Into<String>, common_name: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            common_name: common_name.into(),
        }
    }

    #[must_use]
    pub fn from_name(name: &Name) -> Self {
        let mut organization = None;
        let mut common_name = None;
        for atv in name.0.iter().flat_map(|rdn| rdn.0.iter()) {
            let Some(value) = directory_string(&atv.value) else {
                continue;
            };
            if atv.oid == ORGANIZATION_NAME {
                organization.get_or_insert(value);
            } else if atv.oid == COMMON_NAME {
                common_name = Some(value);
            }
        }
        Self {
            organization: organization.unwrap_or_default(),
            common_name: common_name.unwrap_or_default(),
        }
    }
}

impl fmt::Display for NameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O='{}' CN='{}'", self.organization, self.common_name)
    }
}

// String-valued attributes whose content octets are already UTF-8 (or a
// subset of it).
fn directory_string(value: &Any) -> Option<String> {
    match value.tag() {
        Tag::Utf8String
        | Tag::PrintableString
        | Tag::Ia5String
        | Tag::VisibleString
        | Tag::TeletexString => std::str::from_utf8(value.value()).ok().map(str::to_owned),
        _ => None,
    }
}

/// A parsed certificate, reduced to the fields used to order and audit a
/// chain. Immutable once parsed.
#[derive(Clone, Debug)]
pub struct ChainCert {
    pub subject: NameInfo,
    pub issuer: NameInfo,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Empty if the certificate has no subject key identifier extension.
    pub subject_key_id: Vec<u8>,
    /// Empty if the certificate has no authority key identifier, or if the
    /// extension carries no `keyIdentifier`.
    pub authority_key_id: Vec<u8>,
    pub is_ca: bool,
    /// The DER encoding of the certificate.
    pub raw: Vec<u8>,
}

impl ChainCert {
    /// Parses a DER-encoded certificate, keeping the input bytes as `raw`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a well-formed certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, ChainError> {
        let cert = Certificate::from_der(der)?;
        Self::with_raw(&cert, der.to_vec())
    }

    /// Extracts the chain fields from an already-decoded certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be re-encoded or one of its
    /// extensions is malformed.
    pub fn from_certificate(cert: &Certificate) -> Result<Self, ChainError> {
        Self::with_raw(cert, cert.to_der()?)
    }

    fn with_raw(cert: &Certificate, raw: Vec<u8>) -> Result<Self, ChainError> {
        let tbs = &cert.tbs_certificate;
        let subject_key_id = tbs
            .get::<SubjectKeyIdentifier>()?
            .map(|(_, ski)| ski.0.as_bytes().to_vec())
            .unwrap_or_default();
        let authority_key_id = tbs
            .get::<AuthorityKeyIdentifier>()?
            .and_then(|(_, aki)| aki.key_identifier)
            .map(|id| id.as_bytes().to_vec())
            .unwrap_or_default();
        let is_ca = tbs
            .get::<BasicConstraints>()?
            .is_some_and(|(_, bc)| bc.ca);

        Ok(Self {
            subject: NameInfo::from_name(&tbs.subject),
            issuer: NameInfo::from_name(&tbs.issuer),
            not_before: to_datetime(&tbs.validity.not_before, "not before")?,
            not_after: to_datetime(&tbs.validity.not_after, "not after")?,
            subject_key_id,
            authority_key_id,
            is_ca,
            raw,
        })
    }

    /// SHA-256 over the DER encoding.
    #[must_use]
    pub fn fingerprint(&self) -> [u8; 32] {
        Sha256::digest(&self.raw).into()
    }

    /// Whether the certificate names itself as issuer. Only the common name is
    /// compared, matching the relaxed name chaining used by [`order_chain`].
    #[must_use]
    pub fn is_self_issued(&self) -> bool {
        self.issuer.common_name == self.subject.common_name
    }
}

fn to_datetime(time: &Time, field: &'static str) -> Result<DateTime<Utc>, ChainError> {
    let secs = i64::try_from(time.to_unix_duration().as_secs())
        .map_err(|_| ChainError::InvalidTime { field })?;
    DateTime::from_timestamp(secs, 0).ok_or(ChainError::InvalidTime { field })
}

/// Returns the DER encodings of the given certificates, in order.
pub fn certs_to_bytes(certs: &[ChainCert]) -> Vec<Vec<u8>> {
    certs.iter().map(|cert| cert.raw.clone()).collect()
}

/// A `CertPool` is the unordered set of certificates read from one bundle.
#[derive(Default)]
pub struct CertPool {
    // Map from SHA256 fingerprint to index in `certs`.
    by_fingerprint: HashMap<[u8; 32], usize>,
    // List of certificates in pool, in the order they were added.
    pub certs: Vec<ChainCert>,
}

impl CertPool {
    /// Parses every certificate in a PEM bundle into a new pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM or any certificate in it is malformed.
    pub fn from_pem(input: &[u8]) -> Result<Self, ChainError> {
        let mut pool = Self::default();
        pool.append_certs_from_pem(input)?;
        Ok(pool)
    }

    /// Add a certificate to the pool if it is not already included. Returns
    /// whether the certificate was added.
    pub fn add_cert(&mut self, cert: ChainCert) -> bool {
        match self.by_fingerprint.entry(cert.fingerprint()) {
            Entry::Vacant(e) => {
                log::debug!("Adding certificate {}", cert.subject);
                e.insert(self.certs.len());
                self.certs.push(cert);
                true
            }
            Entry::Occupied(_) => {
                log::warn!("Dropping duplicate certificate {}", cert.subject);
                false
            }
        }
    }

    /// Add certs to the pool from a byte slice assumed to contain PEM encoded
    /// certificates. Returns the number of certificates parsed, including
    /// duplicates that were dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM or any certificate in it is malformed.
    pub fn append_certs_from_pem(&mut self, input: &[u8]) -> Result<usize, ChainError> {
        // load_pem_chain rejects an empty input, while an empty bundle is
        // simply an empty pool.
        if input.iter().all(u8::is_ascii_whitespace) {
            return Ok(0);
        }
        let certs = Certificate::load_pem_chain(input)?;
        let parsed = certs.len();
        for cert in &certs {
            self.add_cert(ChainCert::from_certificate(cert)?);
        }
        Ok(parsed)
    }

    /// Check if the pool includes a certificate.
    pub fn includes(&self, cert: &ChainCert) -> bool {
        self.by_fingerprint.contains_key(&cert.fingerprint())
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Orders the pool leaf first. See [`order_chain`].
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::IncompleteChain`] if the pool is not a single
    /// linear chain rooted in a self-issued certificate.
    pub fn into_chain(self) -> Result<Vec<ChainCert>, ChainError> {
        order_chain(self.certs)
    }
}

/// Whether `cand` is the next link after `prev`, walking from the root
/// towards the leaf. With no previous certificate, the candidate must be
/// self-issued.
fn links_to(cand: &ChainCert, prev: Option<&ChainCert>) -> bool {
    match prev {
        Some(prev) => cand.issuer.common_name == prev.subject.common_name,
        None => cand.is_self_issued(),
    }
}

/// Orders an unordered bundle into a chain, leaf first and root last.
///
/// This is relaxed name chaining in the sense of RFC 5280: only the common
/// names of the issuer and subject are compared, signatures are not checked.
/// The root is the first self-issued certificate found; each following pass
/// picks the certificate issued by the previous pick. Bundles are expected to
/// be small, so every pass is a linear scan of what is left.
///
/// Branching bundles are not rejected. When more than one certificate could
/// follow the same link, the first one in the working set wins and a warning
/// is logged; the loser is then left without a link and the call fails.
///
/// # Errors
///
/// Returns [`ChainError::IncompleteChain`] if the bundle is empty or some
/// certificate cannot be linked.
pub fn order_chain(certs: Vec<ChainCert>) -> Result<Vec<ChainCert>, ChainError> {
    let mut remaining = certs;
    if remaining.is_empty() {
        return Err(ChainError::IncompleteChain { remaining: 0 });
    }
    let mut ordered: Vec<ChainCert> = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let prev = ordered.last();
        let Some(idx) = remaining.iter().position(|cand| links_to(cand, prev)) else {
            return Err(ChainError::IncompleteChain {
                remaining: remaining.len(),
            });
        };
        if remaining[idx + 1..].iter().any(|cand| links_to(cand, prev)) {
            log::warn!(
                "Multiple certificates link to {}, using {}",
                prev.map_or("a self-signed root".to_string(), |p| p.subject.to_string()),
                remaining[idx].subject
            );
        }
        // Order within the working set does not matter.
        let next = remaining.swap_remove(idx);
        log::debug!("Linked {} into chain", next.subject);
        ordered.push(next);
    }

    ordered.reverse();
    Ok(ordered)
}

/// Builds a certificate pool from the given PEM files
#[macro_export]
macro_rules! build_pool {
    ($($pem_file:expr),+) => {{
        let mut pool = $crate::CertPool::default();
        $(
            pool.append_certs_from_pem(include_bytes!($pem_file)).expect("failed to parse PEM file");
        )*
        pool
    }}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn common_names(chain: &[ChainCert]) -> Vec<&str> {
        chain.iter().map(|c| c.subject.common_name.as_str()).collect()
    }

    const ORDERED: [&str; 3] = [
        "Example Timestamping",
        "Example Intermediate CA",
        "Example Root CA",
    ];

    #[test]
    fn test_name_fields() {
        let pool = build_pool!("../../trust_root/tests/data/root.pem");
        let root = &pool.certs[0];
        assert_eq!(root.subject, NameInfo::new("Example Trust", "Example Root CA"));
        assert_eq!(root.issuer, root.subject);
        assert!(root.is_ca);
        assert!(root.is_self_issued());
        assert!(!root.subject_key_id.is_empty());
        assert!(root.authority_key_id.is_empty());
        assert_eq!(root.not_before.to_rfc3339(), "2020-01-01T00:00:00+00:00");
        assert_eq!(root.not_after.to_rfc3339(), "2040-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_key_identifiers_link() {
        let pool = build_pool!("../../trust_root/tests/data/chain.pem");
        let [leaf, intermediate, root] = &pool.certs[..] else {
            panic!("expected three certificates");
        };
        assert!(!leaf.is_ca);
        assert!(intermediate.is_ca);
        assert_eq!(leaf.authority_key_id, intermediate.subject_key_id);
        assert_eq!(intermediate.authority_key_id, root.subject_key_id);
    }

    #[test]
    fn test_from_der_keeps_raw() {
        let pool = build_pool!("../../trust_root/tests/data/root.pem");
        let cert = ChainCert::from_der(&pool.certs[0].raw).unwrap();
        assert_eq!(cert.raw, pool.certs[0].raw);
        assert_eq!(cert.fingerprint(), pool.certs[0].fingerprint());
    }

    #[test]
    fn test_from_der_malformed() {
        assert!(matches!(
            ChainCert::from_der(b"not a certificate"),
            Err(ChainError::Der(_))
        ));
    }

    #[test]
    fn test_order_ordered_bundle() {
        let chain = build_pool!("../../trust_root/tests/data/chain.pem")
            .into_chain()
            .unwrap();
        assert_eq!(common_names(&chain), ORDERED);
    }

    #[test]
    fn test_order_unordered_bundle() {
        let chain = build_pool!("../../trust_root/tests/data/chain-unordered.pem")
            .into_chain()
            .unwrap();
        assert_eq!(common_names(&chain), ORDERED);
    }

    #[test]
    fn test_order_independent_of_input_order() {
        let pool = build_pool!("../../trust_root/tests/data/chain.pem");
        let forward = order_chain(pool.certs.clone()).unwrap();
        let mut reversed_input = pool.certs;
        reversed_input.reverse();
        let reversed = order_chain(reversed_input).unwrap();
        assert_eq!(
            certs_to_bytes(&forward),
            certs_to_bytes(&reversed),
            "ordering must not depend on bundle order"
        );
    }

    #[test]
    fn test_order_missing_link() {
        let err = build_pool!("../../trust_root/tests/data/chain-incomplete.pem")
            .into_chain()
            .unwrap_err();
        assert!(matches!(err, ChainError::IncompleteChain { remaining: 1 }));
    }

    #[test]
    fn test_order_empty_bundle() {
        let err = CertPool::default().into_chain().unwrap_err();
        assert!(matches!(err, ChainError::IncompleteChain { remaining: 0 }));
    }

    #[test]
    fn test_order_no_root() {
        let pool = build_pool!("../../trust_root/tests/data/chain.pem");
        // Drop the root; the intermediate is not self-issued.
        let err = order_chain(pool.certs[..2].to_vec()).unwrap_err();
        assert!(matches!(err, ChainError::IncompleteChain { remaining: 2 }));
    }

    #[test]
    fn test_order_single_self_signed() {
        let chain = build_pool!("../../trust_root/tests/data/self-signed-leaf.pem")
            .into_chain()
            .unwrap();
        assert_eq!(common_names(&chain), ["Example Self Signed"]);
    }

    #[test]
    fn test_order_second_generation() {
        let chain = build_pool!("../../trust_root/tests/data/chain-2025.pem")
            .into_chain()
            .unwrap();
        assert_eq!(
            common_names(&chain),
            [
                "Example Timestamping 2",
                "Example Intermediate CA 2",
                "Example Root CA 2"
            ]
        );
    }

    #[test]
    fn test_branching_first_match_wins() {
        // Two roots in one bundle: the first self-issued certificate becomes
        // the root, and the other one can no longer be linked.
        let pool = build_pool!(
            "../../trust_root/tests/data/root.pem",
            "../../trust_root/tests/data/self-signed-leaf.pem"
        );
        let err = pool.into_chain().unwrap_err();
        assert!(matches!(err, ChainError::IncompleteChain { remaining: 1 }));
    }

    #[test]
    fn test_pool_drops_duplicates() {
        let mut pool = build_pool!("../../trust_root/tests/data/chain.pem");
        let parsed = pool
            .append_certs_from_pem(include_bytes!(
                "../../trust_root/tests/data/chain-unordered.pem"
            ))
            .unwrap();
        assert_eq!(parsed, 3);
        assert_eq!(pool.len(), 3);
        assert!(pool.includes(&pool.certs[0].clone()));
        assert_eq!(common_names(&pool.into_chain().unwrap()), ORDERED);
    }

    #[test]
    fn test_pool_empty_input() {
        let pool = CertPool::from_pem(b"\n").unwrap();
        assert!(pool.is_empty());
    }
}
