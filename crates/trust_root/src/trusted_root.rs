// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! JSON model of a trusted root manifest.
//!
//! Field names and encodings follow the protobuf JSON mapping used by
//! sigstore clients: camelCase keys, base64 byte strings, RFC 3339 times, and
//! empty fields omitted.

use crate::{KeyAlgorithm, Result, WindowError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use std::fmt;
use x509_util::{ChainCert, ChainError, NameInfo};

pub const TRUSTED_ROOT_MEDIA_TYPE: &str = "application/vnd.dev.sigstore.trustedroot+json;version=0.1";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedRoot {
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tlogs: Vec<TransparencyLogInstance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificate_authorities: Vec<CertificateAuthority>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ctlogs: Vec<TransparencyLogInstance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timestamp_authorities: Vec<CertificateAuthority>,
}

impl Default for TrustedRoot {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustedRoot {
    /// Returns an empty manifest carrying the current media type.
    pub fn new() -> Self {
        Self {
            media_type: TRUSTED_ROOT_MEDIA_TYPE.to_string(),
            tlogs: Vec::new(),
            certificate_authorities: Vec::new(),
            ctlogs: Vec::new(),
            timestamp_authorities: Vec::new(),
        }
    }

    /// Parses a manifest from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid manifest.
    pub fn from_json(input: &[u8]) -> Result<Self> {
        let root: Self = serde_json::from_slice(input)?;
        if root.media_type != TRUSTED_ROOT_MEDIA_TYPE {
            log::warn!("Unexpected trusted root media type '{}'", root.media_type);
        }
        Ok(root)
    }

    /// Serializes the manifest, indenting it when `pretty` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}

/// A certificate or timestamping authority and the interval it is trusted for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAuthority {
    pub subject: DistinguishedName,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,
    pub cert_chain: X509CertificateChain,
    pub valid_for: TimeRange,
}

impl CertificateAuthority {
    /// Label used when reporting on this authority.
    pub fn label(&self) -> &str {
        if self.uri.is_empty() {
            &self.subject.common_name
        } else {
            &self.uri
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistinguishedName {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub organization: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub common_name: String,
}

impl From<&NameInfo> for DistinguishedName {
    fn from(name: &NameInfo) -> Self {
        Self {
            organization: name.organization.clone(),
            common_name: name.common_name.clone(),
        }
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O='{}' CN='{}'", self.organization, self.common_name)
    }
}

/// Certificates ordered from the leaf (index 0) to the root (last index).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct X509CertificateChain {
    #[serde(default)]
    pub certificates: Vec<X509Certificate>,
}

impl X509CertificateChain {
    pub fn from_chain(chain: &[ChainCert]) -> Self {
        Self {
            certificates: x509_util::certs_to_bytes(chain)
                .into_iter()
                .map(|raw_bytes| X509Certificate { raw_bytes })
                .collect(),
        }
    }

    /// Parses every certificate in the chain, keeping leaf-to-root order.
    ///
    /// # Errors
    ///
    /// Returns an error if any certificate fails to parse.
    pub fn parse(&self) -> std::result::Result<Vec<ChainCert>, ChainError> {
        self.certificates
            .iter()
            .map(|cert| ChainCert::from_der(&cert.raw_bytes))
            .collect()
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct X509Certificate {
    #[serde_as(as = "Base64")]
    pub raw_bytes: Vec<u8>,
}

/// Interval during which an entry is trusted. An absent end means the entry
/// is still active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// # Errors
    ///
    /// Returns an error if `end` is before `start`.
    pub fn new(
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> std::result::Result<Self, WindowError> {
        if let Some(end) = end {
            if end < start {
                return Err(WindowError::EndBeforeStart { start, end });
            }
        }
        Ok(Self { start, end })
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// A transparency log (Rekor or CT) identified by its public key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransparencyLogInstance {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_url: String,
    pub hash_algorithm: HashAlgorithm,
    pub public_key: PublicKey,
    pub log_id: LogId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum HashAlgorithm {
    #[default]
    #[serde(rename = "SHA2_256")]
    Sha2_256,
    #[serde(rename = "SHA2_384")]
    Sha2_384,
    #[serde(rename = "SHA2_512")]
    Sha2_512,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    /// DER-encoded SubjectPublicKeyInfo.
    #[serde_as(as = "Base64")]
    pub raw_bytes: Vec<u8>,
    pub key_details: KeyAlgorithm,
    pub valid_for: TimeRange,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogId {
    #[serde_as(as = "Base64")]
    pub key_id: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn time(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_root() {
        let json = TrustedRoot::new().to_json(false).unwrap();
        assert_eq!(
            json,
            r#"{"mediaType":"application/vnd.dev.sigstore.trustedroot+json;version=0.1"}"#
        );
        let parsed = TrustedRoot::from_json(json.as_bytes()).unwrap();
        assert_eq!(parsed, TrustedRoot::new());
    }

    #[test]
    fn test_time_range() {
        assert!(TimeRange::new(time(2020), None).unwrap().is_open());
        assert!(TimeRange::new(time(2020), Some(time(2020))).is_ok());
        assert_eq!(
            TimeRange::new(time(2021), Some(time(2020))),
            Err(WindowError::EndBeforeStart {
                start: time(2021),
                end: time(2020)
            })
        );
    }

    #[test]
    fn test_open_end_omitted() {
        let range = TimeRange::new(time(2020), None).unwrap();
        let value = serde_json::to_value(range).unwrap();
        assert!(value.get("end").is_none());
        assert!(value["start"].as_str().unwrap().starts_with("2020-01-01T00:00:00"));

        let closed = TimeRange::new(time(2020), Some(time(2021))).unwrap();
        let value = serde_json::to_value(closed).unwrap();
        assert!(value["end"].as_str().unwrap().starts_with("2021-01-01T00:00:00"));
    }

    #[test]
    fn test_parse_log() {
        let json = r#"{
            "baseUrl": "https://rekor.example.com",
            "hashAlgorithm": "SHA2_256",
            "publicKey": {
                "rawBytes": "AQID",
                "keyDetails": "PKIX_ED25519",
                "validFor": { "start": "2021-01-12T11:53:27.000Z" }
            },
            "logId": { "keyId": "BAUG" }
        }"#;
        let log: TransparencyLogInstance = serde_json::from_str(json).unwrap();
        assert_eq!(log.base_url, "https://rekor.example.com");
        assert_eq!(log.hash_algorithm, HashAlgorithm::Sha2_256);
        assert_eq!(log.public_key.raw_bytes, vec![1, 2, 3]);
        assert_eq!(log.public_key.key_details, KeyAlgorithm::Ed25519);
        assert!(log.public_key.valid_for.is_open());
        assert_eq!(log.log_id.key_id, vec![4, 5, 6]);
    }

    #[test]
    fn test_authority_label() {
        let mut ca = CertificateAuthority {
            subject: DistinguishedName {
                organization: "Example Trust".into(),
                common_name: "Example Root CA".into(),
            },
            uri: String::new(),
            cert_chain: X509CertificateChain::default(),
            valid_for: TimeRange::new(time(2020), None).unwrap(),
        };
        assert_eq!(ca.label(), "Example Root CA");
        ca.uri = "https://ca.example.com".into();
        assert_eq!(ca.label(), "https://ca.example.com");
    }
}
