// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Construction of manifest entries from PEM inputs.

use crate::{
    public_key_der_from_pem, CertificateAuthority, DistinguishedName, HashAlgorithm,
    KeyAlgorithm, LogId, PublicKey, Result, RsaPadding, TimeRange, TransparencyLogInstance,
    WindowError, X509CertificateChain,
};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use x509_util::{CertPool, ChainError};

/// Builds a certificate or timestamping authority from a PEM bundle holding
/// its certificates in any order.
///
/// The chain is ordered leaf to root and the subject is copied from the root.
/// `start` must fall within the root certificate's validity period.
///
/// # Errors
///
/// Returns an error if the bundle cannot be parsed or ordered, or if the
/// validity window is invalid.
pub fn new_certificate_authority(
    pem_bundle: &[u8],
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    uri: &str,
) -> Result<CertificateAuthority> {
    let chain = CertPool::from_pem(pem_bundle)?.into_chain()?;
    let root = chain
        .last()
        .ok_or(ChainError::IncompleteChain { remaining: 0 })?;

    if start < root.not_before {
        return Err(WindowError::StartBeforeRoot {
            start,
            not_before: root.not_before,
        }
        .into());
    }
    if start > root.not_after {
        return Err(WindowError::StartAfterRoot {
            start,
            not_after: root.not_after,
        }
        .into());
    }
    let valid_for = TimeRange::new(start, end)?;

    log::debug!(
        "Built authority {} with {} certificate(s)",
        root.subject,
        chain.len()
    );
    Ok(CertificateAuthority {
        subject: DistinguishedName::from(&root.subject),
        uri: uri.to_string(),
        cert_chain: X509CertificateChain::from_chain(&chain),
        valid_for,
    })
}

/// Builds a transparency log entry from a PEM public key. The log ID is the
/// SHA-256 digest of the DER SubjectPublicKeyInfo.
///
/// # Errors
///
/// Returns an error if the key cannot be parsed or is unsupported, or if the
/// validity window is invalid.
pub fn new_transparency_log(
    pem_key: &[u8],
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    base_url: &str,
    padding: RsaPadding,
) -> Result<TransparencyLogInstance> {
    let spki = public_key_der_from_pem(pem_key)?;
    let key_details = KeyAlgorithm::from_spki_der(&spki, padding)?;
    let valid_for = TimeRange::new(start, end)?;
    let key_id = Sha256::digest(&spki).to_vec();

    log::debug!("Built log {base_url} with {key_details} key {}", hex::encode(&key_id));
    Ok(TransparencyLogInstance {
        base_url: base_url.to_string(),
        hash_algorithm: HashAlgorithm::Sha2_256,
        public_key: PublicKey {
            raw_bytes: spki,
            key_details,
            valid_for,
        },
        log_id: LogId { key_id },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrustRootError;
    use chrono::TimeZone;

    fn time(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_new_certificate_authority() {
        let ca = new_certificate_authority(
            include_bytes!("../tests/data/chain-unordered.pem"),
            time(2020),
            None,
            "https://fulcio.example.com",
        )
        .unwrap();
        assert_eq!(ca.subject.organization, "Example Trust");
        assert_eq!(ca.subject.common_name, "Example Root CA");
        assert_eq!(ca.uri, "https://fulcio.example.com");
        assert_eq!(ca.valid_for, TimeRange::new(time(2020), None).unwrap());

        let chain = ca.cert_chain.parse().unwrap();
        let names: Vec<_> = chain.iter().map(|c| c.subject.common_name.as_str()).collect();
        assert_eq!(
            names,
            ["Example Timestamping", "Example Intermediate CA", "Example Root CA"]
        );
    }

    #[test]
    fn test_authority_matches_ordered_bundle() {
        let unordered = new_certificate_authority(
            include_bytes!("../tests/data/chain-unordered.pem"),
            time(2021),
            Some(time(2022)),
            "",
        )
        .unwrap();
        let ordered = new_certificate_authority(
            include_bytes!("../tests/data/chain.pem"),
            time(2021),
            Some(time(2022)),
            "",
        )
        .unwrap();
        assert_eq!(unordered, ordered);
    }

    #[test]
    fn test_authority_start_outside_root() {
        let bundle = include_bytes!("../tests/data/chain.pem");
        assert!(matches!(
            new_certificate_authority(bundle, time(2019), None, ""),
            Err(TrustRootError::InvalidValidityWindow(
                WindowError::StartBeforeRoot { .. }
            ))
        ));
        assert!(matches!(
            new_certificate_authority(bundle, time(2041), None, ""),
            Err(TrustRootError::InvalidValidityWindow(
                WindowError::StartAfterRoot { .. }
            ))
        ));
        assert!(matches!(
            new_certificate_authority(bundle, time(2022), Some(time(2021)), ""),
            Err(TrustRootError::InvalidValidityWindow(
                WindowError::EndBeforeStart { .. }
            ))
        ));
    }

    #[test]
    fn test_authority_bad_bundle() {
        assert!(matches!(
            new_certificate_authority(
                include_bytes!("../tests/data/chain-incomplete.pem"),
                time(2020),
                None,
                ""
            ),
            Err(TrustRootError::Chain(ChainError::IncompleteChain {
                remaining: 1
            }))
        ));
        assert!(matches!(
            new_certificate_authority(b"", time(2020), None, ""),
            Err(TrustRootError::Chain(ChainError::IncompleteChain {
                remaining: 0
            }))
        ));
        assert!(new_certificate_authority(
            b"-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n",
            time(2020),
            None,
            ""
        )
        .is_err());
    }

    #[test]
    fn test_new_transparency_log() {
        let log = new_transparency_log(
            include_bytes!("../tests/data/ec-p256.pem"),
            time(2021),
            None,
            "https://rekor.example.com",
            RsaPadding::Pkcs1v15,
        )
        .unwrap();
        assert_eq!(log.base_url, "https://rekor.example.com");
        assert_eq!(log.hash_algorithm, HashAlgorithm::Sha2_256);
        assert_eq!(log.public_key.key_details, KeyAlgorithm::EcdsaP256Sha256);
        assert!(log.public_key.valid_for.is_open());
        assert_eq!(
            hex::encode(&log.log_id.key_id),
            "34c37cd6c09b734ec5ee692748c5f17fe8bb663bd09cdfe47f3e908ebc3df962"
        );
        assert_eq!(
            log.log_id.key_id,
            Sha256::digest(&log.public_key.raw_bytes).to_vec()
        );
    }

    #[test]
    fn test_transparency_log_pkcs1_key() {
        let log = new_transparency_log(
            include_bytes!("../tests/data/rsa-2048-pkcs1.pem"),
            time(2021),
            Some(time(2022)),
            "https://ctlog.example.com",
            RsaPadding::Pss,
        )
        .unwrap();
        assert_eq!(log.public_key.key_details, KeyAlgorithm::RsaPss2048Sha256);
        assert_eq!(
            hex::encode(&log.log_id.key_id),
            "a95e54fd03d25546ff7e579d40715336cd117de15194e44ecae66a2faf0fb778"
        );
        assert_eq!(log.public_key.valid_for.end, Some(time(2022)));
    }

    #[test]
    fn test_transparency_log_errors() {
        assert!(matches!(
            new_transparency_log(
                include_bytes!("../tests/data/rsa-1024.pem"),
                time(2021),
                None,
                "",
                RsaPadding::Pkcs1v15
            ),
            Err(TrustRootError::UnsupportedKey(_))
        ));
        assert!(matches!(
            new_transparency_log(
                include_bytes!("../tests/data/ed25519.pem"),
                time(2021),
                Some(time(2020)),
                "",
                RsaPadding::Pkcs1v15
            ),
            Err(TrustRootError::InvalidValidityWindow(_))
        ));
    }
}
