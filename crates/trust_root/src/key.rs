// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Classification of log public keys into the algorithm identifiers a
//! trusted root understands.

use crate::{Result, TrustRootError};
use const_oid::{
    db::{
        rfc5912::{ID_EC_PUBLIC_KEY, RSA_ENCRYPTION, SECP_256_R_1, SECP_384_R_1, SECP_521_R_1},
        rfc8410::ID_ED_25519,
    },
    ObjectIdentifier,
};
use der::{
    asn1::{AnyRef, BitStringRef, UintRef},
    Decode, Encode, Sequence,
};
use serde::{Deserialize, Serialize};
use spki::{AlgorithmIdentifierRef, SubjectPublicKeyInfoRef};
use std::{fmt, str::FromStr};

const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";
const RSA_PUBLIC_KEY_LABEL: &str = "RSA PUBLIC KEY";

/// Signature algorithm and key parameters of a log's public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum KeyAlgorithm {
    #[serde(rename = "PKIX_ECDSA_P256_SHA_256")]
    EcdsaP256Sha256,
    #[serde(rename = "PKIX_ECDSA_P384_SHA_384")]
    EcdsaP384Sha384,
    #[serde(rename = "PKIX_ECDSA_P521_SHA_512")]
    EcdsaP521Sha512,
    #[serde(rename = "PKIX_RSA_PKCS1V15_2048_SHA256")]
    RsaPkcs1v15_2048Sha256,
    #[serde(rename = "PKIX_RSA_PKCS1V15_3072_SHA256")]
    RsaPkcs1v15_3072Sha256,
    #[serde(rename = "PKIX_RSA_PKCS1V15_4096_SHA256")]
    RsaPkcs1v15_4096Sha256,
    #[serde(rename = "PKIX_RSA_PSS_2048_SHA256")]
    RsaPss2048Sha256,
    #[serde(rename = "PKIX_RSA_PSS_3072_SHA256")]
    RsaPss3072Sha256,
    #[serde(rename = "PKIX_RSA_PSS_4096_SHA256")]
    RsaPss4096Sha256,
    #[serde(rename = "PKIX_ED25519")]
    Ed25519,
}

impl KeyAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EcdsaP256Sha256 => "PKIX_ECDSA_P256_SHA_256",
            Self::EcdsaP384Sha384 => "PKIX_ECDSA_P384_SHA_384",
            Self::EcdsaP521Sha512 => "PKIX_ECDSA_P521_SHA_512",
            Self::RsaPkcs1v15_2048Sha256 => "PKIX_RSA_PKCS1V15_2048_SHA256",
            Self::RsaPkcs1v15_3072Sha256 => "PKIX_RSA_PKCS1V15_3072_SHA256",
            Self::RsaPkcs1v15_4096Sha256 => "PKIX_RSA_PKCS1V15_4096_SHA256",
            Self::RsaPss2048Sha256 => "PKIX_RSA_PSS_2048_SHA256",
            Self::RsaPss3072Sha256 => "PKIX_RSA_PSS_3072_SHA256",
            Self::RsaPss4096Sha256 => "PKIX_RSA_PSS_4096_SHA256",
            Self::Ed25519 => "PKIX_ED25519",
        }
    }

    /// Maps a key shape to its algorithm identifier. RSA keys use `padding`;
    /// other key types ignore it.
    ///
    /// # Errors
    ///
    /// Returns [`TrustRootError::UnsupportedKey`] for curves, modulus sizes
    /// or algorithms with no identifier.
    pub fn classify(shape: &KeyShape, padding: RsaPadding) -> Result<Self> {
        match shape {
            KeyShape::Ecdsa { curve } => match curve {
                c if *c == SECP_256_R_1 => Ok(Self::EcdsaP256Sha256),
                c if *c == SECP_384_R_1 => Ok(Self::EcdsaP384Sha384),
                c if *c == SECP_521_R_1 => Ok(Self::EcdsaP521Sha512),
                _ => Err(TrustRootError::UnsupportedKey(format!(
                    "unsupported elliptic curve {curve}"
                ))),
            },
            KeyShape::Rsa { modulus_bits } => match (*modulus_bits, padding) {
                (2048, RsaPadding::Pkcs1v15) => Ok(Self::RsaPkcs1v15_2048Sha256),
                (3072, RsaPadding::Pkcs1v15) => Ok(Self::RsaPkcs1v15_3072Sha256),
                (4096, RsaPadding::Pkcs1v15) => Ok(Self::RsaPkcs1v15_4096Sha256),
                (2048, RsaPadding::Pss) => Ok(Self::RsaPss2048Sha256),
                (3072, RsaPadding::Pss) => Ok(Self::RsaPss3072Sha256),
                (4096, RsaPadding::Pss) => Ok(Self::RsaPss4096Sha256),
                _ => Err(TrustRootError::UnsupportedKey(format!(
                    "unsupported RSA modulus size of {modulus_bits} bits"
                ))),
            },
            KeyShape::Ed25519 => Ok(Self::Ed25519),
            KeyShape::Other { algorithm } => Err(TrustRootError::UnsupportedKey(format!(
                "unsupported public key algorithm {algorithm}"
            ))),
        }
    }

    /// Classifies a DER-encoded SubjectPublicKeyInfo.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be parsed or is unsupported.
    pub fn from_spki_der(spki: &[u8], padding: RsaPadding) -> Result<Self> {
        let spki = SubjectPublicKeyInfoRef::from_der(spki)?;
        Self::classify(&KeyShape::from_spki(&spki)?, padding)
    }

    pub fn is_rsa(&self) -> bool {
        !matches!(
            self,
            Self::EcdsaP256Sha256 | Self::EcdsaP384Sha384 | Self::EcdsaP521Sha512 | Self::Ed25519
        )
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signature padding for RSA keys. The key itself does not record it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RsaPadding {
    #[default]
    Pkcs1v15,
    Pss,
}

impl FromStr for RsaPadding {
    type Err = TrustRootError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pkcs1v15" => Ok(Self::Pkcs1v15),
            "pss" => Ok(Self::Pss),
            _ => Err(TrustRootError::MalformedInput(format!(
                "unknown RSA padding '{s}', expected 'pkcs1v15' or 'pss'"
            ))),
        }
    }
}

impl fmt::Display for RsaPadding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pkcs1v15 => f.write_str("pkcs1v15"),
            Self::Pss => f.write_str("pss"),
        }
    }
}

/// The properties of a public key that decide its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyShape {
    Ecdsa { curve: ObjectIdentifier },
    Rsa { modulus_bits: usize },
    Ed25519,
    Other { algorithm: ObjectIdentifier },
}

impl KeyShape {
    /// # Errors
    ///
    /// Returns an error if the algorithm parameters or RSA key are malformed.
    pub fn from_spki(spki: &SubjectPublicKeyInfoRef<'_>) -> Result<Self> {
        let algorithm = spki.algorithm.oid;
        if algorithm == ID_EC_PUBLIC_KEY {
            Ok(Self::Ecdsa {
                curve: spki.algorithm.parameters_oid()?,
            })
        } else if algorithm == RSA_ENCRYPTION {
            let key = RsaPublicKey::from_der(spki.subject_public_key.raw_bytes())?;
            Ok(Self::Rsa {
                modulus_bits: bit_len(key.modulus.as_bytes()),
            })
        } else if algorithm == ID_ED_25519 {
            Ok(Self::Ed25519)
        } else {
            Ok(Self::Other { algorithm })
        }
    }
}

/// PKCS#1 RSAPublicKey.
#[derive(Sequence)]
struct RsaPublicKey<'a> {
    modulus: UintRef<'a>,
    public_exponent: UintRef<'a>,
}

fn bit_len(bytes: &[u8]) -> usize {
    match bytes.first() {
        Some(first) => bytes.len() * 8 - first.leading_zeros() as usize,
        None => 0,
    }
}

/// Decodes a PEM public key into DER SubjectPublicKeyInfo. PKCS#1
/// `RSA PUBLIC KEY` blocks are re-encoded as SubjectPublicKeyInfo.
///
/// # Errors
///
/// Returns [`TrustRootError::MalformedInput`] if the input is not a single
/// PEM public key, or a DER error if its contents do not parse.
pub fn public_key_der_from_pem(input: &[u8]) -> Result<Vec<u8>> {
    let (label, der) = der::pem::decode_vec(input)
        .map_err(|e| TrustRootError::MalformedInput(format!("invalid PEM public key: {e}")))?;
    match label {
        PUBLIC_KEY_LABEL => {
            SubjectPublicKeyInfoRef::from_der(&der)?;
            Ok(der)
        }
        RSA_PUBLIC_KEY_LABEL => pkcs1_to_spki(&der),
        _ => Err(TrustRootError::MalformedInput(format!(
            "unexpected PEM label '{label}', expected '{PUBLIC_KEY_LABEL}' or '{RSA_PUBLIC_KEY_LABEL}'"
        ))),
    }
}

fn pkcs1_to_spki(pkcs1: &[u8]) -> Result<Vec<u8>> {
    RsaPublicKey::from_der(pkcs1)?;
    let spki = SubjectPublicKeyInfoRef {
        algorithm: AlgorithmIdentifierRef {
            oid: RSA_ENCRYPTION,
            parameters: Some(AnyRef::NULL),
        },
        subject_public_key: BitStringRef::from_bytes(pkcs1)?,
    };
    Ok(spki.to_der()?)
}
