// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! The signing config companion document: where clients obtain certificates,
//! identity tokens, log inclusion, and timestamps.

use crate::Result;
use serde::{Deserialize, Serialize};

pub const SIGNING_CONFIG_MEDIA_TYPE: &str = "application/vnd.dev.sigstore.signingconfig.v0.1+json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningConfig {
    pub media_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ca_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub oidc_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tlog_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tsa_urls: Vec<String>,
}

impl SigningConfig {
    pub fn new(
        ca_url: impl Into<String>,
        oidc_url: impl Into<String>,
        tlog_urls: Vec<String>,
        tsa_urls: Vec<String>,
    ) -> Self {
        Self {
            media_type: SIGNING_CONFIG_MEDIA_TYPE.to_string(),
            ca_url: ca_url.into(),
            oidc_url: oidc_url.into(),
            tlog_urls,
            tsa_urls,
        }
    }

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_config_json() {
        let config = SigningConfig::new(
            "https://fulcio.example.com",
            "",
            vec!["https://rekor.example.com".into()],
            Vec::new(),
        );
        assert_eq!(
            config.to_json(false).unwrap(),
            r#"{"mediaType":"application/vnd.dev.sigstore.signingconfig.v0.1+json","caUrl":"https://fulcio.example.com","tlogUrls":["https://rekor.example.com"]}"#
        );
        let parsed: SigningConfig =
            serde_json::from_str(&config.to_json(true).unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
