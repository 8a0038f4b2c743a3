// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Key store configuration.

use serde::{Deserialize, Serialize};

use crate::error::{KeywardError, Result};

/// Settings that drive tier selection and probing.
///
/// Platform versions are backend-defined integers (the Android API level on
/// Android). The thresholds must be non-decreasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Minimum version for hardware-backed and auth-bound keys.
    pub min_platform_version: u32,
    /// First version where high-assurance backing may be attached.
    pub high_assurance_platform_version: u32,
    /// First version that supports biometric-or-credential parameters.
    pub biometric_platform_version: u32,
    /// Validity window (seconds) for auth-bound keys on the validity rungs.
    pub validity_window_secs: u32,
    /// Validity window (seconds) for biometric-or-credential keys.
    pub biometric_window_secs: u32,
    /// Refuse to fall back to software-tier keys.
    pub require_hardware: bool,
    /// Prefix for throwaway probe aliases.
    pub probe_alias_prefix: String,
    /// RSA size used when a caller does not specify one.
    pub default_rsa_key_bits: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            min_platform_version: 23,
            high_assurance_platform_version: 28,
            biometric_platform_version: 30,
            validity_window_secs: 5 * 60,
            biometric_window_secs: 2 * 60,
            require_hardware: false,
            probe_alias_prefix: "__keyward_probe_".to_string(),
            default_rsa_key_bits: 2048,
        }
    }
}

impl StoreConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_platform_version > self.high_assurance_platform_version
            || self.high_assurance_platform_version > self.biometric_platform_version
        {
            return Err(KeywardError::InvalidArgument(
                "platform version thresholds must be non-decreasing".into(),
            ));
        }
        if self.validity_window_secs == 0 || self.biometric_window_secs == 0 {
            return Err(KeywardError::InvalidArgument(
                "authentication windows must be non-zero".into(),
            ));
        }
        if self.probe_alias_prefix.is_empty() {
            return Err(KeywardError::InvalidArgument(
                "probe alias prefix must not be empty".into(),
            ));
        }
        if !crate::types::RSA_KEY_SIZES.contains(&self.default_rsa_key_bits) {
            return Err(KeywardError::InvalidArgument(format!(
                "unsupported default RSA size {}",
                self.default_rsa_key_bits
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        StoreConfig::default().validate().expect("defaults must validate");
    }

    #[test]
    fn partial_json_takes_defaults() {
        let config = StoreConfig::from_json(r#"{ "validity_window_secs": 60 }"#)
            .expect("partial config parses");
        assert_eq!(config.validity_window_secs, 60);
        assert_eq!(config.biometric_window_secs, 120);
        assert_eq!(config.min_platform_version, 23);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let result = StoreConfig::from_json(
            r#"{ "high_assurance_platform_version": 31, "biometric_platform_version": 30 }"#,
        );
        assert!(matches!(result, Err(KeywardError::InvalidArgument(_))));
    }

    #[test]
    fn rejects_malformed_json() {
        let result = StoreConfig::from_json("{ not json");
        assert!(matches!(result, Err(KeywardError::Serialization(_))));
    }
}
