// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Key lifecycle over a secure key backend.
//
// Tier ladder (platform version from the backend, thresholds from
// `StoreConfig`):
//
//   auth required, below min_platform_version     -> UnsupportedPlatformVersion
//   auth required, below biometric version        -> ValidityWindow(validity_window_secs)
//   auth required, biometric version and later    -> BiometricOrCredential(biometric_window_secs)
//   high-assurance probed and version allows it   -> HighAssurance, else Standard
//   no standard hardware                          -> Software (or HardwareUnavailable
//                                                    when require_hardware is set)
//
// A high-assurance request the backend turns down is retried once at the
// next tier down. No other failure is retried.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use keyward_bridge::SecureKeyBackend;
use keyward_core::config::StoreConfig;
use keyward_core::error::{KeywardError, Result};
use keyward_core::types::{
    AuthPolicy, AuthorizationList, HardwareTier, KeyGenSpec, KeyHandle, KeyKind, RSA_KEY_SIZES,
};

use crate::capability::{Capabilities, CapabilityProbe};

/// Explicit handle to a platform key store.
///
/// Capabilities are resolved once at open time and reused for every
/// generation request.
pub struct KeyStore {
    backend: Arc<dyn SecureKeyBackend>,
    config: StoreConfig,
    capabilities: Capabilities,
}

impl KeyStore {
    /// Validate `config`, probe the backend and open the store.
    #[instrument(skip_all, fields(platform = backend.platform_name()))]
    pub fn open(backend: Arc<dyn SecureKeyBackend>, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let capabilities = CapabilityProbe::new(backend.as_ref(), &config).probe()?;
        Ok(Self::with_capabilities(backend, config, capabilities))
    }

    /// Open with capabilities that were resolved elsewhere.
    pub fn with_capabilities(
        backend: Arc<dyn SecureKeyBackend>,
        config: StoreConfig,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            backend,
            config,
            capabilities,
        }
    }

    pub fn backend(&self) -> &dyn SecureKeyBackend {
        self.backend.as_ref()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Resolve the tier, authentication policy and authorizations for a new key.
    pub fn plan(&self, alias: &str, kind: KeyKind, require_auth: bool) -> Result<KeyGenSpec> {
        if alias.is_empty() {
            return Err(KeywardError::InvalidArgument("alias must not be empty".into()));
        }
        if let KeyKind::Rsa { bits } = kind {
            if !RSA_KEY_SIZES.contains(&bits) {
                return Err(KeywardError::InvalidArgument(format!(
                    "unsupported RSA key size {bits}"
                )));
            }
        }

        let version = self.capabilities.platform_version;
        let config = &self.config;

        let auth_policy = if !require_auth {
            AuthPolicy::None
        } else if version < config.min_platform_version {
            return Err(KeywardError::UnsupportedPlatformVersion {
                found: version,
                required: config.min_platform_version,
            });
        } else if version >= config.biometric_platform_version {
            AuthPolicy::BiometricOrCredential {
                seconds: config.biometric_window_secs,
            }
        } else {
            AuthPolicy::ValidityWindow {
                seconds: config.validity_window_secs,
            }
        };

        let tier = if self.capabilities.high_assurance
            && version >= config.high_assurance_platform_version
        {
            HardwareTier::HighAssurance
        } else {
            self.fallback_tier()?
        };

        Ok(KeyGenSpec {
            alias: alias.to_owned(),
            kind,
            tier,
            auth_policy,
            authorizations: AuthorizationList::for_generated(kind, require_auth),
        })
    }

    /// Tier used when high-assurance backing is not available.
    fn fallback_tier(&self) -> Result<HardwareTier> {
        if self.capabilities.standard_hardware {
            Ok(HardwareTier::Standard)
        } else if self.config.require_hardware {
            Err(KeywardError::HardwareUnavailable(
                "no secure hardware and software keys are disabled".into(),
            ))
        } else {
            Ok(HardwareTier::Software)
        }
    }

    /// Create a key under `alias`.
    ///
    /// With `allow_overwrite` an existing key is deleted first; if that fails
    /// the call fails with `KeyDeletionFailed` and nothing is generated.
    #[instrument(skip_all, fields(alias = %alias, %kind))]
    pub fn generate(
        &self,
        alias: &str,
        kind: KeyKind,
        require_auth: bool,
        allow_overwrite: bool,
    ) -> Result<KeyHandle> {
        let spec = self.plan(alias, kind, require_auth)?;
        self.make_room(alias, allow_overwrite)?;

        let handle = match self.backend.generate(&spec) {
            Err(e) if e.is_hardware_unavailable() && spec.tier == HardwareTier::HighAssurance => {
                let tier = self.fallback_tier()?;
                warn!(reason = %e, %tier, "high-assurance backing refused, degrading");
                self.backend.generate(&KeyGenSpec { tier, ..spec })?
            }
            other => other?,
        };

        info!(tier = %handle.tier, auth = ?handle.auth_policy, "key generated");
        Ok(handle)
    }

    /// Clear `alias` for a new key, honouring `allow_overwrite`.
    pub(crate) fn make_room(&self, alias: &str, allow_overwrite: bool) -> Result<()> {
        if !self.backend.contains(alias)? {
            return Ok(());
        }
        if !allow_overwrite {
            return Err(KeywardError::KeyAlreadyExists(alias.to_owned()));
        }
        self.backend
            .delete(alias)
            .map_err(|e| deletion_failed(alias, e))?;
        debug!(alias, "existing key deleted before overwrite");
        Ok(())
    }

    /// Handle for `alias`, or `KeyNotFound`.
    pub fn get(&self, alias: &str) -> Result<KeyHandle> {
        self.backend
            .entry(alias)?
            .ok_or_else(|| KeywardError::KeyNotFound(alias.to_owned()))
    }

    pub fn contains(&self, alias: &str) -> Result<bool> {
        self.backend.contains(alias)
    }

    /// Remove `alias`. An absent alias is not an error.
    #[instrument(skip(self))]
    pub fn delete(&self, alias: &str) -> Result<()> {
        self.backend.delete(alias).map_err(|e| deletion_failed(alias, e))
    }

    /// DER SubjectPublicKeyInfo of an asymmetric key.
    pub fn public_key_der(&self, alias: &str) -> Result<Vec<u8>> {
        let handle = self.get(alias)?;
        if !handle.kind.is_asymmetric() {
            return Err(KeywardError::OperationUnsupported(format!(
                "{alias} is a symmetric key and has no public key"
            )));
        }
        self.backend.public_key_der(alias)
    }

    /// `PUBLIC KEY` PEM of an asymmetric key.
    #[instrument(skip(self))]
    pub fn export_public_key_pem(&self, alias: &str) -> Result<String> {
        let der = self.public_key_der(alias)?;
        debug!(fingerprint = %keyward_security::fingerprint(&der), "public key exported");
        keyward_security::public_key_pem(&der)
    }

    /// Hex SHA-256 of the key's SubjectPublicKeyInfo.
    pub fn public_key_fingerprint(&self, alias: &str) -> Result<String> {
        self.public_key_der(alias)
            .map(|der| keyward_security::fingerprint(&der))
    }
}

fn deletion_failed(alias: &str, e: KeywardError) -> KeywardError {
    match e {
        KeywardError::KeyDeletionFailed { .. } => e,
        other => KeywardError::KeyDeletionFailed {
            alias: alias.to_owned(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_bridge::{AuthMethod, SoftwareBackend, SoftwareProfile};
    use keyward_core::types::KeyPurpose;

    fn open(profile: SoftwareProfile, config: StoreConfig) -> (Arc<SoftwareBackend>, KeyStore) {
        let backend = Arc::new(SoftwareBackend::new(profile));
        let store = KeyStore::open(backend.clone(), config).expect("open store");
        (backend, store)
    }

    fn open_default() -> (Arc<SoftwareBackend>, KeyStore) {
        open(SoftwareProfile::default(), StoreConfig::default())
    }

    fn at_version(version: u32) -> SoftwareProfile {
        SoftwareProfile {
            platform_version: version,
            ..SoftwareProfile::default()
        }
    }

    #[test]
    fn ladder_below_minimum_version() {
        let (_, store) = open(at_version(22), StoreConfig::default());
        assert!(matches!(
            store.plan("k", KeyKind::Aes256, true),
            Err(KeywardError::UnsupportedPlatformVersion { found: 22, required: 23 })
        ));
        let spec = store.plan("k", KeyKind::Aes256, false).expect("no auth still works");
        assert_eq!(spec.tier, HardwareTier::Software);
    }

    #[test]
    fn ladder_validity_window_without_high_assurance() {
        let (_, store) = open(at_version(26), StoreConfig::default());
        let spec = store.plan("k", KeyKind::EcP256, true).unwrap();
        assert_eq!(spec.auth_policy, AuthPolicy::ValidityWindow { seconds: 300 });
        assert_eq!(spec.tier, HardwareTier::Standard);
    }

    #[test]
    fn ladder_validity_window_with_high_assurance() {
        let (_, store) = open(at_version(28), StoreConfig::default());
        let spec = store.plan("k", KeyKind::EcP256, true).unwrap();
        assert_eq!(spec.auth_policy, AuthPolicy::ValidityWindow { seconds: 300 });
        assert_eq!(spec.tier, HardwareTier::HighAssurance);
    }

    #[test]
    fn ladder_biometric_or_credential() {
        let (_, store) = open(at_version(30), StoreConfig::default());
        let spec = store.plan("k", KeyKind::Aes256, true).unwrap();
        assert_eq!(spec.auth_policy, AuthPolicy::BiometricOrCredential { seconds: 120 });
        assert_eq!(spec.tier, HardwareTier::HighAssurance);
        assert!(!spec.authorizations.no_auth_required);
    }

    #[test]
    fn ladder_never_drops_an_available_tier() {
        let (_, store) = open(SoftwareProfile::standard_only(34), StoreConfig::default());
        for require_auth in [false, true] {
            let spec = store.plan("k", KeyKind::Aes256, require_auth).unwrap();
            assert_eq!(spec.tier, HardwareTier::Standard);
        }
    }

    #[test]
    fn require_hardware_refuses_software_keys() {
        let config = StoreConfig {
            require_hardware: true,
            ..StoreConfig::default()
        };
        let (backend, store) = open(SoftwareProfile::software_only(34), config);
        assert!(matches!(
            store.generate("k", KeyKind::Aes256, false, false),
            Err(KeywardError::HardwareUnavailable(_))
        ));
        assert!(backend.aliases().is_empty());
    }

    #[test]
    fn large_rsa_degrades_from_high_assurance() {
        let (_, store) = open_default();
        let handle = store
            .generate("rsa", KeyKind::Rsa { bits: 3072 }, false, false)
            .expect("falls back to standard hardware");
        assert_eq!(handle.tier, HardwareTier::Standard);
        assert!(handle.purposes.contains(&KeyPurpose::WrapKey));
    }

    #[test]
    fn unsupported_rsa_size_rejected() {
        let (_, store) = open_default();
        assert!(matches!(
            store.generate("rsa", KeyKind::Rsa { bits: 1024 }, false, false),
            Err(KeywardError::InvalidArgument(_))
        ));
    }

    #[test]
    fn existing_alias_requires_overwrite() {
        let (backend, store) = open_default();
        store.generate("k1", KeyKind::Aes256, false, false).unwrap();
        assert!(matches!(
            store.generate("k1", KeyKind::Aes256, false, false),
            Err(KeywardError::KeyAlreadyExists(_))
        ));

        let iv = [9u8; 12];
        let before = backend.aead_seal("k1", &iv, b"", b"same input").unwrap();
        store
            .generate("k1", KeyKind::Aes256, false, true)
            .expect("overwrite replaces the key");
        let after = backend.aead_seal("k1", &iv, b"", b"same input").unwrap();
        assert_ne!(before, after, "old key material must be gone");
        assert!(backend.aead_open("k1", &iv, b"", &before).is_err());
    }

    #[test]
    fn overwrite_stops_when_delete_fails() {
        let (backend, store) = open_default();
        store.generate("locked", KeyKind::EcP256, false, false).unwrap();
        let original = store.get("locked").unwrap();
        backend.inject_delete_failure("locked");

        assert!(matches!(
            store.generate("locked", KeyKind::Aes256, false, true),
            Err(KeywardError::KeyDeletionFailed { .. })
        ));
        assert_eq!(store.get("locked").unwrap(), original, "old key untouched");
    }

    #[test]
    fn generate_delete_generate() {
        let (backend, store) = open_default();
        store.generate("k", KeyKind::Aes256, true, false).unwrap();
        store.delete("k").unwrap();
        store.delete("k").expect("deleting twice is fine");
        assert!(matches!(store.get("k"), Err(KeywardError::KeyNotFound(_))));

        let handle = store.generate("k", KeyKind::Aes256, false, false).unwrap();
        assert_eq!(handle.auth_policy, AuthPolicy::None, "no policy carried over");
        backend.clear_user_authentication();
        backend
            .aead_seal("k", &[0u8; 12], b"", b"x")
            .expect("usable without authentication");
    }

    #[test]
    fn auth_bound_key_needs_user_presence() {
        let (backend, store) = open_default();
        store.generate("k", KeyKind::Aes256, true, false).unwrap();
        assert!(matches!(
            backend.aead_seal("k", &[0u8; 12], b"", b"x"),
            Err(KeywardError::AuthorizationFailed(_))
        ));
        backend.record_user_authentication(AuthMethod::Biometric);
        backend.aead_seal("k", &[0u8; 12], b"", b"x").unwrap();
    }

    #[test]
    fn public_key_export() {
        let (_, store) = open_default();
        store.generate("ec", KeyKind::EcP256, false, false).unwrap();
        store.generate("aes", KeyKind::Aes256, false, false).unwrap();

        let pem = store.export_public_key_pem("ec").unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert_eq!(store.public_key_fingerprint("ec").unwrap().len(), 64);

        assert!(matches!(
            store.export_public_key_pem("aes"),
            Err(KeywardError::OperationUnsupported(_))
        ));
        assert!(matches!(
            store.export_public_key_pem("nope"),
            Err(KeywardError::KeyNotFound(_))
        ));
    }

    #[test]
    fn invalid_config_rejected_at_open() {
        let backend = Arc::new(SoftwareBackend::new(SoftwareProfile::default()));
        let config = StoreConfig {
            validity_window_secs: 0,
            ..StoreConfig::default()
        };
        assert!(matches!(
            KeyStore::open(backend, config),
            Err(KeywardError::InvalidArgument(_))
        ));
    }
}
