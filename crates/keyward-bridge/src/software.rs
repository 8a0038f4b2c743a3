// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process secure element emulator.
//
// Keys live in memory behind a mutex and never leave it except as public
// keys. The emulator follows the same contract as a device key store: tier
// availability, authorization lists, user-authentication windows and secure
// import are all enforced. It backs the desktop build of `keyward-doctor` and
// every store-level test; fault injection hooks let tests drive the cleanup
// paths.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use keyward_core::error::{KeywardError, Result};
use keyward_core::types::{
    AES_256_KEY_LEN, Algorithm, AuthPolicy, AuthorizationList, BlockMode, HardwareTier,
    KeyFormat, KeyGenSpec, KeyHandle, KeyKind, KeyPurpose, Padding, RSA_KEY_SIZES,
    SignatureScheme,
};
use keyward_security::{KeyDescription, WrappedKeyBundle, aead, oaep};
use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::{Signature, SigningKey};
use rand::RngCore;
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha512};
use tracing::{debug, info, instrument};
use zeroize::Zeroizing;

use crate::traits::SecureKeyBackend;

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// What the emulated device offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareProfile {
    pub platform_name: String,
    pub platform_version: u32,
    /// A standard secure environment (TEE) is present.
    pub standard_hardware: bool,
    /// A high-assurance secure element is present.
    pub high_assurance: bool,
    /// Largest RSA key the high-assurance element can hold.
    pub high_assurance_rsa_max_bits: u32,
    pub raw_digest_signing: bool,
    pub secure_import: bool,
    /// Validity window given to imported keys that require authentication.
    pub imported_key_validity_secs: u32,
}

impl Default for SoftwareProfile {
    fn default() -> Self {
        Self {
            platform_name: "Software emulator".into(),
            platform_version: 34,
            standard_hardware: true,
            high_assurance: true,
            high_assurance_rsa_max_bits: 2048,
            raw_digest_signing: true,
            secure_import: true,
            imported_key_validity_secs: 300,
        }
    }
}

impl SoftwareProfile {
    /// A device with no secure hardware at all.
    pub fn software_only(platform_version: u32) -> Self {
        Self {
            platform_version,
            standard_hardware: false,
            high_assurance: false,
            secure_import: false,
            ..Self::default()
        }
    }

    /// A device with a TEE but no secure element.
    pub fn standard_only(platform_version: u32) -> Self {
        Self {
            platform_version,
            high_assurance: false,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// How the user last proved presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    DeviceCredential,
    Biometric,
}

#[derive(Debug, Clone, Copy)]
struct AuthEvent {
    method: AuthMethod,
    at: DateTime<Utc>,
}

#[derive(Clone)]
enum KeyMaterial {
    Aes(Zeroizing<Vec<u8>>),
    Ec(SigningKey),
    Rsa(Box<RsaPrivateKey>),
}

struct StoredKey {
    handle: KeyHandle,
    authorizations: AuthorizationList,
    material: KeyMaterial,
}

#[derive(Default)]
struct State {
    keys: HashMap<String, StoredKey>,
    last_auth: Option<AuthEvent>,
    failing_delete_prefixes: Vec<String>,
    failing_generate_prefixes: Vec<String>,
}

/// Emulated secure key store.
pub struct SoftwareBackend {
    profile: SoftwareProfile,
    state: Mutex<State>,
}

impl SoftwareBackend {
    pub fn new(profile: SoftwareProfile) -> Self {
        Self {
            profile,
            state: Mutex::new(State::default()),
        }
    }

    pub fn profile(&self) -> &SoftwareProfile {
        &self.profile
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a successful user authentication now.
    pub fn record_user_authentication(&self, method: AuthMethod) {
        self.record_user_authentication_at(method, Utc::now());
    }

    /// Record a user authentication at `at`.
    pub fn record_user_authentication_at(&self, method: AuthMethod, at: DateTime<Utc>) {
        debug!(?method, "user authentication recorded");
        self.lock().last_auth = Some(AuthEvent { method, at });
    }

    pub fn clear_user_authentication(&self) {
        self.lock().last_auth = None;
    }

    /// Make every delete of an alias starting with `alias_prefix` fail.
    pub fn inject_delete_failure(&self, alias_prefix: &str) {
        self.lock().failing_delete_prefixes.push(alias_prefix.to_owned());
    }

    /// Make generation for aliases starting with `alias_prefix` fail with a
    /// bridge error after the entry has already been created, as a platform
    /// might when it crashes mid-operation.
    pub fn inject_generate_failure(&self, alias_prefix: &str) {
        self.lock().failing_generate_prefixes.push(alias_prefix.to_owned());
    }

    pub fn clear_faults(&self) {
        let mut state = self.lock();
        state.failing_delete_prefixes.clear();
        state.failing_generate_prefixes.clear();
    }

    /// Every alias currently stored, sorted.
    pub fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.lock().keys.keys().cloned().collect();
        aliases.sort();
        aliases
    }

    fn check_tier(&self, spec: &KeyGenSpec) -> Result<()> {
        match spec.tier {
            HardwareTier::Software => Ok(()),
            HardwareTier::Standard if self.profile.standard_hardware => Ok(()),
            HardwareTier::Standard => Err(KeywardError::HardwareUnavailable(
                "no secure hardware on this device".into(),
            )),
            HardwareTier::HighAssurance if !self.profile.high_assurance => Err(
                KeywardError::HardwareUnavailable("no high-assurance secure element".into()),
            ),
            HardwareTier::HighAssurance => match spec.kind {
                KeyKind::Rsa { bits } if bits > self.profile.high_assurance_rsa_max_bits => {
                    Err(KeywardError::HardwareUnavailable(format!(
                        "secure element holds RSA keys up to {} bits",
                        self.profile.high_assurance_rsa_max_bits
                    )))
                }
                _ => Ok(()),
            },
        }
    }

    fn check_user_auth(state: &State, alias: &str, policy: AuthPolicy, now: DateTime<Utc>) -> Result<()> {
        let Some(window) = policy.window_secs() else {
            return Ok(());
        };
        match state.last_auth {
            Some(event) if event.at <= now && now - event.at <= Duration::seconds(i64::from(window)) => {
                debug!(alias, method = ?event.method, "user authentication accepted");
                Ok(())
            }
            _ => Err(KeywardError::AuthorizationFailed(format!(
                "{alias} requires user authentication within the last {window} s"
            ))),
        }
    }

    /// Copy out what an operation with `purpose` needs, after checking the
    /// key's authorizations and the user-authentication window.
    fn usable(&self, alias: &str, purpose: KeyPurpose) -> Result<(AuthorizationList, KeyMaterial)> {
        let state = self.lock();
        let stored = state
            .keys
            .get(alias)
            .ok_or_else(|| KeywardError::KeyNotFound(alias.to_owned()))?;
        if !stored.authorizations.permits(purpose) {
            return Err(KeywardError::AuthorizationFailed(format!(
                "{alias} is not authorized for {purpose:?}"
            )));
        }
        Self::check_user_auth(&state, alias, stored.handle.auth_policy, Utc::now())?;
        Ok((stored.authorizations.clone(), stored.material.clone()))
    }

    fn aes_key(alias: &str, list: &AuthorizationList, material: KeyMaterial) -> Result<Zeroizing<Vec<u8>>> {
        if !list.block_modes.contains(&BlockMode::Gcm) {
            return Err(KeywardError::AuthorizationFailed(format!(
                "{alias} is not authorized for GCM"
            )));
        }
        match material {
            KeyMaterial::Aes(key) => Ok(key),
            _ => Err(KeywardError::InvalidArgument(format!("{alias} is not an AES key"))),
        }
    }
}

fn new_material(kind: KeyKind) -> Result<KeyMaterial> {
    match kind {
        KeyKind::Aes256 => {
            let mut key = Zeroizing::new(vec![0u8; AES_256_KEY_LEN]);
            OsRng.fill_bytes(key.as_mut_slice());
            Ok(KeyMaterial::Aes(key))
        }
        KeyKind::EcP256 => Ok(KeyMaterial::Ec(SigningKey::random(&mut OsRng))),
        KeyKind::Rsa { bits } => {
            if !RSA_KEY_SIZES.contains(&bits) {
                return Err(KeywardError::InvalidArgument(format!(
                    "unsupported RSA key size {bits}"
                )));
            }
            RsaPrivateKey::new(&mut OsRng, bits as usize)
                .map(|key| KeyMaterial::Rsa(Box::new(key)))
                .map_err(|e| KeywardError::KeyGenerationFailed(format!("RSA-{bits}: {e}")))
        }
    }
}

fn imported_material(description: &KeyDescription, plain: &[u8]) -> Result<(KeyKind, KeyMaterial)> {
    let list = &description.authorizations;
    let rejected = |what: String| KeywardError::ImportRejected(what);

    match (description.key_format, list.algorithm) {
        (KeyFormat::Raw, Algorithm::Aes) => {
            if list.key_size_bits != 256 || plain.len() != AES_256_KEY_LEN {
                return Err(rejected(format!(
                    "AES key of {} bytes does not match declared size {}",
                    plain.len(),
                    list.key_size_bits
                )));
            }
            Ok((KeyKind::Aes256, KeyMaterial::Aes(Zeroizing::new(plain.to_vec()))))
        }
        (KeyFormat::Pkcs8, Algorithm::Ec) => {
            if list.key_size_bits != 256 {
                return Err(rejected(format!("unsupported EC size {}", list.key_size_bits)));
            }
            let key = SigningKey::from_pkcs8_der(plain)
                .map_err(|e| rejected(format!("EC PKCS#8: {e}")))?;
            Ok((KeyKind::EcP256, KeyMaterial::Ec(key)))
        }
        (KeyFormat::Pkcs8, Algorithm::Rsa) => {
            let key = RsaPrivateKey::from_pkcs8_der(plain)
                .map_err(|e| rejected(format!("RSA PKCS#8: {e}")))?;
            let bits = (key.size() * 8) as u32;
            if bits != list.key_size_bits {
                return Err(rejected(format!(
                    "RSA key of {bits} bits does not match declared size {}",
                    list.key_size_bits
                )));
            }
            Ok((KeyKind::Rsa { bits }, KeyMaterial::Rsa(Box::new(key))))
        }
        (format, algorithm) => Err(rejected(format!(
            "{format:?} material cannot be installed as {algorithm:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// SecureKeyBackend
// ---------------------------------------------------------------------------

/// Raw ECDSA input as a P-256 field-sized value. Shorter inputs are
/// left-padded so they keep their integer value; longer ones are truncated to
/// the leftmost bits by the signer.
fn field_aligned(digest: &[u8]) -> Vec<u8> {
    const FIELD_LEN: usize = 32;
    if digest.len() >= FIELD_LEN {
        return digest.to_vec();
    }
    let mut aligned = vec![0u8; FIELD_LEN - digest.len()];
    aligned.extend_from_slice(digest);
    aligned
}

impl SecureKeyBackend for SoftwareBackend {
    fn platform_name(&self) -> &str {
        &self.profile.platform_name
    }

    fn platform_version(&self) -> u32 {
        self.profile.platform_version
    }

    fn entry(&self, alias: &str) -> Result<Option<KeyHandle>> {
        Ok(self.lock().keys.get(alias).map(|stored| stored.handle.clone()))
    }

    #[instrument(skip_all, fields(alias = %spec.alias, kind = %spec.kind, tier = %spec.tier))]
    fn generate(&self, spec: &KeyGenSpec) -> Result<KeyHandle> {
        if spec.authorizations.algorithm != spec.kind.algorithm()
            || spec.authorizations.key_size_bits != spec.kind.key_size_bits()
        {
            return Err(KeywardError::InvalidArgument(format!(
                "authorizations do not describe a {} key",
                spec.kind
            )));
        }
        if self.lock().keys.contains_key(&spec.alias) {
            return Err(KeywardError::KeyAlreadyExists(spec.alias.clone()));
        }
        self.check_tier(spec)?;

        let material = new_material(spec.kind)?;
        let handle = KeyHandle {
            alias: spec.alias.clone(),
            kind: spec.kind,
            tier: spec.tier,
            auth_policy: spec.auth_policy,
            purposes: spec.authorizations.purposes.clone(),
            created_at: Utc::now(),
        };

        let mut state = self.lock();
        if state.keys.contains_key(&spec.alias) {
            return Err(KeywardError::KeyAlreadyExists(spec.alias.clone()));
        }
        state.keys.insert(
            spec.alias.clone(),
            StoredKey {
                handle: handle.clone(),
                authorizations: spec.authorizations.clone(),
                material,
            },
        );
        if state
            .failing_generate_prefixes
            .iter()
            .any(|prefix| spec.alias.starts_with(prefix.as_str()))
        {
            return Err(KeywardError::Bridge(format!(
                "injected failure after creating {}",
                spec.alias
            )));
        }

        info!("key generated");
        Ok(handle)
    }

    #[instrument(skip(self))]
    fn delete(&self, alias: &str) -> Result<()> {
        let mut state = self.lock();
        if state
            .failing_delete_prefixes
            .iter()
            .any(|prefix| alias.starts_with(prefix.as_str()))
        {
            return Err(KeywardError::KeyDeletionFailed {
                alias: alias.to_owned(),
                reason: "injected failure".into(),
            });
        }
        if state.keys.remove(alias).is_some() {
            info!("key deleted");
        }
        Ok(())
    }

    fn public_key_der(&self, alias: &str) -> Result<Vec<u8>> {
        let material = self
            .lock()
            .keys
            .get(alias)
            .map(|stored| stored.material.clone())
            .ok_or_else(|| KeywardError::KeyNotFound(alias.to_owned()))?;

        match material {
            KeyMaterial::Ec(key) => key
                .verifying_key()
                .to_public_key_der()
                .map(|doc| doc.as_bytes().to_vec())
                .map_err(|e| KeywardError::Bridge(format!("EC public key encoding: {e}"))),
            KeyMaterial::Rsa(key) => oaep::public_key_to_der(&key.to_public_key()),
            KeyMaterial::Aes(_) => Err(KeywardError::OperationUnsupported(format!(
                "{alias} is a symmetric key and has no public key"
            ))),
        }
    }

    fn aead_seal(&self, alias: &str, iv: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let (list, material) = self.usable(alias, KeyPurpose::Encrypt)?;
        let key = Self::aes_key(alias, &list, material)?;
        aead::seal(&key, iv, aad, plaintext)
    }

    fn aead_open(
        &self,
        alias: &str,
        iv: &[u8],
        aad: &[u8],
        ciphertext_and_tag: &[u8],
    ) -> Result<Vec<u8>> {
        let (list, material) = self.usable(alias, KeyPurpose::Decrypt)?;
        let key = Self::aes_key(alias, &list, material)?;
        aead::open(&key, iv, aad, ciphertext_and_tag)
    }

    fn rsa_decrypt(&self, alias: &str, ciphertext: &[u8], label: Option<&[u8]>) -> Result<Vec<u8>> {
        let (list, material) = self.usable(alias, KeyPurpose::Decrypt)?;
        if !list.paddings.contains(&Padding::RsaOaep) {
            return Err(KeywardError::AuthorizationFailed(format!(
                "{alias} is not authorized for OAEP"
            )));
        }
        let KeyMaterial::Rsa(key) = material else {
            return Err(KeywardError::InvalidArgument(format!("{alias} is not an RSA key")));
        };
        oaep::decrypt(&key, ciphertext, label).map(|plain| plain.to_vec())
    }

    fn sign(&self, alias: &str, scheme: SignatureScheme, data: &[u8]) -> Result<Vec<u8>> {
        let (list, material) = self.usable(alias, KeyPurpose::Sign)?;

        match (scheme, material) {
            (SignatureScheme::EcdsaSha512, KeyMaterial::Ec(key)) => {
                let signature: Signature = key
                    .sign_prehash(&Sha512::digest(data))
                    .map_err(|e| KeywardError::SigningFailed(e.to_string()))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            (SignatureScheme::EcdsaRawDigest, KeyMaterial::Ec(key)) => {
                if !self.profile.raw_digest_signing {
                    return Err(KeywardError::OperationUnsupported(
                        "raw digest signing".into(),
                    ));
                }
                let signature: Signature = key
                    .sign_prehash(&field_aligned(data))
                    .map_err(|e| KeywardError::SigningFailed(e.to_string()))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            (SignatureScheme::RsaPkcs1Sha512, KeyMaterial::Rsa(key)) => {
                if !list.paddings.contains(&Padding::RsaPkcs1Sign) {
                    return Err(KeywardError::AuthorizationFailed(format!(
                        "{alias} is not authorized for PKCS#1 signatures"
                    )));
                }
                key.sign(Pkcs1v15Sign::new::<Sha512>(), &Sha512::digest(data))
                    .map_err(|e| KeywardError::SigningFailed(e.to_string()))
            }
            (scheme, _) => Err(KeywardError::InvalidArgument(format!(
                "{scheme:?} does not match the key type of {alias}"
            ))),
        }
    }

    fn supports_raw_digest_signing(&self) -> bool {
        self.profile.raw_digest_signing
    }

    #[instrument(skip(self, bundle_der), fields(bundle_len = bundle_der.len()))]
    fn import_wrapped(
        &self,
        wrapping_alias: &str,
        imported_alias: &str,
        bundle_der: &[u8],
    ) -> Result<KeyHandle> {
        if !self.profile.secure_import {
            return Err(KeywardError::HardwareUnavailable(
                "secure key import is not supported on this device".into(),
            ));
        }

        let (list, material) = self.usable(wrapping_alias, KeyPurpose::WrapKey)?;
        if !list.paddings.contains(&Padding::RsaOaep) {
            return Err(KeywardError::AuthorizationFailed(format!(
                "{wrapping_alias} is not authorized for OAEP"
            )));
        }
        let KeyMaterial::Rsa(wrapping_key) = material else {
            return Err(KeywardError::AuthorizationFailed(format!(
                "{wrapping_alias} is not an RSA wrapping key"
            )));
        };
        if self.lock().keys.contains_key(imported_alias) {
            return Err(KeywardError::KeyAlreadyExists(imported_alias.to_owned()));
        }

        let bundle = WrappedKeyBundle::from_der(bundle_der)?;
        let plain = bundle.unwrap_with(&wrapping_key)?;
        let description = bundle.description();
        let (kind, material) = imported_material(description, &plain)?;

        let authorizations = description.authorizations.clone();
        let auth_policy = if authorizations.no_auth_required {
            AuthPolicy::None
        } else {
            AuthPolicy::ValidityWindow {
                seconds: self.profile.imported_key_validity_secs,
            }
        };
        let handle = KeyHandle {
            alias: imported_alias.to_owned(),
            kind,
            tier: HardwareTier::Standard,
            auth_policy,
            purposes: authorizations.purposes.clone(),
            created_at: Utc::now(),
        };

        let mut state = self.lock();
        if state.keys.contains_key(imported_alias) {
            return Err(KeywardError::KeyAlreadyExists(imported_alias.to_owned()));
        }
        state.keys.insert(
            imported_alias.to_owned(),
            StoredKey {
                handle: handle.clone(),
                authorizations,
                material,
            },
        );

        info!(imported = %imported_alias, %kind, "wrapped key imported");
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_security::wrap;
    use p256::ecdsa::VerifyingKey;
    use p256::ecdsa::signature::hazmat::PrehashVerifier;
    use p256::pkcs8::DecodePublicKey;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn spec(alias: &str, kind: KeyKind, tier: HardwareTier, auth_policy: AuthPolicy) -> KeyGenSpec {
        KeyGenSpec {
            alias: alias.into(),
            kind,
            tier,
            auth_policy,
            authorizations: AuthorizationList::for_generated(kind, auth_policy.requires_auth()),
        }
    }

    fn aes(alias: &str) -> KeyGenSpec {
        spec(alias, KeyKind::Aes256, HardwareTier::Standard, AuthPolicy::None)
    }

    #[test]
    fn generate_then_seal_and_open() {
        let backend = SoftwareBackend::new(SoftwareProfile::default());
        let handle = backend.generate(&aes("k1")).expect("generate");
        assert_eq!(handle.tier, HardwareTier::Standard);

        let iv = [0u8; 12];
        let sealed = backend.aead_seal("k1", &iv, b"", b"hello").unwrap();
        assert_eq!(backend.aead_open("k1", &iv, b"", &sealed).unwrap(), b"hello");
    }

    #[test]
    fn alias_collision_rejected() {
        let backend = SoftwareBackend::new(SoftwareProfile::default());
        backend.generate(&aes("k1")).unwrap();
        assert!(matches!(
            backend.generate(&aes("k1")),
            Err(KeywardError::KeyAlreadyExists(_))
        ));
    }

    #[test]
    fn unavailable_tiers_leave_nothing_behind() {
        let backend = SoftwareBackend::new(SoftwareProfile::standard_only(34));
        let ha = spec("k1", KeyKind::EcP256, HardwareTier::HighAssurance, AuthPolicy::None);
        assert!(backend.generate(&ha).unwrap_err().is_hardware_unavailable());
        assert!(backend.aliases().is_empty());

        let none = SoftwareBackend::new(SoftwareProfile::software_only(34));
        assert!(none.generate(&aes("k2")).unwrap_err().is_hardware_unavailable());
    }

    #[test]
    fn secure_element_caps_rsa_size() {
        let backend = SoftwareBackend::new(SoftwareProfile::default());
        let big = spec(
            "big",
            KeyKind::Rsa { bits: 3072 },
            HardwareTier::HighAssurance,
            AuthPolicy::None,
        );
        assert!(backend.generate(&big).unwrap_err().is_hardware_unavailable());
    }

    #[test]
    fn auth_window_is_enforced() {
        let backend = SoftwareBackend::new(SoftwareProfile::default());
        let policy = AuthPolicy::ValidityWindow { seconds: 300 };
        backend
            .generate(&spec("k1", KeyKind::Aes256, HardwareTier::Standard, policy))
            .unwrap();
        let iv = [1u8; 12];

        assert!(matches!(
            backend.aead_seal("k1", &iv, b"", b"x"),
            Err(KeywardError::AuthorizationFailed(_))
        ));

        backend.record_user_authentication(AuthMethod::Biometric);
        backend.aead_seal("k1", &iv, b"", b"x").expect("inside the window");

        backend.record_user_authentication_at(
            AuthMethod::DeviceCredential,
            Utc::now() - Duration::seconds(301),
        );
        assert!(matches!(
            backend.aead_seal("k1", &iv, b"", b"x"),
            Err(KeywardError::AuthorizationFailed(_))
        ));
    }

    #[test]
    fn purposes_are_enforced() {
        let backend = SoftwareBackend::new(SoftwareProfile::default());
        backend
            .generate(&spec("ec", KeyKind::EcP256, HardwareTier::Standard, AuthPolicy::None))
            .unwrap();
        assert!(matches!(
            backend.aead_seal("ec", &[0u8; 12], b"", b"x"),
            Err(KeywardError::AuthorizationFailed(_))
        ));
        assert!(matches!(
            backend.rsa_decrypt("ec", &[0u8; 256], None),
            Err(KeywardError::AuthorizationFailed(_))
        ));
    }

    #[test]
    fn ecdsa_signatures_verify() {
        let backend = SoftwareBackend::new(SoftwareProfile::default());
        backend
            .generate(&spec("ec", KeyKind::EcP256, HardwareTier::HighAssurance, AuthPolicy::None))
            .unwrap();
        let public = VerifyingKey::from_public_key_der(&backend.public_key_der("ec").unwrap()).unwrap();

        let signature = backend.sign("ec", SignatureScheme::EcdsaSha512, b"message").unwrap();
        let signature = Signature::from_der(&signature).unwrap();
        public.verify_prehash(&Sha512::digest(b"message"), &signature).unwrap();

        let digest = [0xA5u8; 32];
        let raw = backend.sign("ec", SignatureScheme::EcdsaRawDigest, &digest).unwrap();
        public
            .verify_prehash(&digest, &Signature::from_der(&raw).unwrap())
            .unwrap();

        let short = [0x11u8, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
        let raw = backend.sign("ec", SignatureScheme::EcdsaRawDigest, &short).unwrap();
        let mut widened = [0u8; 32];
        widened[24..].copy_from_slice(&short);
        public
            .verify_prehash(&widened, &Signature::from_der(&raw).unwrap())
            .expect("short digest signed as the same integer");
        assert!(matches!(
            backend.sign("ec", SignatureScheme::RsaPkcs1Sha512, b"m"),
            Err(KeywardError::InvalidArgument(_))
        ));
    }

    #[test]
    fn delete_is_idempotent_and_faults_are_injectable() {
        let backend = SoftwareBackend::new(SoftwareProfile::default());
        backend.delete("missing").expect("absent alias is fine");

        backend.generate(&aes("locked-1")).unwrap();
        backend.inject_delete_failure("locked-");
        assert!(matches!(
            backend.delete("locked-1"),
            Err(KeywardError::KeyDeletionFailed { .. })
        ));
        backend.clear_faults();
        backend.delete("locked-1").unwrap();
        assert!(!backend.contains("locked-1").unwrap());
    }

    #[test]
    fn injected_generate_failure_leaves_entry() {
        let backend = SoftwareBackend::new(SoftwareProfile::default());
        backend.inject_generate_failure("probe-");
        assert!(matches!(
            backend.generate(&aes("probe-1")),
            Err(KeywardError::Bridge(_))
        ));
        assert_eq!(backend.aliases(), vec!["probe-1".to_string()]);
    }

    #[test]
    fn secure_import_installs_usable_key() {
        let backend = SoftwareBackend::new(SoftwareProfile::default());
        let wrapping = spec(
            "wrap",
            KeyKind::Rsa { bits: 2048 },
            HardwareTier::Standard,
            AuthPolicy::None,
        );
        backend.generate(&wrapping).unwrap();
        let recipient = oaep::public_key_from_der(&backend.public_key_der("wrap").unwrap()).unwrap();

        let material = [0x42u8; 32];
        let bundle = wrap(
            &recipient,
            &material,
            KeyDescription::new(KeyFormat::Raw, AuthorizationList::aes_gcm_import(256, true)),
            &mut StdRng::seed_from_u64(7),
        )
        .unwrap();

        let handle = backend.import_wrapped("wrap", "imported", &bundle.to_der()).unwrap();
        assert_eq!(handle.kind, KeyKind::Aes256);
        assert_eq!(handle.auth_policy, AuthPolicy::None);

        let iv = [3u8; 12];
        let sealed = backend.aead_seal("imported", &iv, b"aad", b"payload").unwrap();
        assert_eq!(sealed, aead::seal(&material, &iv, b"aad", b"payload").unwrap());
    }

    #[test]
    fn import_requires_wrap_purpose() {
        let backend = SoftwareBackend::new(SoftwareProfile::default());
        backend.generate(&aes("not-a-wrapper")).unwrap();
        assert!(matches!(
            backend.import_wrapped("not-a-wrapper", "x", &[0x30, 0x00]),
            Err(KeywardError::AuthorizationFailed(_))
        ));
        assert!(matches!(
            backend.import_wrapped("absent", "x", &[0x30, 0x00]),
            Err(KeywardError::KeyNotFound(_))
        ));
    }

    #[test]
    fn symmetric_key_has_no_public_half() {
        let backend = SoftwareBackend::new(SoftwareProfile::default());
        backend.generate(&aes("k1")).unwrap();
        assert!(matches!(
            backend.public_key_der("k1"),
            Err(KeywardError::OperationUnsupported(_))
        ));
    }
}
