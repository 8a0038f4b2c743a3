// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic contract for a secure key store.
//
// The store layer is written once against `SecureKeyBackend`; each platform
// supplies an implementation. A backend never hands out secret or private key
// bytes: operations name a key by alias and run inside the backend.

use keyward_core::error::Result;
use keyward_core::types::{KeyGenSpec, KeyHandle, SignatureScheme};

/// A platform secure key store.
///
/// Tier contract: `generate` with a tier the device cannot provide fails with
/// `KeywardError::HardwareUnavailable` and leaves no entry behind. That error
/// is the only signal the capability probe and the tier ladder interpret; any
/// other error is passed to the caller unchanged.
///
/// Implementations must be safe to share across threads. Operations on
/// distinct aliases may run concurrently; callers serialise lifecycle calls
/// on the same alias themselves.
pub trait SecureKeyBackend: Send + Sync {
    /// Human-readable platform name (e.g. "Android 14").
    fn platform_name(&self) -> &str;

    /// Platform version used for tier selection (the API level on Android).
    fn platform_version(&self) -> u32;

    /// Handle for `alias`, or `None` if no key is stored under it.
    fn entry(&self, alias: &str) -> Result<Option<KeyHandle>>;

    fn contains(&self, alias: &str) -> Result<bool> {
        Ok(self.entry(alias)?.is_some())
    }

    /// Create a key exactly as described by `spec`.
    ///
    /// Fails with `KeyAlreadyExists` if the alias is taken.
    fn generate(&self, spec: &KeyGenSpec) -> Result<KeyHandle>;

    /// Remove `alias`. Removing an absent alias succeeds.
    fn delete(&self, alias: &str) -> Result<()>;

    /// DER SubjectPublicKeyInfo of an asymmetric key.
    fn public_key_der(&self, alias: &str) -> Result<Vec<u8>>;

    /// AES-GCM encrypt with a caller-supplied IV; returns `ciphertext || tag`.
    fn aead_seal(&self, alias: &str, iv: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;

    /// AES-GCM decrypt of `ciphertext || tag`.
    fn aead_open(
        &self,
        alias: &str,
        iv: &[u8],
        aad: &[u8],
        ciphertext_and_tag: &[u8],
    ) -> Result<Vec<u8>>;

    /// RSA-OAEP (SHA-256, MGF1-SHA-1) decryption.
    fn rsa_decrypt(&self, alias: &str, ciphertext: &[u8], label: Option<&[u8]>) -> Result<Vec<u8>>;

    /// Sign `data` with the scheme chosen by the caller.
    fn sign(&self, alias: &str, scheme: SignatureScheme, data: &[u8]) -> Result<Vec<u8>>;

    /// Whether `SignatureScheme::EcdsaRawDigest` is available.
    fn supports_raw_digest_signing(&self) -> bool;

    /// Install the key inside a DER wrapped key bundle under
    /// `imported_alias`, unwrapping it with the private key at
    /// `wrapping_alias` without exposing either key.
    fn import_wrapped(
        &self,
        wrapping_alias: &str,
        imported_alias: &str,
        bundle_der: &[u8],
    ) -> Result<KeyHandle>;
}
