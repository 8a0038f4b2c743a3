// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// AES-256-GCM with stored keys and caller-supplied IVs.

use tracing::{debug, instrument};

use keyward_core::error::{KeywardError, Result};
use keyward_core::types::{GCM_IV_LEN, GCM_TAG_LEN, KeyKind};

use crate::keystore::KeyStore;

/// Authenticated encryption with a symmetric key held in the store.
///
/// Absent AAD is the same as zero-length AAD: GCM authenticates nothing
/// extra in both cases and produces the same tag.
pub struct SymmetricCipher<'a> {
    store: &'a KeyStore,
}

impl<'a> SymmetricCipher<'a> {
    pub fn new(store: &'a KeyStore) -> Self {
        Self { store }
    }

    fn check(&self, alias: &str, iv: &[u8]) -> Result<()> {
        if iv.len() != GCM_IV_LEN {
            return Err(KeywardError::InvalidArgument(format!(
                "IV must be {GCM_IV_LEN} bytes, got {}",
                iv.len()
            )));
        }
        let handle = self.store.get(alias)?;
        if handle.kind != KeyKind::Aes256 {
            return Err(KeywardError::InvalidArgument(format!(
                "{alias} is a {} key, not AES-256",
                handle.kind
            )));
        }
        Ok(())
    }

    /// Encrypt `plaintext`; returns `ciphertext || tag` (16-byte tag).
    #[instrument(skip_all, fields(alias = %alias, plaintext_len = plaintext.len()))]
    pub fn encrypt(
        &self,
        alias: &str,
        plaintext: &[u8],
        iv: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        self.check(alias, iv)?;
        let sealed = self
            .store
            .backend()
            .aead_seal(alias, iv, aad.unwrap_or_default(), plaintext)?;
        if sealed.len() != plaintext.len() + GCM_TAG_LEN {
            return Err(KeywardError::EncryptionFailed(format!(
                "backend returned {} bytes for a {}-byte plaintext",
                sealed.len(),
                plaintext.len()
            )));
        }
        debug!(sealed_len = sealed.len(), "encrypted");
        Ok(sealed)
    }

    /// Decrypt `ciphertext` authenticated by the detached `tag`.
    ///
    /// A tag mismatch fails with `DecryptionFailed` and returns nothing.
    #[instrument(skip_all, fields(alias = %alias, ciphertext_len = ciphertext.len()))]
    pub fn decrypt(
        &self,
        alias: &str,
        ciphertext: &[u8],
        tag: &[u8],
        iv: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        if tag.len() != GCM_TAG_LEN {
            return Err(KeywardError::InvalidArgument(format!(
                "tag must be {GCM_TAG_LEN} bytes, got {}",
                tag.len()
            )));
        }
        self.check(alias, iv)?;

        let mut combined = Vec::with_capacity(ciphertext.len() + GCM_TAG_LEN);
        combined.extend_from_slice(ciphertext);
        combined.extend_from_slice(tag);

        let plaintext = self
            .store
            .backend()
            .aead_open(alias, iv, aad.unwrap_or_default(), &combined)?;
        debug!(plaintext_len = plaintext.len(), "decrypted");
        Ok(plaintext)
    }
}
