// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// AES-256-GCM with caller-supplied 96-bit nonces and 128-bit tags.
//
// The combined form is `ciphertext || tag`; the detached form keeps the tag
// separate, as required by the wrapped key bundle.

use keyward_core::error::{KeywardError, Result};
use keyward_core::types::{AES_256_KEY_LEN, GCM_IV_LEN, GCM_TAG_LEN};
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use tracing::{debug, instrument};
use zeroize::Zeroize;

fn key(bytes: &[u8], fail: fn(String) -> KeywardError) -> Result<LessSafeKey> {
    if bytes.len() != AES_256_KEY_LEN {
        return Err(fail(format!(
            "AES-256 key must be {AES_256_KEY_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    let unbound =
        UnboundKey::new(&AES_256_GCM, bytes).map_err(|_| fail("invalid AES-256 key".into()))?;
    Ok(LessSafeKey::new(unbound))
}

fn nonce(iv: &[u8], fail: fn(String) -> KeywardError) -> Result<Nonce> {
    Nonce::try_assume_unique_for_key(iv)
        .map_err(|_| fail(format!("IV must be {GCM_IV_LEN} bytes, got {}", iv.len())))
}

/// Encrypt and return `(ciphertext, tag)`.
#[instrument(skip_all, fields(plaintext_len = plaintext.len(), aad_len = aad.len()))]
pub fn seal_detached(
    key_bytes: &[u8],
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; GCM_TAG_LEN])> {
    let key = key(key_bytes, KeywardError::EncryptionFailed)?;
    let nonce = nonce(iv, KeywardError::EncryptionFailed)?;

    let mut in_out = plaintext.to_vec();
    let tag = key
        .seal_in_place_separate_tag(nonce, Aad::from(aad), &mut in_out)
        .map_err(|_| KeywardError::EncryptionFailed("AES-GCM seal failed".into()))?;

    let mut tag_bytes = [0u8; GCM_TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_ref());

    debug!(ciphertext_len = in_out.len(), "AES-GCM seal complete");
    Ok((in_out, tag_bytes))
}

/// Encrypt and return `ciphertext || tag`.
pub fn seal(key_bytes: &[u8], iv: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let (mut out, tag) = seal_detached(key_bytes, iv, aad, plaintext)?;
    out.extend_from_slice(&tag);
    Ok(out)
}

/// Decrypt `ciphertext || tag`. Any tag, AAD, IV or key mismatch is a
/// `DecryptionFailed` error and no plaintext is released.
#[instrument(skip_all, fields(input_len = ciphertext_and_tag.len(), aad_len = aad.len()))]
pub fn open(key_bytes: &[u8], iv: &[u8], aad: &[u8], ciphertext_and_tag: &[u8]) -> Result<Vec<u8>> {
    if ciphertext_and_tag.len() < GCM_TAG_LEN {
        return Err(KeywardError::DecryptionFailed(format!(
            "input shorter than the {GCM_TAG_LEN}-byte tag"
        )));
    }
    let key = key(key_bytes, KeywardError::DecryptionFailed)?;
    let nonce = nonce(iv, KeywardError::DecryptionFailed)?;

    let mut buf = ciphertext_and_tag.to_vec();
    let opened = key
        .open_in_place(nonce, Aad::from(aad), &mut buf)
        .map(|plaintext| plaintext.len());

    match opened {
        Ok(len) => {
            buf.truncate(len);
            debug!(plaintext_len = len, "AES-GCM open complete");
            Ok(buf)
        }
        Err(_) => {
            buf.zeroize();
            Err(KeywardError::DecryptionFailed(
                "authentication tag mismatch".into(),
            ))
        }
    }
}

/// Decrypt with a detached tag.
pub fn open_detached(
    key_bytes: &[u8],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>> {
    if tag.len() != GCM_TAG_LEN {
        return Err(KeywardError::DecryptionFailed(format!(
            "tag must be {GCM_TAG_LEN} bytes, got {}",
            tag.len()
        )));
    }
    let mut combined = Vec::with_capacity(ciphertext.len() + GCM_TAG_LEN);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);
    open(key_bytes, iv, aad, &combined)
}

/// Split `ciphertext || tag` into its two parts.
pub fn split_tag(ciphertext_and_tag: &[u8]) -> Result<(&[u8], &[u8])> {
    let split = ciphertext_and_tag
        .len()
        .checked_sub(GCM_TAG_LEN)
        .ok_or_else(|| KeywardError::InvalidArgument("input shorter than a GCM tag".into()))?;
    Ok(ciphertext_and_tag.split_at(split))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [7u8; 32];
    const IV: [u8; 12] = [0u8; 12];

    #[test]
    fn combined_output_is_ciphertext_then_tag() {
        let sealed = seal(&KEY, &IV, b"", b"hello").unwrap();
        assert_eq!(sealed.len(), 5 + GCM_TAG_LEN);
        assert_eq!(open(&KEY, &IV, b"", &sealed).unwrap(), b"hello");
    }

    #[test]
    fn detached_matches_combined() {
        let (ct, tag) = seal_detached(&KEY, &IV, b"aad", b"payload").unwrap();
        let combined = seal(&KEY, &IV, b"aad", b"payload").unwrap();
        let (split_ct, split_tag_bytes) = split_tag(&combined).unwrap();
        assert_eq!(ct, split_ct);
        assert_eq!(tag.as_slice(), split_tag_bytes);
        assert_eq!(open_detached(&KEY, &IV, b"aad", &ct, &tag).unwrap(), b"payload");
    }

    #[test]
    fn tampered_tag_fails() {
        let mut sealed = seal(&KEY, &IV, b"", b"hello").unwrap();
        sealed[5] = sealed[5].wrapping_add(1);
        assert!(matches!(
            open(&KEY, &IV, b"", &sealed),
            Err(KeywardError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn wrong_aad_fails() {
        let sealed = seal(&KEY, &IV, b"one", b"hello").unwrap();
        assert!(open(&KEY, &IV, b"two", &sealed).is_err());
    }

    #[test]
    fn bad_lengths_rejected() {
        assert!(matches!(
            seal(&KEY, &[0u8; 16], b"", b"x"),
            Err(KeywardError::EncryptionFailed(_))
        ));
        assert!(matches!(
            seal(&[0u8; 16], &IV, b"", b"x"),
            Err(KeywardError::EncryptionFailed(_))
        ));
        assert!(matches!(
            open(&KEY, &IV, b"", &[0u8; 15]),
            Err(KeywardError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn empty_plaintext_has_tag_only() {
        let sealed = seal(&KEY, &IV, b"", b"").unwrap();
        assert_eq!(sealed.len(), GCM_TAG_LEN);
        assert!(open(&KEY, &IV, b"", &sealed).unwrap().is_empty());
    }
}
