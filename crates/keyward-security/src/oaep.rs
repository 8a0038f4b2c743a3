// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// RSA-OAEP with SHA-256 as the label hash and MGF1-SHA-1 as the mask.
//
// This is the parameter set device key stores use for OAEP keys and for the
// transport key of a wrapped key bundle. Labels are arbitrary bytes, so the
// EME-OAEP encoding (RFC 8017 7.1) is done here over the raw RSA primitive.

use keyward_core::error::{KeywardError, Result};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use rsa::hazmat::{rsa_decrypt_and_check, rsa_encrypt};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// SHA-256 output length.
const HASH_LEN: usize = 32;

fn mgf1_sha1(seed: &[u8], len: usize) -> Zeroizing<Vec<u8>> {
    let mut mask = Zeroizing::new(Vec::with_capacity(len + 20));
    let mut counter = 0u32;
    while mask.len() < len {
        mask.extend_from_slice(
            &Sha1::new()
                .chain_update(seed)
                .chain_update(counter.to_be_bytes())
                .finalize(),
        );
        counter += 1;
    }
    mask.truncate(len);
    mask
}

fn xor_in_place(target: &mut [u8], mask: &[u8]) {
    for (byte, m) in target.iter_mut().zip(mask) {
        *byte ^= m;
    }
}

/// Big-endian `value` widened to exactly `len` bytes.
fn widen(value: &BigUint, len: usize) -> Option<Zeroizing<Vec<u8>>> {
    let bytes = Zeroizing::new(value.to_bytes_be());
    let pad = len.checked_sub(bytes.len())?;
    let mut out = Zeroizing::new(vec![0u8; len]);
    out[pad..].copy_from_slice(&bytes);
    Some(out)
}

/// Encrypt `message` to `public` with OAEP(SHA-256, MGF1-SHA-1). An absent
/// label and an empty label are the same label.
pub fn encrypt<R>(
    public: &RsaPublicKey,
    message: &[u8],
    label: Option<&[u8]>,
    rng: &mut R,
) -> Result<Vec<u8>>
where
    R: RngCore + CryptoRng,
{
    let k = public.size();
    if k < 2 * HASH_LEN + 2 || message.len() > k - 2 * HASH_LEN - 2 {
        return Err(KeywardError::EncryptionFailed(format!(
            "RSA-OAEP: {} bytes do not fit a {}-bit key",
            message.len(),
            k * 8
        )));
    }

    let db_len = k - HASH_LEN - 1;
    let mut em = Zeroizing::new(vec![0u8; k]);
    let (seed, db) = em[1..].split_at_mut(HASH_LEN);
    rng.fill_bytes(seed);
    db[..HASH_LEN].copy_from_slice(&Sha256::digest(label.unwrap_or_default()));
    db[db_len - message.len() - 1] = 0x01;
    db[db_len - message.len()..].copy_from_slice(message);
    xor_in_place(db, &mgf1_sha1(seed, db_len));
    xor_in_place(seed, &mgf1_sha1(db, HASH_LEN));

    let c = rsa_encrypt(public, &BigUint::from_bytes_be(&em))
        .map_err(|e| KeywardError::EncryptionFailed(format!("RSA-OAEP: {e}")))?;
    widen(&c, k)
        .map(|c| c.to_vec())
        .ok_or_else(|| KeywardError::EncryptionFailed("RSA-OAEP: ciphertext exceeds modulus".into()))
}

/// Decrypt an OAEP(SHA-256, MGF1-SHA-1) ciphertext. Every padding failure
/// yields the same error.
pub fn decrypt(
    private: &RsaPrivateKey,
    ciphertext: &[u8],
    label: Option<&[u8]>,
) -> Result<Zeroizing<Vec<u8>>> {
    let fail = || KeywardError::DecryptionFailed("RSA-OAEP decryption error".into());
    let k = private.size();
    if ciphertext.len() != k || k < 2 * HASH_LEN + 2 {
        return Err(fail());
    }

    let m = rsa_decrypt_and_check(private, Some(&mut OsRng), &BigUint::from_bytes_be(ciphertext))
        .map_err(|_| fail())?;
    let em = widen(&m, k).ok_or_else(fail)?;

    let mut seed = Zeroizing::new(em[1..1 + HASH_LEN].to_vec());
    let mut db = Zeroizing::new(em[1 + HASH_LEN..].to_vec());
    let db_len = db.len();
    xor_in_place(&mut seed, &mgf1_sha1(&db, HASH_LEN));
    xor_in_place(&mut db, &mgf1_sha1(&seed, db_len));

    // No early exit: the whole block is checked before deciding.
    let label_hash = Sha256::digest(label.unwrap_or_default());
    let mut bad = em[0]
        | label_hash
            .iter()
            .zip(&db[..HASH_LEN])
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    let mut looking = 1u8;
    let mut start = 0usize;
    for (i, &byte) in db[HASH_LEN..].iter().enumerate() {
        let is_one = u8::from(byte == 0x01);
        let is_zero = u8::from(byte == 0x00);
        let hit = looking & is_one;
        start |= (i + 1) * usize::from(hit);
        bad |= looking & !is_one & !is_zero & 1;
        looking &= !hit & 1;
    }
    bad |= looking;
    if bad != 0 {
        return Err(fail());
    }
    Ok(Zeroizing::new(db[HASH_LEN + start..].to_vec()))
}

/// Parse a DER SubjectPublicKeyInfo holding an RSA key.
pub fn public_key_from_der(spki_der: &[u8]) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_der(spki_der)
        .map_err(|e| KeywardError::InvalidArgument(format!("not an RSA public key: {e}")))
}

/// Parse a PEM `PUBLIC KEY` block holding an RSA key.
pub fn public_key_from_pem(pem: &str) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem.trim())
        .map_err(|e| KeywardError::InvalidArgument(format!("not an RSA public key: {e}")))
}

/// DER SubjectPublicKeyInfo of an RSA key.
pub fn public_key_to_der(public: &RsaPublicKey) -> Result<Vec<u8>> {
    public
        .to_public_key_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|e| KeywardError::InvalidArgument(format!("RSA public key encoding: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rsa::Oaep;

    fn keypair() -> RsaPrivateKey {
        let mut rng = StdRng::seed_from_u64(0x6b65_7977);
        RsaPrivateKey::new(&mut rng, 2048).expect("RSA key generation")
    }

    #[test]
    fn encrypt_then_decrypt() {
        let private = keypair();
        let public = private.to_public_key();
        let mut rng = StdRng::seed_from_u64(1);
        let ct = encrypt(&public, b"transport key", None, &mut rng).unwrap();
        assert_eq!(ct.len(), 256);
        assert_eq!(decrypt(&private, &ct, None).unwrap().as_slice(), b"transport key");
    }

    #[test]
    fn label_must_match() {
        let private = keypair();
        let public = private.to_public_key();
        let mut rng = StdRng::seed_from_u64(2);
        let ct = encrypt(&public, b"secret", Some(b"label-a"), &mut rng).unwrap();
        assert_eq!(
            decrypt(&private, &ct, Some(b"label-a")).unwrap().as_slice(),
            b"secret"
        );
        assert!(matches!(
            decrypt(&private, &ct, Some(b"label-b")),
            Err(KeywardError::DecryptionFailed(_))
        ));
        assert!(decrypt(&private, &ct, None).is_err());
    }

    #[test]
    fn empty_label_equals_no_label() {
        let private = keypair();
        let public = private.to_public_key();
        let mut rng = StdRng::seed_from_u64(3);
        let ct = encrypt(&public, b"x", Some(b""), &mut rng).unwrap();
        assert_eq!(decrypt(&private, &ct, None).unwrap().as_slice(), b"x");
    }

    #[test]
    fn binary_label_round_trip() {
        let private = keypair();
        let public = private.to_public_key();
        let label = [0x00u8, 0xFF, 0x10];
        let mut rng = StdRng::seed_from_u64(4);
        let ct = encrypt(&public, b"secret", Some(&label), &mut rng).unwrap();
        assert_eq!(decrypt(&private, &ct, Some(&label)).unwrap().as_slice(), b"secret");
        assert!(decrypt(&private, &ct, Some(&[0x00, 0xFF])).is_err());
    }

    #[test]
    fn interoperates_with_rsa_crate_oaep() {
        let private = keypair();
        let public = private.to_public_key();
        let mut rng = StdRng::seed_from_u64(5);

        let theirs = public
            .encrypt(&mut rng, Oaep::new_with_mgf_hash_and_label::<Sha256, Sha1, _>("ctx"), b"abc")
            .unwrap();
        assert_eq!(decrypt(&private, &theirs, Some(b"ctx")).unwrap().as_slice(), b"abc");

        let ours = encrypt(&public, b"xyz", None, &mut rng).unwrap();
        let plain = private
            .decrypt(Oaep::new_with_mgf_hash::<Sha256, Sha1>(), &ours)
            .unwrap();
        assert_eq!(plain, b"xyz");
    }

    #[test]
    fn message_size_limit() {
        let public = keypair().to_public_key();
        let mut rng = StdRng::seed_from_u64(6);
        // 256 - 2 * 32 - 2
        assert!(encrypt(&public, &[7u8; 190], None, &mut rng).is_ok());
        assert!(matches!(
            encrypt(&public, &[7u8; 191], None, &mut rng),
            Err(KeywardError::EncryptionFailed(_))
        ));
        assert!(encrypt(&public, b"", None, &mut rng).is_ok());
    }

    #[test]
    fn malformed_ciphertext_rejected() {
        let private = keypair();
        for ct in [vec![0u8; 255], vec![0u8; 256], vec![0xFFu8; 256]] {
            assert!(matches!(
                decrypt(&private, &ct, None),
                Err(KeywardError::DecryptionFailed(_))
            ));
        }
    }

    #[test]
    fn public_key_der_round_trip() {
        let public = keypair().to_public_key();
        let der = public_key_to_der(&public).unwrap();
        assert_eq!(public_key_from_der(&der).unwrap(), public);
        assert!(public_key_from_der(b"junk").is_err());
    }
}
