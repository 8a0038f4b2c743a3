// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// RSA decryption, signing and certificate requests with stored key pairs.
//
// `sign_data` hashes the message (SHA-512) before signing. `sign_digest`
// signs the caller's bytes as they are and is only offered where the backend
// advertises raw digest signing. The two are never chosen by input shape.

use tracing::{debug, instrument};

use keyward_core::error::{KeywardError, Result};
use keyward_core::types::{CsrSubject, KeyKind, SignatureScheme};

use crate::keystore::KeyStore;

pub struct AsymmetricOps<'a> {
    store: &'a KeyStore,
}

impl<'a> AsymmetricOps<'a> {
    pub fn new(store: &'a KeyStore) -> Self {
        Self { store }
    }

    /// RSA-OAEP (SHA-256, MGF1-SHA-1) decryption. An absent label is the
    /// empty label.
    #[instrument(skip_all, fields(alias = %alias, ciphertext_len = ciphertext.len()))]
    pub fn decrypt_rsa(&self, alias: &str, ciphertext: &[u8], label: Option<&[u8]>) -> Result<Vec<u8>> {
        let handle = self.store.get(alias)?;
        if !matches!(handle.kind, KeyKind::Rsa { .. }) {
            return Err(KeywardError::InvalidArgument(format!(
                "{alias} is a {} key, not RSA",
                handle.kind
            )));
        }
        let label = label.filter(|l| !l.is_empty());
        let plaintext = self.store.backend().rsa_decrypt(alias, ciphertext, label)?;
        debug!(plaintext_len = plaintext.len(), "RSA decrypted");
        Ok(plaintext)
    }

    /// Sign a message: ECDSA/SHA-512 for EC keys, PKCS#1 v1.5/SHA-512 for RSA.
    #[instrument(skip_all, fields(alias = %alias, message_len = message.len()))]
    pub fn sign_data(&self, alias: &str, message: &[u8]) -> Result<Vec<u8>> {
        let handle = self.store.get(alias)?;
        let scheme = match handle.kind {
            KeyKind::EcP256 => SignatureScheme::EcdsaSha512,
            KeyKind::Rsa { .. } => SignatureScheme::RsaPkcs1Sha512,
            KeyKind::Aes256 => {
                return Err(KeywardError::InvalidArgument(format!(
                    "{alias} is a symmetric key and cannot sign"
                )));
            }
        };
        self.store.backend().sign(alias, scheme, message)
    }

    /// ECDSA over an already-hashed digest; no hashing happens here.
    #[instrument(skip_all, fields(alias = %alias, digest_len = digest.len()))]
    pub fn sign_digest(&self, alias: &str, digest: &[u8]) -> Result<Vec<u8>> {
        let backend = self.store.backend();
        if !backend.supports_raw_digest_signing() {
            return Err(KeywardError::OperationUnsupported(format!(
                "{} cannot sign raw digests",
                backend.platform_name()
            )));
        }
        let handle = self.store.get(alias)?;
        if handle.kind != KeyKind::EcP256 {
            return Err(KeywardError::InvalidArgument(format!(
                "raw digest signing needs an EC key, {alias} is {}",
                handle.kind
            )));
        }
        backend.sign(alias, SignatureScheme::EcdsaRawDigest, digest)
    }

    /// PEM PKCS#10 request for the EC key at `alias`, signed with
    /// ECDSA/SHA-512 by the key itself.
    #[instrument(skip_all, fields(alias = %alias))]
    pub fn generate_csr(&self, alias: &str, subject: &CsrSubject) -> Result<String> {
        let handle = self.store.get(alias)?;
        if handle.kind != KeyKind::EcP256 {
            return Err(KeywardError::CsrGenerationFailed(format!(
                "{alias} is a {} key; requests are signed with EC keys",
                handle.kind
            )));
        }
        let spki = self.store.backend().public_key_der(alias)?;
        keyward_security::build_csr(&spki, subject, |info| {
            self.store
                .backend()
                .sign(alias, SignatureScheme::EcdsaSha512, info)
                .map_err(|e| match e {
                    KeywardError::SigningFailed(reason) => KeywardError::CsrGenerationFailed(reason),
                    other => other,
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use der::{DecodePem, Encode};
    use keyward_bridge::{SoftwareBackend, SoftwareProfile};
    use keyward_core::config::StoreConfig;
    use keyward_security::csr::subject_name;
    use keyward_security::oaep;
    use p256::ecdsa::signature::hazmat::PrehashVerifier;
    use p256::ecdsa::{Signature, VerifyingKey};
    use p256::pkcs8::DecodePublicKey;
    use rand::rngs::OsRng;
    use rsa::traits::PublicKeyParts;
    use rsa::{Pkcs1v15Sign, RsaPublicKey};
    use sha2::{Digest, Sha512};
    use x509_cert::request::CertReq;

    fn open(profile: SoftwareProfile) -> (Arc<SoftwareBackend>, KeyStore) {
        let backend = Arc::new(SoftwareBackend::new(profile));
        let store = KeyStore::open(backend.clone(), StoreConfig::default()).expect("open store");
        (backend, store)
    }

    fn verifying_key(store: &KeyStore, alias: &str) -> VerifyingKey {
        VerifyingKey::from_public_key_der(&store.public_key_der(alias).unwrap()).unwrap()
    }

    fn rsa_public(store: &KeyStore, alias: &str) -> RsaPublicKey {
        oaep::public_key_from_der(&store.public_key_der(alias).unwrap()).unwrap()
    }

    #[test]
    fn rsa_oaep_with_and_without_label() {
        let (_, store) = open(SoftwareProfile::default());
        store.generate("rsa", KeyKind::Rsa { bits: 2048 }, false, false).unwrap();
        let public = rsa_public(&store, "rsa");
        let ops = AsymmetricOps::new(&store);

        let ct = oaep::encrypt(&public, b"secret", None, &mut OsRng).unwrap();
        assert_eq!(ops.decrypt_rsa("rsa", &ct, None).unwrap(), b"secret");
        assert_eq!(
            ops.decrypt_rsa("rsa", &ct, Some(b"")).unwrap(),
            b"secret",
            "empty label is the default label"
        );

        let labelled = oaep::encrypt(&public, b"secret", Some(b"ctx"), &mut OsRng).unwrap();
        assert_eq!(ops.decrypt_rsa("rsa", &labelled, Some(b"ctx")).unwrap(), b"secret");
        assert!(matches!(
            ops.decrypt_rsa("rsa", &labelled, None),
            Err(KeywardError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn rsa_oaep_label_is_opaque_bytes() {
        let (_, store) = open(SoftwareProfile::default());
        store.generate("rsa", KeyKind::Rsa { bits: 2048 }, false, false).unwrap();
        let public = rsa_public(&store, "rsa");
        let label = [0x00u8, 0xFF, 0x10];

        let ct = oaep::encrypt(&public, b"secret", Some(&label), &mut OsRng).unwrap();
        let ops = AsymmetricOps::new(&store);
        assert_eq!(ops.decrypt_rsa("rsa", &ct, Some(&label)).unwrap(), b"secret");
        assert!(matches!(
            ops.decrypt_rsa("rsa", &ct, Some(&[0x00, 0xFE, 0x10])),
            Err(KeywardError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn ec_sign_data_hashes_with_sha512() {
        let (_, store) = open(SoftwareProfile::default());
        store.generate("ec", KeyKind::EcP256, false, false).unwrap();
        let ops = AsymmetricOps::new(&store);

        let signature = ops.sign_data("ec", b"message").unwrap();
        verifying_key(&store, "ec")
            .verify_prehash(&Sha512::digest(b"message"), &Signature::from_der(&signature).unwrap())
            .expect("ECDSA/SHA-512 signature");
    }

    #[test]
    fn rsa_sign_data_is_pkcs1_sha512() {
        let (_, store) = open(SoftwareProfile::default());
        store.generate("rsa", KeyKind::Rsa { bits: 2048 }, false, false).unwrap();
        let signature = AsymmetricOps::new(&store).sign_data("rsa", b"message").unwrap();

        let public = rsa_public(&store, "rsa");
        assert_eq!(signature.len(), public.size());
        public
            .verify(Pkcs1v15Sign::new::<Sha512>(), &Sha512::digest(b"message"), &signature)
            .expect("PKCS#1 v1.5 signature");
    }

    #[test]
    fn sign_digest_does_not_hash() {
        let (_, store) = open(SoftwareProfile::default());
        store.generate("ec", KeyKind::EcP256, false, false).unwrap();
        let ops = AsymmetricOps::new(&store);
        let digest = Sha512::digest(b"already hashed");

        let signature = ops.sign_digest("ec", &digest).unwrap();
        let signature = Signature::from_der(&signature).unwrap();
        let key = verifying_key(&store, "ec");
        key.verify_prehash(&digest, &signature).expect("signed as given");
        assert!(
            key.verify_prehash(&Sha512::digest(digest), &signature).is_err(),
            "digest must not be hashed again"
        );
    }

    #[test]
    fn sign_digest_is_optional_per_backend() {
        let (_, store) = open(SoftwareProfile {
            raw_digest_signing: false,
            ..SoftwareProfile::default()
        });
        store.generate("ec", KeyKind::EcP256, false, false).unwrap();
        assert!(matches!(
            AsymmetricOps::new(&store).sign_digest("ec", &[0u8; 32]),
            Err(KeywardError::OperationUnsupported(_))
        ));
    }

    #[test]
    fn sign_digest_needs_ec_key() {
        let (_, store) = open(SoftwareProfile::default());
        store.generate("aes", KeyKind::Aes256, false, false).unwrap();
        let ops = AsymmetricOps::new(&store);
        assert!(matches!(
            ops.sign_digest("aes", &[0u8; 32]),
            Err(KeywardError::InvalidArgument(_))
        ));
        assert!(matches!(
            ops.sign_data("aes", b"m"),
            Err(KeywardError::InvalidArgument(_))
        ));
    }

    #[test]
    fn csr_is_signed_by_the_stored_key() {
        let (_, store) = open(SoftwareProfile::default());
        store.generate("device", KeyKind::EcP256, false, false).unwrap();
        let subject = CsrSubject {
            common_name: "device-01".into(),
            country: "ID".into(),
            organization: "Example".into(),
            ..CsrSubject::default()
        };

        let pem = AsymmetricOps::new(&store).generate_csr("device", &subject).unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));

        let request = CertReq::from_pem(pem.as_bytes()).unwrap();
        assert_eq!(request.info.subject, subject_name(&subject).unwrap());
        assert_eq!(
            request.info.public_key.to_der().unwrap(),
            store.public_key_der("device").unwrap()
        );

        let tbs = request.info.to_der().unwrap();
        let signature = Signature::from_der(request.signature.raw_bytes()).unwrap();
        verifying_key(&store, "device")
            .verify_prehash(&Sha512::digest(&tbs), &signature)
            .expect("request signature verifies");
    }

    #[test]
    fn csr_failures() {
        let (_, store) = open(SoftwareProfile::default());
        let ops = AsymmetricOps::new(&store);
        let subject = CsrSubject {
            common_name: "x".into(),
            ..CsrSubject::default()
        };
        assert!(matches!(
            ops.generate_csr("missing", &subject),
            Err(KeywardError::KeyNotFound(_))
        ));

        store.generate("locked", KeyKind::EcP256, true, false).unwrap();
        assert!(matches!(
            ops.generate_csr("locked", &subject),
            Err(KeywardError::AuthorizationFailed(_))
        ));
    }
}
