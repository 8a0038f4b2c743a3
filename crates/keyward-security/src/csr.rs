// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PKCS#10 certificate signing requests for EC P-256 keys, signed with
// ECDSA-with-SHA512.
//
// The private key never leaves its store: the caller passes a closure that
// signs the DER `CertificationRequestInfo` with the stored key.

use der::asn1::{Any, BitString, PrintableStringRef, SetOfVec};
use der::pem::LineEnding;
use der::{Decode, Encode, EncodePem, Tag};
use keyward_core::error::{KeywardError, Result};
use keyward_core::types::{CsrSubject, DnAttribute};
use spki::{AlgorithmIdentifierOwned, ObjectIdentifier, SubjectPublicKeyInfoOwned};
use tracing::{debug, instrument};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};
use x509_cert::request::{CertReq, CertReqInfo, Version};

pub const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
pub const ECDSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

const OID_CN: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const OID_C: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const OID_L: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const OID_ST: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const OID_O: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const OID_OU: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");

fn csr_err(e: impl std::fmt::Display) -> KeywardError {
    KeywardError::CsrGenerationFailed(e.to_string())
}

fn attribute(attr: DnAttribute, value: &str) -> Result<AttributeTypeAndValue> {
    let (oid, tag) = match attr {
        DnAttribute::CommonName => (OID_CN, Tag::Utf8String),
        DnAttribute::Country => {
            PrintableStringRef::new(value)
                .map_err(|_| csr_err(format!("country {value:?} is not a printable string")))?;
            (OID_C, Tag::PrintableString)
        }
        DnAttribute::Locality => (OID_L, Tag::Utf8String),
        DnAttribute::State => (OID_ST, Tag::Utf8String),
        DnAttribute::Organization => (OID_O, Tag::Utf8String),
        DnAttribute::OrganizationalUnit => (OID_OU, Tag::Utf8String),
    };
    let value = Any::new(tag, value.as_bytes()).map_err(csr_err)?;
    Ok(AttributeTypeAndValue { oid, value })
}

/// Encode the subject as an RDN sequence.
///
/// The string form reads CN first; the encoded sequence holds the components
/// in reverse, most significant (OU) first, as X.500 names are written.
pub fn subject_name(subject: &CsrSubject) -> Result<RdnSequence> {
    if subject.common_name.is_empty() {
        return Err(csr_err("subject common name is required"));
    }
    let mut rdns = Vec::new();
    for (attr, value) in subject.components().into_iter().rev() {
        let set = SetOfVec::try_from(vec![attribute(attr, value)?]).map_err(csr_err)?;
        rdns.push(RelativeDistinguishedName(set));
    }
    Ok(RdnSequence(rdns))
}

/// Build a PEM `CERTIFICATE REQUEST` for the EC key in `spki_der`.
///
/// `sign` receives the DER `CertificationRequestInfo` and must return a DER
/// ECDSA signature over its SHA-512 digest. Errors from `sign` are returned
/// unchanged.
#[instrument(skip_all, fields(subject = %subject.distinguished_name()))]
pub fn build_csr<F>(spki_der: &[u8], subject: &CsrSubject, sign: F) -> Result<String>
where
    F: FnOnce(&[u8]) -> Result<Vec<u8>>,
{
    let public_key = SubjectPublicKeyInfoOwned::from_der(spki_der).map_err(csr_err)?;
    if public_key.algorithm.oid != ID_EC_PUBLIC_KEY {
        return Err(csr_err("certificate requests require an EC P-256 key"));
    }

    let info = CertReqInfo {
        version: Version::V1,
        subject: subject_name(subject)?,
        public_key,
        attributes: Default::default(),
    };
    let tbs = info.to_der().map_err(csr_err)?;
    let signature = sign(&tbs)?;

    let request = CertReq {
        info,
        algorithm: AlgorithmIdentifierOwned {
            oid: ECDSA_WITH_SHA512,
            parameters: None,
        },
        signature: BitString::from_bytes(&signature).map_err(csr_err)?,
    };

    let pem = request.to_pem(LineEnding::LF).map_err(csr_err)?;
    debug!(pem_len = pem.len(), "certificate request built");
    Ok(pem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::{DecodePem, Tagged};
    use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
    use p256::ecdsa::{Signature, SigningKey};
    use p256::pkcs8::EncodePublicKey;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use sha2::{Digest, Sha512};

    fn sign_sha512(key: &SigningKey, data: &[u8]) -> Vec<u8> {
        let digest = Sha512::digest(data);
        let signature: Signature = key.sign_prehash(&digest).unwrap();
        signature.to_der().as_bytes().to_vec()
    }

    fn subject() -> CsrSubject {
        CsrSubject {
            common_name: "device-01".into(),
            country: "ID".into(),
            locality: "Jakarta".into(),
            state: "DKI".into(),
            organization: "Example".into(),
            organizational_unit: "Mobile".into(),
        }
    }

    fn signing_key() -> SigningKey {
        SigningKey::random(&mut StdRng::seed_from_u64(11))
    }

    fn first_oid(rdn: &RelativeDistinguishedName) -> ObjectIdentifier {
        rdn.0.iter().next().unwrap().oid
    }

    #[test]
    fn request_verifies_under_its_public_key() {
        let key = signing_key();
        let spki = key.verifying_key().to_public_key_der().unwrap();

        let pem = build_csr(spki.as_bytes(), &subject(), |tbs| Ok(sign_sha512(&key, tbs))).unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));

        let request = CertReq::from_pem(pem.as_bytes()).unwrap();
        assert_eq!(request.algorithm.oid, ECDSA_WITH_SHA512);
        assert_eq!(request.info.public_key.to_der().unwrap(), spki.as_bytes());

        let tbs = request.info.to_der().unwrap();
        let digest = Sha512::digest(&tbs);
        let signature = Signature::from_der(request.signature.raw_bytes()).unwrap();
        key.verifying_key().verify_prehash(&digest, &signature).unwrap();
    }

    #[test]
    fn subject_is_encoded_in_reverse() {
        let name = subject_name(&subject()).unwrap();
        assert_eq!(name.0.len(), 6);
        assert_eq!(first_oid(&name.0[0]), OID_OU);
        assert_eq!(first_oid(&name.0[4]), OID_C);
        assert_eq!(first_oid(&name.0[5]), OID_CN);

        let country = name.0[4].0.iter().next().unwrap();
        assert_eq!(country.value.tag(), Tag::PrintableString);
    }

    #[test]
    fn empty_components_are_skipped() {
        let subject = CsrSubject {
            common_name: "only-cn".into(),
            ..Default::default()
        };
        assert_eq!(subject_name(&subject).unwrap().0.len(), 1);
    }

    #[test]
    fn missing_common_name_rejected() {
        let subject = CsrSubject {
            country: "ID".into(),
            ..Default::default()
        };
        assert!(matches!(
            subject_name(&subject),
            Err(KeywardError::CsrGenerationFailed(_))
        ));
    }

    #[test]
    fn non_printable_country_rejected() {
        let subject = CsrSubject {
            common_name: "cn".into(),
            country: "I@".into(),
            ..Default::default()
        };
        assert!(subject_name(&subject).is_err());
    }

    #[test]
    fn rsa_keys_are_rejected() {
        let mut rng = StdRng::seed_from_u64(12);
        let rsa = rsa::RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let spki = rsa::pkcs8::EncodePublicKey::to_public_key_der(&rsa.to_public_key()).unwrap();
        let result = build_csr(spki.as_bytes(), &subject(), |_| {
            panic!("signer must not run for an RSA key")
        });
        assert!(matches!(result, Err(KeywardError::CsrGenerationFailed(_))));
    }

    #[test]
    fn signer_errors_pass_through() {
        let key = signing_key();
        let spki = key.verifying_key().to_public_key_der().unwrap();
        let result = build_csr(spki.as_bytes(), &subject(), |_| {
            Err(KeywardError::AuthorizationFailed("locked".into()))
        });
        assert!(matches!(result, Err(KeywardError::AuthorizationFailed(_))));
    }
}
