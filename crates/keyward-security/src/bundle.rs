// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Secure-import wrapped key bundle.
//
//   KeyDescription ::= SEQUENCE {
//       keyFormat        INTEGER,
//       keyParams        AuthorizationList,
//   }
//
//   SecureKeyWrapper ::= SEQUENCE {
//       version                INTEGER,       -- always 0
//       encryptedTransportKey  OCTET STRING,  -- RSA-OAEP(ephemeral AES key)
//       initializationVector   OCTET STRING,  -- 12 bytes
//       keyDescription         KeyDescription,
//       encryptedKey           OCTET STRING,  -- AES-GCM ciphertext, no tag
//       tag                    OCTET STRING,  -- 16 bytes
//   }
//
// The DER of `keyDescription` is the AAD of the GCM encryption.

use keyward_core::error::{KeywardError, Result};
use keyward_core::types::{AES_256_KEY_LEN, AuthorizationList, GCM_IV_LEN, GCM_TAG_LEN, KeyFormat};
use rand::{CryptoRng, RngCore};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use crate::asn1::{self, Reader};
use crate::{aead, authlist, oaep};

/// The only bundle version the secure hardware accepts.
pub const BUNDLE_VERSION: u64 = 0;

/// Format and authorizations of the key inside a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescription {
    pub key_format: KeyFormat,
    pub authorizations: AuthorizationList,
}

impl KeyDescription {
    pub fn new(key_format: KeyFormat, authorizations: AuthorizationList) -> Self {
        Self {
            key_format,
            authorizations,
        }
    }

    /// DER encoding, also used as the GCM additional data.
    pub fn to_der(&self) -> Vec<u8> {
        asn1::sequence([
            asn1::integer(self.key_format.code()),
            authlist::encode(&self.authorizations),
        ])
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self> {
        let mut fields = reader.read_sequence()?;
        let code = fields.read_integer()?;
        let key_format = KeyFormat::from_code(code)
            .ok_or_else(|| KeywardError::ImportRejected(format!("unknown key format {code}")))?;
        let authorizations = authlist::decode_from(&mut fields)?;
        fields.finish()?;
        Ok(Self {
            key_format,
            authorizations,
        })
    }
}

/// A parsed `SecureKeyWrapper`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKeyBundle {
    encrypted_transport_key: Vec<u8>,
    iv: [u8; GCM_IV_LEN],
    description: KeyDescription,
    encrypted_key: Vec<u8>,
    tag: [u8; GCM_TAG_LEN],
}

impl WrappedKeyBundle {
    pub fn new(
        encrypted_transport_key: Vec<u8>,
        iv: [u8; GCM_IV_LEN],
        description: KeyDescription,
        encrypted_key: Vec<u8>,
        tag: [u8; GCM_TAG_LEN],
    ) -> Self {
        Self {
            encrypted_transport_key,
            iv,
            description,
            encrypted_key,
            tag,
        }
    }

    /// RSA-OAEP encryption of the ephemeral AES key.
    pub fn encrypted_transport_key(&self) -> &[u8] {
        &self.encrypted_transport_key
    }

    pub fn iv(&self) -> &[u8; GCM_IV_LEN] {
        &self.iv
    }

    pub fn description(&self) -> &KeyDescription {
        &self.description
    }

    /// GCM ciphertext of the key material, without the tag.
    pub fn encrypted_key(&self) -> &[u8] {
        &self.encrypted_key
    }

    pub fn tag(&self) -> &[u8; GCM_TAG_LEN] {
        &self.tag
    }

    pub fn to_der(&self) -> Vec<u8> {
        asn1::sequence([
            asn1::integer(BUNDLE_VERSION),
            asn1::octet_string(&self.encrypted_transport_key),
            asn1::octet_string(&self.iv),
            self.description.to_der(),
            asn1::octet_string(&self.encrypted_key),
            asn1::octet_string(&self.tag),
        ])
    }

    /// Parse a DER bundle. Any deviation from the structure above, including
    /// trailing bytes, is an `ImportRejected` error.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let mut outer = Reader::new(der);
        let mut fields = outer.read_sequence()?;
        outer.finish()?;

        let version = fields.read_integer()?;
        if version != BUNDLE_VERSION {
            return Err(KeywardError::ImportRejected(format!(
                "unsupported bundle version {version}"
            )));
        }

        let encrypted_transport_key = fields.read_octet_string()?.to_vec();
        if encrypted_transport_key.is_empty() {
            return Err(KeywardError::ImportRejected(
                "empty encrypted transport key".into(),
            ));
        }

        let iv: [u8; GCM_IV_LEN] = fields.read_octet_string()?.try_into().map_err(|_| {
            KeywardError::ImportRejected(format!("initialization vector must be {GCM_IV_LEN} bytes"))
        })?;

        let description = KeyDescription::decode_from(&mut fields)?;
        let encrypted_key = fields.read_octet_string()?.to_vec();

        let tag: [u8; GCM_TAG_LEN] = fields.read_octet_string()?.try_into().map_err(|_| {
            KeywardError::ImportRejected(format!("tag must be {GCM_TAG_LEN} bytes"))
        })?;
        fields.finish()?;

        Ok(Self {
            encrypted_transport_key,
            iv,
            description,
            encrypted_key,
            tag,
        })
    }
}

/// Seal `key_material` for the holder of `recipient`'s private key.
///
/// A fresh AES-256 transport key and IV are drawn from `rng` for every call,
/// in that order, followed by the OAEP seed. With a seeded generator the
/// output is reproducible byte for byte.
#[instrument(skip_all, fields(format = ?description.key_format, material_len = key_material.len()))]
pub fn wrap<R>(
    recipient: &RsaPublicKey,
    key_material: &[u8],
    description: KeyDescription,
    rng: &mut R,
) -> Result<WrappedKeyBundle>
where
    R: RngCore + CryptoRng,
{
    if key_material.is_empty() {
        return Err(KeywardError::InvalidArgument("key material is empty".into()));
    }

    let mut transport_key = Zeroizing::new([0u8; AES_256_KEY_LEN]);
    rng.fill_bytes(&mut transport_key[..]);
    let mut iv = [0u8; GCM_IV_LEN];
    rng.fill_bytes(&mut iv);

    let aad = description.to_der();
    let (encrypted_key, tag) = aead::seal_detached(&transport_key[..], &iv, &aad, key_material)?;
    let encrypted_transport_key = oaep::encrypt(recipient, &transport_key[..], None, rng)?;

    debug!(
        encrypted_key_len = encrypted_key.len(),
        transport_key_len = encrypted_transport_key.len(),
        "key material wrapped"
    );
    Ok(WrappedKeyBundle::new(
        encrypted_transport_key,
        iv,
        description,
        encrypted_key,
        tag,
    ))
}

impl WrappedKeyBundle {
    /// Recover the key material with the transport private key.
    ///
    /// Every failure is reported as `ImportRejected`; no partial material is
    /// returned.
    pub fn unwrap_with(&self, transport: &RsaPrivateKey) -> Result<Zeroizing<Vec<u8>>> {
        let transport_key = oaep::decrypt(transport, &self.encrypted_transport_key, None)
            .map_err(|e| KeywardError::ImportRejected(format!("transport key: {e}")))?;
        if transport_key.len() != AES_256_KEY_LEN {
            return Err(KeywardError::ImportRejected(format!(
                "transport key must be {AES_256_KEY_LEN} bytes, got {}",
                transport_key.len()
            )));
        }

        let aad = self.description.to_der();
        aead::open_detached(&transport_key, &self.iv, &aad, &self.encrypted_key, &self.tag)
            .map(Zeroizing::new)
            .map_err(|_| KeywardError::ImportRejected("key material failed authentication".into()))
    }
}
