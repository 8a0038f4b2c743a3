// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Secure key import.
//
// Export side: seal key material into a `WrappedKeyBundle` for the holder of
// an RSA wrapping key. Import side: hand the serialized bundle to the backend,
// which unwraps and installs it without the material leaving the store.

use rand::RngCore;
use rand::rngs::OsRng;
use rsa::RsaPublicKey;
use tracing::{debug, info, instrument};
use zeroize::Zeroizing;

use keyward_core::error::{KeywardError, Result};
use keyward_core::types::{
    AES_256_KEY_LEN, AuthorizationList, HardwareTier, KeyFormat, KeyGenSpec, KeyHandle, KeyKind,
    KeyPurpose,
};
use keyward_security::{KeyDescription, WrappedKeyBundle, oaep};

use crate::capability::{ProbeKeyGuard, probe_alias};
use crate::keystore::KeyStore;

/// RSA size of the throwaway wrapping key used by the import probe.
const PROBE_WRAPPING_KEY_BITS: u32 = 2048;

pub struct KeyWrapProtocol<'a> {
    store: &'a KeyStore,
}

impl<'a> KeyWrapProtocol<'a> {
    pub fn new(store: &'a KeyStore) -> Self {
        Self { store }
    }

    /// Seal `key_material` for `recipient` with a fresh transport key and IV.
    pub fn wrap(
        recipient: &RsaPublicKey,
        key_material: &[u8],
        key_format: KeyFormat,
        authorizations: AuthorizationList,
    ) -> Result<WrappedKeyBundle> {
        keyward_security::wrap(
            recipient,
            key_material,
            KeyDescription::new(key_format, authorizations),
            &mut OsRng,
        )
    }

    /// [`Self::wrap`] for a recipient key given as a `PUBLIC KEY` PEM.
    pub fn wrap_pem(
        recipient_pem: &str,
        key_material: &[u8],
        key_format: KeyFormat,
        authorizations: AuthorizationList,
    ) -> Result<WrappedKeyBundle> {
        let recipient = oaep::public_key_from_pem(recipient_pem)?;
        Self::wrap(&recipient, key_material, key_format, authorizations)
    }

    /// Wrap to the public half of a wrapping key already in this store.
    #[instrument(skip_all, fields(wrapping_alias = %wrapping_alias))]
    pub fn wrap_for_alias(
        &self,
        wrapping_alias: &str,
        key_material: &[u8],
        key_format: KeyFormat,
        authorizations: AuthorizationList,
    ) -> Result<WrappedKeyBundle> {
        let recipient = oaep::public_key_from_der(&self.store.public_key_der(wrapping_alias)?)?;
        Self::wrap(&recipient, key_material, key_format, authorizations)
    }

    /// Install the key in `bundle_der` under `imported_alias`, unwrapping it
    /// with the key at `wrapping_alias`.
    ///
    /// The bundle is parsed before anything is touched, so a malformed bundle
    /// never costs an existing key its slot.
    #[instrument(skip_all, fields(
        wrapping_alias = %wrapping_alias,
        imported_alias = %imported_alias,
        bundle_len = bundle_der.len(),
    ))]
    pub fn import(
        &self,
        bundle_der: &[u8],
        wrapping_alias: &str,
        imported_alias: &str,
        allow_overwrite: bool,
    ) -> Result<KeyHandle> {
        if imported_alias.is_empty() {
            return Err(KeywardError::InvalidArgument("alias must not be empty".into()));
        }
        if imported_alias == wrapping_alias {
            return Err(KeywardError::InvalidArgument(
                "a wrapping key cannot be replaced by the key it unwraps".into(),
            ));
        }
        let bundle = WrappedKeyBundle::from_der(bundle_der)?;
        debug!(format = ?bundle.description().key_format, "bundle parsed");

        let wrapping = self.store.get(wrapping_alias)?;
        if !wrapping.purposes.contains(&KeyPurpose::WrapKey) {
            return Err(KeywardError::AuthorizationFailed(format!(
                "{wrapping_alias} is not a wrapping key"
            )));
        }

        self.store.make_room(imported_alias, allow_overwrite)?;
        let handle = self
            .store
            .backend()
            .import_wrapped(wrapping_alias, imported_alias, bundle_der)?;
        info!(kind = %handle.kind, tier = %handle.tier, "wrapped key imported");
        Ok(handle)
    }

    /// Whether the backend can import wrapped keys.
    ///
    /// Runs a full wrap and import with throwaway keys; both aliases are
    /// removed again on every path.
    #[instrument(skip_all)]
    pub fn probe_secure_import(&self) -> Result<bool> {
        if !self.store.capabilities().standard_hardware {
            debug!("no secure hardware, secure import unavailable");
            return Ok(false);
        }
        let backend = self.store.backend();
        let prefix = &self.store.config().probe_alias_prefix;
        let wrapping = ProbeKeyGuard::new(backend, probe_alias(prefix));
        let imported = ProbeKeyGuard::new(backend, probe_alias(prefix));

        let spec = self.store.plan(
            wrapping.alias(),
            KeyKind::Rsa {
                bits: PROBE_WRAPPING_KEY_BITS,
            },
            false,
        )?;
        match backend.generate(&spec) {
            Ok(_) => {}
            Err(e) if e.is_hardware_unavailable() && spec.tier == HardwareTier::HighAssurance => {
                // A standard-tier wrapping key is enough to answer the question.
                backend.generate(&KeyGenSpec {
                    tier: HardwareTier::Standard,
                    ..spec
                })?;
            }
            Err(e) if e.is_hardware_unavailable() => return Ok(false),
            Err(e) => return Err(e),
        }

        let mut material = Zeroizing::new([0u8; AES_256_KEY_LEN]);
        OsRng.fill_bytes(&mut material[..]);
        let bundle = self.wrap_for_alias(
            wrapping.alias(),
            &material[..],
            KeyFormat::Raw,
            AuthorizationList::aes_gcm_import(256, true),
        )?;

        match backend.import_wrapped(wrapping.alias(), imported.alias(), &bundle.to_der()) {
            Ok(_) => Ok(true),
            Err(KeywardError::HardwareUnavailable(reason) | KeywardError::ImportRejected(reason)) => {
                debug!(%reason, "secure import unavailable");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
