// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub backend for desktop/CI builds where no platform key store exists.
//
// It holds no keys. Lookups report nothing stored, deletes succeed, and
// anything that would need a key fails with `HardwareUnavailable`. Use
// `SoftwareBackend` for a working store off-device.

use keyward_core::error::{KeywardError, Result};
use keyward_core::types::{KeyGenSpec, KeyHandle, SignatureScheme};

use crate::traits::SecureKeyBackend;

/// No-op backend returned on platforms without a secure key store.
pub struct StubBackend;

fn unavailable(operation: &str) -> KeywardError {
    tracing::warn!(operation, "secure key operation called on stub backend");
    KeywardError::HardwareUnavailable("no platform key store on this target".into())
}

impl SecureKeyBackend for StubBackend {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }

    fn platform_version(&self) -> u32 {
        0
    }

    fn entry(&self, _alias: &str) -> Result<Option<KeyHandle>> {
        Ok(None)
    }

    fn generate(&self, _spec: &KeyGenSpec) -> Result<KeyHandle> {
        Err(unavailable("generate"))
    }

    fn delete(&self, _alias: &str) -> Result<()> {
        Ok(())
    }

    fn public_key_der(&self, alias: &str) -> Result<Vec<u8>> {
        Err(KeywardError::KeyNotFound(alias.to_owned()))
    }

    fn aead_seal(&self, alias: &str, _iv: &[u8], _aad: &[u8], _plaintext: &[u8]) -> Result<Vec<u8>> {
        Err(KeywardError::KeyNotFound(alias.to_owned()))
    }

    fn aead_open(&self, alias: &str, _iv: &[u8], _aad: &[u8], _input: &[u8]) -> Result<Vec<u8>> {
        Err(KeywardError::KeyNotFound(alias.to_owned()))
    }

    fn rsa_decrypt(&self, alias: &str, _ciphertext: &[u8], _label: Option<&[u8]>) -> Result<Vec<u8>> {
        Err(KeywardError::KeyNotFound(alias.to_owned()))
    }

    fn sign(&self, alias: &str, _scheme: SignatureScheme, _data: &[u8]) -> Result<Vec<u8>> {
        Err(KeywardError::KeyNotFound(alias.to_owned()))
    }

    fn supports_raw_digest_signing(&self) -> bool {
        false
    }

    fn import_wrapped(&self, _wrapping: &str, _imported: &str, _bundle_der: &[u8]) -> Result<KeyHandle> {
        Err(unavailable("import_wrapped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_core::types::{AuthPolicy, AuthorizationList, HardwareTier, KeyKind};

    #[test]
    fn stub_holds_nothing() {
        let stub = StubBackend;
        assert!(!stub.contains("anything").unwrap());
        stub.delete("anything").unwrap();

        let spec = KeyGenSpec {
            alias: "k".into(),
            kind: KeyKind::Aes256,
            tier: HardwareTier::Software,
            auth_policy: AuthPolicy::None,
            authorizations: AuthorizationList::for_generated(KeyKind::Aes256, false),
        };
        assert!(stub.generate(&spec).unwrap_err().is_hardware_unavailable());
    }
}
