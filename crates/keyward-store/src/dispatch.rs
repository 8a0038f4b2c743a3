// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Named operations for the host method-dispatch layer.
//
// `Session` exposes one method per host call. `MethodCall` / `MethodReply`
// are their serde forms (camelCase method and argument names); failures come
// back as `ErrorReply` with a stable numeric code.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use keyward_bridge::SecureKeyBackend;
use keyward_core::config::StoreConfig;
use keyward_core::error::Result;
use keyward_core::error_codes::ErrorReply;
use keyward_core::types::{CsrSubject, KeyKind};

use crate::asymmetric::AsymmetricOps;
use crate::capability::CapabilityProbe;
use crate::keystore::KeyStore;
use crate::symmetric::SymmetricCipher;
use crate::wrap::KeyWrapProtocol;

// ---------------------------------------------------------------------------
// Wire forms
// ---------------------------------------------------------------------------

/// A host call with its decoded arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args")]
pub enum MethodCall {
    #[serde(rename = "generateSymmetricKey", rename_all = "camelCase")]
    GenerateSymmetricKey {
        alias: String,
        #[serde(default)]
        require_auth: bool,
        #[serde(default)]
        allow_overwrite: bool,
    },
    #[serde(rename = "generateECKeyPair", rename_all = "camelCase")]
    GenerateEcKeyPair {
        alias: String,
        #[serde(default)]
        require_auth: bool,
        #[serde(default)]
        allow_overwrite: bool,
    },
    #[serde(rename = "generateRSAKeyPair", rename_all = "camelCase")]
    GenerateRsaKeyPair {
        alias: String,
        #[serde(default)]
        key_size_bits: Option<u32>,
        #[serde(default)]
        require_auth: bool,
        #[serde(default)]
        allow_overwrite: bool,
    },
    #[serde(rename = "encrypt", rename_all = "camelCase")]
    Encrypt {
        alias: String,
        plaintext: Vec<u8>,
        iv: Vec<u8>,
        #[serde(default)]
        aad: Option<Vec<u8>>,
    },
    #[serde(rename = "decrypt", rename_all = "camelCase")]
    Decrypt {
        alias: String,
        ciphertext: Vec<u8>,
        tag: Vec<u8>,
        iv: Vec<u8>,
        #[serde(default)]
        aad: Option<Vec<u8>>,
    },
    #[serde(rename = "decryptRSA", rename_all = "camelCase")]
    DecryptRsa {
        alias: String,
        ciphertext: Vec<u8>,
        #[serde(default)]
        oaep_label: Option<Vec<u8>>,
    },
    #[serde(rename = "sign")]
    Sign { alias: String, message: Vec<u8> },
    #[serde(rename = "signDigest")]
    SignDigest { alias: String, digest: Vec<u8> },
    #[serde(rename = "issueCSR")]
    IssueCsr { alias: String, subject: CsrSubject },
    #[serde(rename = "exportPublicKey")]
    ExportPublicKey { alias: String },
    #[serde(rename = "importWrappedKey", rename_all = "camelCase")]
    ImportWrappedKey {
        wrapping_alias: String,
        imported_alias: String,
        bundle: Vec<u8>,
        #[serde(default)]
        allow_overwrite: bool,
    },
    #[serde(rename = "deleteKey")]
    DeleteKey { alias: String },
    #[serde(rename = "probeStandardHardware")]
    ProbeStandardHardware,
    #[serde(rename = "probeHighAssuranceHardware")]
    ProbeHighAssuranceHardware,
}

impl MethodCall {
    /// Host-facing method name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GenerateSymmetricKey { .. } => "generateSymmetricKey",
            Self::GenerateEcKeyPair { .. } => "generateECKeyPair",
            Self::GenerateRsaKeyPair { .. } => "generateRSAKeyPair",
            Self::Encrypt { .. } => "encrypt",
            Self::Decrypt { .. } => "decrypt",
            Self::DecryptRsa { .. } => "decryptRSA",
            Self::Sign { .. } => "sign",
            Self::SignDigest { .. } => "signDigest",
            Self::IssueCsr { .. } => "issueCSR",
            Self::ExportPublicKey { .. } => "exportPublicKey",
            Self::ImportWrappedKey { .. } => "importWrappedKey",
            Self::DeleteKey { .. } => "deleteKey",
            Self::ProbeStandardHardware => "probeStandardHardware",
            Self::ProbeHighAssuranceHardware => "probeHighAssuranceHardware",
        }
    }
}

/// Successful result of a host call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum MethodReply {
    Unit,
    Bytes(Vec<u8>),
    Text(String),
    Bool(bool),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An open key store plus the operations the host can call on it.
pub struct Session {
    store: KeyStore,
}

impl Session {
    pub fn new(store: KeyStore) -> Self {
        Self { store }
    }

    /// Probe `backend` and open a session on it.
    pub fn open(backend: Arc<dyn SecureKeyBackend>, config: StoreConfig) -> Result<Self> {
        KeyStore::open(backend, config).map(Self::new)
    }

    pub fn store(&self) -> &KeyStore {
        &self.store
    }

    pub fn generate_symmetric_key(&self, alias: &str, require_auth: bool, allow_overwrite: bool) -> Result<()> {
        self.store
            .generate(alias, KeyKind::Aes256, require_auth, allow_overwrite)
            .map(|_| ())
    }

    pub fn generate_ec_key_pair(&self, alias: &str, require_auth: bool, allow_overwrite: bool) -> Result<()> {
        self.store
            .generate(alias, KeyKind::EcP256, require_auth, allow_overwrite)
            .map(|_| ())
    }

    /// `key_size_bits` defaults to `StoreConfig::default_rsa_key_bits`.
    pub fn generate_rsa_key_pair(
        &self,
        alias: &str,
        key_size_bits: Option<u32>,
        require_auth: bool,
        allow_overwrite: bool,
    ) -> Result<()> {
        let bits = key_size_bits.unwrap_or(self.store.config().default_rsa_key_bits);
        self.store
            .generate(alias, KeyKind::Rsa { bits }, require_auth, allow_overwrite)
            .map(|_| ())
    }

    pub fn encrypt(&self, alias: &str, plaintext: &[u8], iv: &[u8], aad: Option<&[u8]>) -> Result<Vec<u8>> {
        SymmetricCipher::new(&self.store).encrypt(alias, plaintext, iv, aad)
    }

    pub fn decrypt(
        &self,
        alias: &str,
        ciphertext: &[u8],
        tag: &[u8],
        iv: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        SymmetricCipher::new(&self.store).decrypt(alias, ciphertext, tag, iv, aad)
    }

    pub fn decrypt_rsa(&self, alias: &str, ciphertext: &[u8], oaep_label: Option<&[u8]>) -> Result<Vec<u8>> {
        AsymmetricOps::new(&self.store).decrypt_rsa(alias, ciphertext, oaep_label)
    }

    pub fn sign(&self, alias: &str, message: &[u8]) -> Result<Vec<u8>> {
        AsymmetricOps::new(&self.store).sign_data(alias, message)
    }

    pub fn sign_digest(&self, alias: &str, digest: &[u8]) -> Result<Vec<u8>> {
        AsymmetricOps::new(&self.store).sign_digest(alias, digest)
    }

    pub fn issue_csr(&self, alias: &str, subject: &CsrSubject) -> Result<String> {
        AsymmetricOps::new(&self.store).generate_csr(alias, subject)
    }

    pub fn export_public_key(&self, alias: &str) -> Result<String> {
        self.store.export_public_key_pem(alias)
    }

    pub fn import_wrapped_key(
        &self,
        wrapping_alias: &str,
        imported_alias: &str,
        bundle: &[u8],
        allow_overwrite: bool,
    ) -> Result<()> {
        KeyWrapProtocol::new(&self.store)
            .import(bundle, wrapping_alias, imported_alias, allow_overwrite)
            .map(|_| ())
    }

    pub fn delete_key(&self, alias: &str) -> Result<()> {
        self.store.delete(alias)
    }

    /// Fresh probe; does not change the capabilities the store was opened with.
    pub fn probe_standard_hardware(&self) -> Result<bool> {
        CapabilityProbe::new(self.store.backend(), self.store.config()).is_standard_hardware_available()
    }

    pub fn probe_high_assurance_hardware(&self) -> Result<bool> {
        CapabilityProbe::new(self.store.backend(), self.store.config())
            .is_high_assurance_hardware_available()
    }

    /// Run a host call and map any failure to its stable error reply.
    #[instrument(skip_all, fields(method = call.name()))]
    pub fn handle(&self, call: MethodCall) -> std::result::Result<MethodReply, ErrorReply> {
        self.execute(call).map_err(|e| {
            let reply = ErrorReply::from(&e);
            warn!(code = reply.code, error = %e, "call failed");
            reply
        })
    }

    fn execute(&self, call: MethodCall) -> Result<MethodReply> {
        use MethodReply::{Bool, Bytes, Text, Unit};

        Ok(match call {
            MethodCall::GenerateSymmetricKey {
                alias,
                require_auth,
                allow_overwrite,
            } => self
                .generate_symmetric_key(&alias, require_auth, allow_overwrite)
                .map(|_| Unit)?,
            MethodCall::GenerateEcKeyPair {
                alias,
                require_auth,
                allow_overwrite,
            } => self
                .generate_ec_key_pair(&alias, require_auth, allow_overwrite)
                .map(|_| Unit)?,
            MethodCall::GenerateRsaKeyPair {
                alias,
                key_size_bits,
                require_auth,
                allow_overwrite,
            } => self
                .generate_rsa_key_pair(&alias, key_size_bits, require_auth, allow_overwrite)
                .map(|_| Unit)?,
            MethodCall::Encrypt {
                alias,
                plaintext,
                iv,
                aad,
            } => Bytes(self.encrypt(&alias, &plaintext, &iv, aad.as_deref())?),
            MethodCall::Decrypt {
                alias,
                ciphertext,
                tag,
                iv,
                aad,
            } => Bytes(self.decrypt(&alias, &ciphertext, &tag, &iv, aad.as_deref())?),
            MethodCall::DecryptRsa {
                alias,
                ciphertext,
                oaep_label,
            } => Bytes(self.decrypt_rsa(&alias, &ciphertext, oaep_label.as_deref())?),
            MethodCall::Sign { alias, message } => Bytes(self.sign(&alias, &message)?),
            MethodCall::SignDigest { alias, digest } => Bytes(self.sign_digest(&alias, &digest)?),
            MethodCall::IssueCsr { alias, subject } => Text(self.issue_csr(&alias, &subject)?),
            MethodCall::ExportPublicKey { alias } => Text(self.export_public_key(&alias)?),
            MethodCall::ImportWrappedKey {
                wrapping_alias,
                imported_alias,
                bundle,
                allow_overwrite,
            } => self
                .import_wrapped_key(&wrapping_alias, &imported_alias, &bundle, allow_overwrite)
                .map(|_| Unit)?,
            MethodCall::DeleteKey { alias } => self.delete_key(&alias).map(|_| Unit)?,
            MethodCall::ProbeStandardHardware => Bool(self.probe_standard_hardware()?),
            MethodCall::ProbeHighAssuranceHardware => Bool(self.probe_high_assurance_hardware()?),
        })
    }
}
