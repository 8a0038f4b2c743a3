// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Keyward key store.
//
// The numeric codes on `KeyPurpose`, `Algorithm`, `BlockMode`, `Padding` and
// `KeyFormat` are part of the wrapped-key wire format and must never change.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of the caller-supplied AES-GCM nonce in bytes.
pub const GCM_IV_LEN: usize = 12;

/// Length of the AES-GCM authentication tag in bytes (always 128 bits).
pub const GCM_TAG_LEN: usize = 16;

/// Length of an AES-256 key in bytes.
pub const AES_256_KEY_LEN: usize = 32;

/// RSA modulus sizes accepted for generation.
pub const RSA_KEY_SIZES: [u32; 3] = [2048, 3072, 4096];

/// The kind of key held under an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    /// AES-256 secret key, used with AES-GCM.
    Aes256,
    /// ECDSA key pair on NIST P-256.
    EcP256,
    /// RSA key pair with the given modulus size.
    Rsa { bits: u32 },
}

impl KeyKind {
    /// The wire algorithm for this kind.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Aes256 => Algorithm::Aes,
            Self::EcP256 => Algorithm::Ec,
            Self::Rsa { .. } => Algorithm::Rsa,
        }
    }

    /// Key size in bits as recorded in an authorization list.
    pub fn key_size_bits(&self) -> u32 {
        match self {
            Self::Aes256 => 256,
            Self::EcP256 => 256,
            Self::Rsa { bits } => *bits,
        }
    }

    /// Whether the kind has a public half that can be exported.
    pub fn is_asymmetric(&self) -> bool {
        !matches!(self, Self::Aes256)
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aes256 => write!(f, "AES-256"),
            Self::EcP256 => write!(f, "EC-P256"),
            Self::Rsa { bits } => write!(f, "RSA-{bits}"),
        }
    }
}

/// Assurance level of the storage that holds a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HardwareTier {
    /// Keys live in process-protected software storage.
    Software,
    /// Keys live in the device's standard secure hardware (TEE).
    Standard,
    /// Keys live in a dedicated high-assurance security chip.
    HighAssurance,
}

impl std::fmt::Display for HardwareTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Software => write!(f, "software"),
            Self::Standard => write!(f, "hardware-standard"),
            Self::HighAssurance => write!(f, "hardware-high-assurance"),
        }
    }
}

/// User-authentication requirement bound to a key at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthPolicy {
    /// The key is usable without user authentication.
    None,
    /// The key is usable for `seconds` after the user authenticates.
    ValidityWindow { seconds: u32 },
    /// The key is usable for `seconds` after a strong biometric or device
    /// credential authentication.
    BiometricOrCredential { seconds: u32 },
}

impl AuthPolicy {
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Validity window in seconds, if the policy has one.
    pub fn window_secs(&self) -> Option<u32> {
        match self {
            Self::None => None,
            Self::ValidityWindow { seconds } | Self::BiometricOrCredential { seconds } => {
                Some(*seconds)
            }
        }
    }
}

/// What a key may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyPurpose {
    Encrypt,
    Decrypt,
    Sign,
    Verify,
    WrapKey,
}

impl KeyPurpose {
    pub const fn code(self) -> u64 {
        match self {
            Self::Encrypt => 0,
            Self::Decrypt => 1,
            Self::Sign => 2,
            Self::Verify => 3,
            Self::WrapKey => 5,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Encrypt),
            1 => Some(Self::Decrypt),
            2 => Some(Self::Sign),
            3 => Some(Self::Verify),
            5 => Some(Self::WrapKey),
            _ => None,
        }
    }
}

/// Key algorithm as carried in an authorization list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    Rsa,
    Ec,
    Aes,
}

impl Algorithm {
    pub const fn code(self) -> u64 {
        match self {
            Self::Rsa => 1,
            Self::Ec => 3,
            Self::Aes => 32,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::Rsa),
            3 => Some(Self::Ec),
            32 => Some(Self::Aes),
            _ => None,
        }
    }
}

/// Symmetric block mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BlockMode {
    Ecb,
    Cbc,
    Ctr,
    Gcm,
}

impl BlockMode {
    pub const fn code(self) -> u64 {
        match self {
            Self::Ecb => 1,
            Self::Cbc => 2,
            Self::Ctr => 3,
            Self::Gcm => 32,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::Ecb),
            2 => Some(Self::Cbc),
            3 => Some(Self::Ctr),
            32 => Some(Self::Gcm),
            _ => None,
        }
    }
}

/// Encryption or signature padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Padding {
    None,
    RsaOaep,
    RsaPss,
    RsaPkcs1Encrypt,
    RsaPkcs1Sign,
    Pkcs7,
}

impl Padding {
    pub const fn code(self) -> u64 {
        match self {
            Self::None => 1,
            Self::RsaOaep => 2,
            Self::RsaPss => 3,
            Self::RsaPkcs1Encrypt => 4,
            Self::RsaPkcs1Sign => 5,
            Self::Pkcs7 => 64,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::None),
            2 => Some(Self::RsaOaep),
            3 => Some(Self::RsaPss),
            4 => Some(Self::RsaPkcs1Encrypt),
            5 => Some(Self::RsaPkcs1Sign),
            64 => Some(Self::Pkcs7),
            _ => None,
        }
    }
}

/// Encoding of the key material carried inside a wrapped key bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyFormat {
    /// DER SubjectPublicKeyInfo.
    X509,
    /// DER PKCS#8 PrivateKeyInfo.
    Pkcs8,
    /// Raw secret key bytes.
    Raw,
}

impl KeyFormat {
    pub const fn code(self) -> u64 {
        match self {
            Self::X509 => 0,
            Self::Pkcs8 => 1,
            Self::Raw => 3,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::X509),
            1 => Some(Self::Pkcs8),
            3 => Some(Self::Raw),
            _ => None,
        }
    }
}

/// Machine-checkable usage policy for a key.
///
/// Sets are kept ordered so that the same logical list always produces the
/// same DER encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationList {
    pub purposes: BTreeSet<KeyPurpose>,
    pub algorithm: Algorithm,
    pub key_size_bits: u32,
    pub block_modes: BTreeSet<BlockMode>,
    pub paddings: BTreeSet<Padding>,
    pub no_auth_required: bool,
}

impl AuthorizationList {
    /// The list a freshly generated key of `kind` receives.
    ///
    /// AES keys are GCM-only with no padding; EC keys sign and verify; RSA
    /// keys get every purpose including key wrapping, OAEP for encryption
    /// and PKCS#1 for signatures.
    pub fn for_generated(kind: KeyKind, require_auth: bool) -> Self {
        let (purposes, block_modes, paddings) = match kind {
            KeyKind::Aes256 => (
                BTreeSet::from([KeyPurpose::Encrypt, KeyPurpose::Decrypt]),
                BTreeSet::from([BlockMode::Gcm]),
                BTreeSet::from([Padding::None]),
            ),
            KeyKind::EcP256 => (
                BTreeSet::from([KeyPurpose::Sign, KeyPurpose::Verify]),
                BTreeSet::new(),
                BTreeSet::new(),
            ),
            KeyKind::Rsa { .. } => (
                BTreeSet::from([
                    KeyPurpose::Encrypt,
                    KeyPurpose::Decrypt,
                    KeyPurpose::Sign,
                    KeyPurpose::Verify,
                    KeyPurpose::WrapKey,
                ]),
                BTreeSet::from([BlockMode::Ecb]),
                BTreeSet::from([Padding::RsaOaep, Padding::RsaPkcs1Sign]),
            ),
        };

        Self {
            purposes,
            algorithm: kind.algorithm(),
            key_size_bits: kind.key_size_bits(),
            block_modes,
            paddings,
            no_auth_required: !require_auth,
        }
    }

    /// An AES-GCM encrypt/decrypt list for importing a symmetric key.
    pub fn aes_gcm_import(key_size_bits: u32, no_auth_required: bool) -> Self {
        Self {
            purposes: BTreeSet::from([KeyPurpose::Encrypt, KeyPurpose::Decrypt]),
            algorithm: Algorithm::Aes,
            key_size_bits,
            block_modes: BTreeSet::from([BlockMode::Gcm]),
            paddings: BTreeSet::from([Padding::None]),
            no_auth_required,
        }
    }

    pub fn permits(&self, purpose: KeyPurpose) -> bool {
        self.purposes.contains(&purpose)
    }
}

/// Reference to a key held by the secure store.
///
/// A handle never carries key bytes; it only names a key and describes how
/// the store will let it be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyHandle {
    pub alias: String,
    pub kind: KeyKind,
    pub tier: HardwareTier,
    pub auth_policy: AuthPolicy,
    pub purposes: BTreeSet<KeyPurpose>,
    pub created_at: DateTime<Utc>,
}

/// Fully resolved request handed to a backend to create a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyGenSpec {
    pub alias: String,
    pub kind: KeyKind,
    pub tier: HardwareTier,
    pub auth_policy: AuthPolicy,
    pub authorizations: AuthorizationList,
}

/// Signature algorithm selected for a signing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureScheme {
    /// SHA-512 of the message, then ECDSA (DER signature).
    EcdsaSha512,
    /// ECDSA over caller-supplied digest bytes, no hashing.
    EcdsaRawDigest,
    /// RSASSA-PKCS1-v1_5 with SHA-512.
    RsaPkcs1Sha512,
}

/// Subject of a certificate signing request.
///
/// Components are always rendered in the order CN, C, L, ST, O, OU. Empty
/// components are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CsrSubject {
    pub common_name: String,
    pub country: String,
    pub locality: String,
    pub state: String,
    pub organization: String,
    pub organizational_unit: String,
}

/// Attribute of a distinguished-name component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnAttribute {
    CommonName,
    Country,
    Locality,
    State,
    Organization,
    OrganizationalUnit,
}

impl DnAttribute {
    /// Short name used in the string form of a distinguished name.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::CommonName => "CN",
            Self::Country => "C",
            Self::Locality => "L",
            Self::State => "ST",
            Self::Organization => "O",
            Self::OrganizationalUnit => "OU",
        }
    }
}

impl CsrSubject {
    /// Non-empty components in canonical order.
    pub fn components(&self) -> Vec<(DnAttribute, &str)> {
        [
            (DnAttribute::CommonName, self.common_name.as_str()),
            (DnAttribute::Country, self.country.as_str()),
            (DnAttribute::Locality, self.locality.as_str()),
            (DnAttribute::State, self.state.as_str()),
            (DnAttribute::Organization, self.organization.as_str()),
            (DnAttribute::OrganizationalUnit, self.organizational_unit.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect()
    }

    /// Comma-separated string form, e.g. `CN=app,C=ID,O=Example`.
    pub fn distinguished_name(&self) -> String {
        self.components()
            .into_iter()
            .map(|(attr, value)| format!("{}={}", attr.short_name(), escape_dn_value(value)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Escape a value for the RFC 4514 string form.
fn escape_dn_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut out = String::with_capacity(value.len());
    for (i, ch) in value.chars().enumerate() {
        let leading = i == 0 && (ch == ' ' || ch == '#');
        let trailing = i == last && ch == ' ';
        if leading || trailing || matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_round_trip() {
        for purpose in [
            KeyPurpose::Encrypt,
            KeyPurpose::Decrypt,
            KeyPurpose::Sign,
            KeyPurpose::Verify,
            KeyPurpose::WrapKey,
        ] {
            assert_eq!(KeyPurpose::from_code(purpose.code()), Some(purpose));
        }
        assert_eq!(Algorithm::Aes.code(), 32);
        assert_eq!(BlockMode::Gcm.code(), 32);
        assert_eq!(Padding::Pkcs7.code(), 64);
        assert_eq!(KeyFormat::Raw.code(), 3);
        assert_eq!(KeyPurpose::from_code(4), None, "4 is not a purpose code");
    }

    #[test]
    fn generated_aes_list_is_gcm_only() {
        let list = AuthorizationList::for_generated(KeyKind::Aes256, false);
        assert_eq!(list.algorithm, Algorithm::Aes);
        assert_eq!(list.key_size_bits, 256);
        assert_eq!(list.block_modes, BTreeSet::from([BlockMode::Gcm]));
        assert_eq!(list.paddings, BTreeSet::from([Padding::None]));
        assert!(list.no_auth_required);
    }

    #[test]
    fn generated_ec_list_only_signs() {
        let list = AuthorizationList::for_generated(KeyKind::EcP256, true);
        assert!(list.permits(KeyPurpose::Sign));
        assert!(list.permits(KeyPurpose::Verify));
        assert!(!list.permits(KeyPurpose::Encrypt));
        assert!(!list.no_auth_required);
    }

    #[test]
    fn generated_rsa_list_can_wrap() {
        let list = AuthorizationList::for_generated(KeyKind::Rsa { bits: 3072 }, false);
        assert!(list.permits(KeyPurpose::WrapKey));
        assert!(list.paddings.contains(&Padding::RsaOaep));
        assert!(list.paddings.contains(&Padding::RsaPkcs1Sign));
        assert_eq!(list.key_size_bits, 3072);
    }

    #[test]
    fn distinguished_name_order_and_escaping() {
        let subject = CsrSubject {
            common_name: "device, primary".into(),
            country: "ID".into(),
            locality: "Jakarta".into(),
            state: String::new(),
            organization: "Example".into(),
            organizational_unit: "Mobile".into(),
        };
        assert_eq!(
            subject.distinguished_name(),
            "CN=device\\, primary,C=ID,L=Jakarta,O=Example,OU=Mobile"
        );
    }

    #[test]
    fn auth_policy_windows() {
        assert_eq!(AuthPolicy::None.window_secs(), None);
        assert!(!AuthPolicy::None.requires_auth());
        assert_eq!(
            AuthPolicy::BiometricOrCredential { seconds: 120 }.window_secs(),
            Some(120)
        );
    }
}
