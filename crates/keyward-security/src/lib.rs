// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// keyward-security — Cryptographic building blocks for Keyward.
//
// Everything here is pure: no key store state, no platform calls. Backends
// and the store compose these into key operations.
//
//   aead      AES-256-GCM with caller-supplied IVs
//   oaep      RSA-OAEP (SHA-256 / MGF1-SHA-1)
//   asn1      strict DER reader/writer for the wrapped key format
//   authlist  AuthorizationList codec
//   bundle    SecureKeyWrapper / KeyDescription codec
//   csr       PKCS#10 requests for EC keys
//   pubkey    PEM export and fingerprints

pub mod aead;
pub mod asn1;
pub mod authlist;
pub mod bundle;
pub mod csr;
pub mod oaep;
pub mod pubkey;

pub use bundle::{KeyDescription, WrappedKeyBundle, wrap};
pub use csr::build_csr;
pub use pubkey::{fingerprint, public_key_pem};
