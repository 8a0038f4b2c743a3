// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Public key export: PEM armour and SHA-256 fingerprints.

use der::pem::LineEnding;
use der::{Decode, EncodePem};
use keyward_core::error::{KeywardError, Result};
use sha2::{Digest, Sha256};
use spki::SubjectPublicKeyInfoOwned;

/// Lowercase hex SHA-256 of a DER SubjectPublicKeyInfo.
pub fn fingerprint(spki_der: &[u8]) -> String {
    hex::encode(Sha256::digest(spki_der))
}

/// Wrap a DER SubjectPublicKeyInfo in a `PUBLIC KEY` PEM block.
///
/// The DER is parsed first so that garbage from a backend is reported
/// rather than armoured.
pub fn public_key_pem(spki_der: &[u8]) -> Result<String> {
    let info = SubjectPublicKeyInfoOwned::from_der(spki_der)
        .map_err(|e| KeywardError::Bridge(format!("backend returned invalid public key: {e}")))?;
    info.to_pem(LineEnding::LF)
        .map_err(|e| KeywardError::Bridge(format!("public key PEM encoding: {e}")))
}
