// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One pass over every session operation with throwaway keys.

use rand::rngs::OsRng;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use keyward_core::error::{KeywardError, Result};
use keyward_core::types::{AuthorizationList, CsrSubject, KeyFormat};
use keyward_security::{aead, oaep};
use keyward_store::{KeyWrapProtocol, Session};

/// Outcome of one check.
#[derive(Debug, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

/// Throwaway aliases, deleted on drop.
struct Aliases<'a> {
    session: &'a Session,
    prefix: String,
}

impl<'a> Aliases<'a> {
    fn new(session: &'a Session) -> Self {
        Self {
            session,
            prefix: format!("__keyward_selftest_{}_", Uuid::new_v4().simple()),
        }
    }

    fn get(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }
}

impl Drop for Aliases<'_> {
    fn drop(&mut self) {
        for name in ["aes", "ec", "rsa", "imported"] {
            if let Err(e) = self.session.delete_key(&self.get(name)) {
                warn!(alias = %self.get(name), error = %e, "self-test cleanup failed");
            }
        }
    }
}

pub fn run(session: &Session) -> Vec<Check> {
    let aliases = Aliases::new(session);
    let checks: [(&'static str, fn(&Session, &Aliases<'_>) -> Result<String>); 4] = [
        ("symmetric", symmetric),
        ("ec", elliptic),
        ("rsa", rsa_keys),
        ("wrapped-import", wrapped_import),
    ];

    checks
        .into_iter()
        .map(|(name, check)| {
            let (passed, detail) = match check(session, &aliases) {
                Ok(detail) => (true, detail),
                Err(e) => (false, e.to_string()),
            };
            info!(check = name, passed, "self-test");
            Check { name, passed, detail }
        })
        .collect()
}

fn symmetric(session: &Session, aliases: &Aliases<'_>) -> Result<String> {
    let alias = aliases.get("aes");
    session.generate_symmetric_key(&alias, false, true)?;

    let iv = [0u8; 12];
    let sealed = session.encrypt(&alias, b"hello", &iv, None)?;
    let (ciphertext, tag) = aead::split_tag(&sealed)?;
    if session.decrypt(&alias, ciphertext, tag, &iv, None)? != b"hello" {
        return Err(KeywardError::DecryptionFailed("round trip mismatch".into()));
    }

    let mut tampered = tag.to_vec();
    tampered[0] = tampered[0].wrapping_add(1);
    match session.decrypt(&alias, ciphertext, &tampered, &iv, None) {
        Err(KeywardError::DecryptionFailed(_)) => {}
        other => {
            return Err(KeywardError::DecryptionFailed(format!(
                "tampered tag not rejected: {other:?}"
            )));
        }
    }
    let tier = session.store().get(&alias)?.tier;
    Ok(format!("AES-256-GCM round trip, tier {tier}"))
}

fn elliptic(session: &Session, aliases: &Aliases<'_>) -> Result<String> {
    let alias = aliases.get("ec");
    session.generate_ec_key_pair(&alias, false, true)?;
    session.sign(&alias, b"keyward self-test")?;

    let raw_digest = match session.sign_digest(&alias, &[0x5Au8; 32]) {
        Ok(_) => "raw digest signing",
        Err(KeywardError::OperationUnsupported(_)) => "no raw digest signing",
        Err(e) => return Err(e),
    };

    let subject = CsrSubject {
        common_name: "keyward self-test".into(),
        ..CsrSubject::default()
    };
    session.issue_csr(&alias, &subject)?;
    let fingerprint = session.store().public_key_fingerprint(&alias)?;
    Ok(format!("ECDSA P-256, {raw_digest}, CSR issued, key {fingerprint}"))
}

fn rsa_keys(session: &Session, aliases: &Aliases<'_>) -> Result<String> {
    let alias = aliases.get("rsa");
    session.generate_rsa_key_pair(&alias, None, false, true)?;

    let public = oaep::public_key_from_pem(&session.export_public_key(&alias)?)?;
    let ciphertext = oaep::encrypt(&public, b"transport", None, &mut OsRng)?;
    if session.decrypt_rsa(&alias, &ciphertext, None)? != b"transport" {
        return Err(KeywardError::DecryptionFailed("RSA-OAEP round trip mismatch".into()));
    }
    session.sign(&alias, b"keyward self-test")?;
    Ok("RSA-OAEP and PKCS#1 signing".into())
}

fn wrapped_import(session: &Session, aliases: &Aliases<'_>) -> Result<String> {
    let wrapping = aliases.get("rsa");
    let imported = aliases.get("imported");
    if !session.store().contains(&wrapping)? {
        session.generate_rsa_key_pair(&wrapping, None, false, true)?;
    }

    let material = [0x42u8; 32];
    let bundle = KeyWrapProtocol::new(session.store()).wrap_for_alias(
        &wrapping,
        &material,
        KeyFormat::Raw,
        AuthorizationList::aes_gcm_import(256, true),
    )?;
    session.import_wrapped_key(&wrapping, &imported, &bundle.to_der(), true)?;

    let iv = [7u8; 12];
    let sealed = session.encrypt(&imported, b"imported", &iv, None)?;
    if sealed != aead::seal(&material, &iv, b"", b"imported")? {
        return Err(KeywardError::ImportRejected(
            "imported key does not match the wrapped material".into(),
        ));
    }
    Ok(format!("{} byte bundle imported", bundle.to_der().len()))
}
