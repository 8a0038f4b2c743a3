// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stable numeric error codes for the host method-dispatch layer.
//
// Code ranges:
//   2000xxx  cryptographic operation failures
//   3000xxx  secure environment / platform availability
//   4000xxx  authorization and caller errors
//   5000xxx  key availability

use serde::{Deserialize, Serialize};

use crate::error::KeywardError;

pub const ENCRYPTION_FAILED: u32 = 2_000_000;
pub const CSR_GENERATION_FAILED: u32 = 2_000_010;
pub const DECRYPTION_FAILED: u32 = 2_000_011;
pub const SIGNING_FAILED: u32 = 2_000_012;
pub const KEY_GENERATION_FAILED: u32 = 2_000_013;
pub const IMPORT_REJECTED: u32 = 2_000_016;
pub const KEY_DELETION_FAILED: u32 = 2_000_017;

pub const HARDWARE_UNAVAILABLE: u32 = 3_000_000;
pub const UNSUPPORTED_PLATFORM_VERSION: u32 = 3_000_001;
pub const OPERATION_UNSUPPORTED: u32 = 3_000_002;
pub const BRIDGE_FAILURE: u32 = 3_000_003;

pub const AUTHORIZATION_FAILED: u32 = 4_000_000;
pub const INVALID_ARGUMENT: u32 = 4_000_001;

pub const KEY_NOT_FOUND: u32 = 5_000_001;
pub const KEY_ALREADY_EXISTS: u32 = 5_000_002;

/// What the host should do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    /// Retrying the same call will fail the same way.
    Permanent,
    /// The user must act first (authenticate, free the alias, ...).
    ActionRequired,
}

/// Error payload returned across the dispatch boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub code: u32,
    /// Short, stable description of the failure class.
    pub message: String,
    /// Detail from the underlying error.
    pub detail: String,
    pub disposition: Disposition,
}

/// Map an error to its stable code and short message.
pub fn classify(err: &KeywardError) -> (u32, &'static str, Disposition) {
    use Disposition::*;

    match err {
        KeywardError::EncryptionFailed(_) => (ENCRYPTION_FAILED, "Failed to encrypt the data", Permanent),
        KeywardError::DecryptionFailed(_) => (DECRYPTION_FAILED, "Failed to decrypt the data", Permanent),
        KeywardError::SigningFailed(_) => (SIGNING_FAILED, "Failed to sign the data", Permanent),
        KeywardError::CsrGenerationFailed(_) => {
            (CSR_GENERATION_FAILED, "Failed to generate the certificate signing request", Permanent)
        }
        KeywardError::KeyGenerationFailed(_) => (KEY_GENERATION_FAILED, "Failed to generate the key", Permanent),
        KeywardError::ImportRejected(_) => (IMPORT_REJECTED, "The wrapped key was rejected", Permanent),
        KeywardError::KeyDeletionFailed { .. } => (KEY_DELETION_FAILED, "Failed to delete the key", Permanent),
        KeywardError::HardwareUnavailable(_) => {
            (HARDWARE_UNAVAILABLE, "Secure hardware is not available", Permanent)
        }
        KeywardError::UnsupportedPlatformVersion { .. } => {
            (UNSUPPORTED_PLATFORM_VERSION, "This platform version is not supported", Permanent)
        }
        KeywardError::OperationUnsupported(_) => {
            (OPERATION_UNSUPPORTED, "This operation is not supported on this platform", Permanent)
        }
        KeywardError::Bridge(_) => (BRIDGE_FAILURE, "The platform key store reported an error", Permanent),
        KeywardError::AuthorizationFailed(_) => {
            (AUTHORIZATION_FAILED, "User authentication is required", ActionRequired)
        }
        KeywardError::InvalidArgument(_) | KeywardError::Serialization(_) => {
            (INVALID_ARGUMENT, "Invalid argument", Permanent)
        }
        KeywardError::KeyNotFound(_) => (KEY_NOT_FOUND, "The key does not exist", ActionRequired),
        KeywardError::KeyAlreadyExists(_) => (KEY_ALREADY_EXISTS, "The key alias already exists", ActionRequired),
    }
}

impl From<&KeywardError> for ErrorReply {
    fn from(err: &KeywardError) -> Self {
        let (code, message, disposition) = classify(err);
        Self {
            code,
            message: message.to_string(),
            detail: err.to_string(),
            disposition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_not_found_code() {
        let reply = ErrorReply::from(&KeywardError::KeyNotFound("k1".into()));
        assert_eq!(reply.code, KEY_NOT_FOUND);
        assert!(reply.detail.contains("k1"));
        assert_eq!(reply.disposition, Disposition::ActionRequired);
    }

    #[test]
    fn deletion_failure_is_permanent() {
        let err = KeywardError::KeyDeletionFailed {
            alias: "k1".into(),
            reason: "locked".into(),
        };
        let (code, _, disposition) = classify(&err);
        assert_eq!(code, KEY_DELETION_FAILED);
        assert_eq!(disposition, Disposition::Permanent);
    }

    #[test]
    fn codes_are_distinct() {
        let errors = [
            KeywardError::EncryptionFailed(String::new()),
            KeywardError::DecryptionFailed(String::new()),
            KeywardError::SigningFailed(String::new()),
            KeywardError::CsrGenerationFailed(String::new()),
            KeywardError::KeyGenerationFailed(String::new()),
            KeywardError::ImportRejected(String::new()),
            KeywardError::HardwareUnavailable(String::new()),
            KeywardError::UnsupportedPlatformVersion { found: 1, required: 2 },
            KeywardError::OperationUnsupported(String::new()),
            KeywardError::Bridge(String::new()),
            KeywardError::AuthorizationFailed(String::new()),
            KeywardError::InvalidArgument(String::new()),
            KeywardError::KeyNotFound(String::new()),
            KeywardError::KeyAlreadyExists(String::new()),
        ];
        let mut codes: Vec<u32> = errors.iter().map(|e| classify(e).0).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
