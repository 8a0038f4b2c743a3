// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Keyward.

use thiserror::Error;

/// Top-level error type for all Keyward operations.
///
/// Every backend and every store operation reports failures through this
/// enum so that the host dispatcher can map them to stable error codes
/// (see [`crate::error_codes`]).
#[derive(Debug, Error)]
pub enum KeywardError {
    // -- Secure environment --
    #[error("secure hardware unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("unsupported platform version {found} (requires {required})")]
    UnsupportedPlatformVersion { found: u32, required: u32 },

    // -- Key availability --
    #[error("key alias already exists: {0}")]
    KeyAlreadyExists(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("key deletion failed for {alias}: {reason}")]
    KeyDeletionFailed { alias: String, reason: String },

    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    // -- Policy --
    #[error("authorization failed: {0}")]
    AuthorizationFailed(String),

    // -- Crypto --
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("wrapped key import rejected: {0}")]
    ImportRejected(String),

    #[error("CSR generation failed: {0}")]
    CsrGenerationFailed(String),

    // -- Caller / platform --
    #[error("operation not supported by this backend: {0}")]
    OperationUnsupported(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KeywardError {
    /// Whether this error is the tier-specific "hardware not available"
    /// signal raised by a backend when asked for a tier it cannot provide.
    pub fn is_hardware_unavailable(&self) -> bool {
        matches!(self, Self::HardwareUnavailable(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, KeywardError>;
