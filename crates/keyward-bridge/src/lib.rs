// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// keyward-bridge — Platform secure key store backends.
//
// `SecureKeyBackend` is the one interface the store is written against. The
// Android Keystore backend talks to the platform over JNI; `SoftwareBackend`
// emulates a secure element in process; `StubBackend` stands in on targets
// with neither.

pub mod software;
pub mod traits;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(target_os = "android"))]
pub mod stub;

use std::sync::Arc;

pub use software::{AuthMethod, SoftwareBackend, SoftwareProfile};
pub use traits::SecureKeyBackend;

/// The native backend for the target operating system.
///
/// The returned handle is meant to be passed explicitly to the store; nothing
/// here caches it.
pub fn platform_backend() -> Arc<dyn SecureKeyBackend> {
    #[cfg(target_os = "android")]
    {
        Arc::new(android::AndroidKeystoreBackend::new())
    }
    #[cfg(not(target_os = "android"))]
    {
        Arc::new(stub::StubBackend)
    }
}
