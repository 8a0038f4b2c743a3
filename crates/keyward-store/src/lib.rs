// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Keyward store — capability probing, tiered key lifecycle, symmetric and
// asymmetric operations, secure key import and the host dispatcher, all
// written once against `keyward_bridge::SecureKeyBackend`.

pub mod asymmetric;
pub mod capability;
pub mod dispatch;
pub mod keystore;
pub mod symmetric;
pub mod wrap;

pub use asymmetric::AsymmetricOps;
pub use capability::{Capabilities, CapabilityProbe};
pub use dispatch::{MethodCall, MethodReply, Session};
pub use keystore::KeyStore;
pub use symmetric::SymmetricCipher;
pub use wrap::KeyWrapProtocol;
