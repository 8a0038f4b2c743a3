// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hardware capability detection.
//
// A tier is "available" when the backend agrees to create a key at that tier.
// Each probe creates a throwaway EC key under a random alias and removes it
// again on every exit path; the durable store is left as it was found.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use keyward_bridge::SecureKeyBackend;
use keyward_core::config::StoreConfig;
use keyward_core::error::{KeywardError, Result};
use keyward_core::types::{AuthPolicy, AuthorizationList, HardwareTier, KeyGenSpec, KeyKind};

/// What the device offers, resolved once when a store is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub platform_version: u32,
    pub standard_hardware: bool,
    pub high_assurance: bool,
    pub raw_digest_signing: bool,
}

impl Capabilities {
    /// Highest tier a key without other constraints could be given.
    pub fn best_tier(&self) -> HardwareTier {
        if self.high_assurance {
            HardwareTier::HighAssurance
        } else if self.standard_hardware {
            HardwareTier::Standard
        } else {
            HardwareTier::Software
        }
    }
}

// ---------------------------------------------------------------------------
// Probe key cleanup
// ---------------------------------------------------------------------------

/// Fresh alias for a throwaway key.
pub(crate) fn probe_alias(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::new_v4().simple())
}

/// Deletes a throwaway key when dropped.
///
/// Created before the key is generated, so the delete also runs when
/// generation fails half-way or returns an unrelated error.
pub(crate) struct ProbeKeyGuard<'a> {
    backend: &'a dyn SecureKeyBackend,
    alias: String,
}

impl<'a> ProbeKeyGuard<'a> {
    pub(crate) fn new(backend: &'a dyn SecureKeyBackend, alias: String) -> Self {
        Self { backend, alias }
    }

    pub(crate) fn alias(&self) -> &str {
        &self.alias
    }
}

impl Drop for ProbeKeyGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.delete(&self.alias) {
            warn!(alias = %self.alias, error = %e, "failed to remove probe key");
        }
    }
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// Non-destructive tier detection against a backend.
pub struct CapabilityProbe<'a> {
    backend: &'a dyn SecureKeyBackend,
    config: &'a StoreConfig,
}

impl<'a> CapabilityProbe<'a> {
    pub fn new(backend: &'a dyn SecureKeyBackend, config: &'a StoreConfig) -> Self {
        Self { backend, config }
    }

    fn require_min_version(&self) -> Result<u32> {
        let version = self.backend.platform_version();
        if version < self.config.min_platform_version {
            return Err(KeywardError::UnsupportedPlatformVersion {
                found: version,
                required: self.config.min_platform_version,
            });
        }
        Ok(version)
    }

    /// Whether keys can be created in standard secure hardware.
    ///
    /// Fails with `UnsupportedPlatformVersion` below the minimum version.
    #[instrument(skip_all)]
    pub fn is_standard_hardware_available(&self) -> Result<bool> {
        self.require_min_version()?;
        self.probe_tier(HardwareTier::Standard)
    }

    /// Whether keys can be created in high-assurance hardware.
    ///
    /// Versions before high-assurance support report `false` without
    /// touching the store.
    #[instrument(skip_all)]
    pub fn is_high_assurance_hardware_available(&self) -> Result<bool> {
        let version = self.require_min_version()?;
        if version < self.config.high_assurance_platform_version {
            debug!(version, "platform predates high-assurance backing");
            return Ok(false);
        }
        self.probe_tier(HardwareTier::HighAssurance)
    }

    /// Run both probes and collect the result.
    ///
    /// Below the minimum platform version the device is treated as having no
    /// secure hardware; no probe keys are created.
    pub fn probe(&self) -> Result<Capabilities> {
        let platform_version = self.backend.platform_version();
        let raw_digest_signing = self.backend.supports_raw_digest_signing();

        if platform_version < self.config.min_platform_version {
            warn!(
                platform_version,
                required = self.config.min_platform_version,
                "platform below minimum version, assuming no secure hardware"
            );
            return Ok(Capabilities {
                platform_version,
                standard_hardware: false,
                high_assurance: false,
                raw_digest_signing,
            });
        }

        let capabilities = Capabilities {
            platform_version,
            standard_hardware: self.is_standard_hardware_available()?,
            high_assurance: self.is_high_assurance_hardware_available()?,
            raw_digest_signing,
        };
        info!(
            platform = self.backend.platform_name(),
            platform_version,
            standard = capabilities.standard_hardware,
            high_assurance = capabilities.high_assurance,
            "capabilities probed"
        );
        Ok(capabilities)
    }

    fn probe_tier(&self, tier: HardwareTier) -> Result<bool> {
        let guard = ProbeKeyGuard::new(self.backend, probe_alias(&self.config.probe_alias_prefix));
        let spec = KeyGenSpec {
            alias: guard.alias().to_owned(),
            kind: KeyKind::EcP256,
            tier,
            auth_policy: AuthPolicy::None,
            authorizations: AuthorizationList::for_generated(KeyKind::EcP256, false),
        };

        match self.backend.generate(&spec) {
            Ok(_) => {
                debug!(%tier, "tier available");
                Ok(true)
            }
            Err(e) if e.is_hardware_unavailable() => {
                debug!(%tier, reason = %e, "tier unavailable");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
