//! Configuration for a settlement instance.
//!
//! Every field is fixed for the lifetime of the instance; there is no key
//! rotation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{AuthorizerId, DomainId, Result, VoucherpayError, constants};

fn default_lock_timeout_ms() -> u64 {
    constants::DEFAULT_LOCK_TIMEOUT_MS
}

/// Construction-time parameters of one settlement instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Public key whose signatures are trusted.
    pub authorizer: AuthorizerId,
    /// This instance's own identity, bound into every signed message.
    pub domain: DomainId,
    /// Upper bound on waiting for the replay-guard lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl SettlementConfig {
    #[must_use]
    pub fn new(authorizer: AuthorizerId, domain: DomainId) -> Self {
        Self {
            authorizer,
            domain,
            lock_timeout_ms: constants::DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations that can never settle anything.
    pub fn validate(&self) -> Result<()> {
        if self.authorizer.0 == [0u8; 32] {
            return Err(VoucherpayError::Configuration(
                "authorizer key must not be all zeroes".into(),
            ));
        }
        if self.domain.0 == [0u8; 32] {
            return Err(VoucherpayError::Configuration(
                "domain must not be all zeroes".into(),
            ));
        }
        if self.lock_timeout_ms == 0 || self.lock_timeout_ms > constants::MAX_LOCK_TIMEOUT_MS {
            return Err(VoucherpayError::Configuration(format!(
                "lock_timeout_ms must be in 1..={}, got {}",
                constants::MAX_LOCK_TIMEOUT_MS,
                self.lock_timeout_ms
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
