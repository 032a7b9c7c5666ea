//! Settlement configuration.

use crate::domain::{
    SettlementError, SettlementResult, ValidationLimits, DEFAULT_MAX_ADDRESS_LEN,
    DEFAULT_MAX_ROLLAPP_ID_LEN,
};
use serde::{Deserialize, Serialize};
use std::env;

/// Default dispute period: one week of 5s blocks.
pub const DEFAULT_DISPUTE_PERIOD_BLOCKS: u64 = 120_960;

/// Configuration for the settlement core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Blocks a state commitment stays disputable.
    pub dispute_period_blocks: u64,

    /// Maximum rollapp identifier length in bytes.
    pub max_rollapp_id_len: usize,

    /// Maximum counterparty address length in bytes.
    pub max_address_len: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            dispute_period_blocks: DEFAULT_DISPUTE_PERIOD_BLOCKS,
            max_rollapp_id_len: DEFAULT_MAX_ROLLAPP_ID_LEN,
            max_address_len: DEFAULT_MAX_ADDRESS_LEN,
        }
    }
}

impl SettlementConfig {
    /// Short dispute window for tests.
    pub fn for_testing() -> Self {
        Self {
            dispute_period_blocks: 3,
            ..Default::default()
        }
    }

    /// Defaults overridden from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `HUB_DISPUTE_PERIOD_BLOCKS`: dispute period (default: 120960)
    /// - `HUB_MAX_ROLLAPP_ID_LEN`: rollapp id bound (default: 64)
    /// - `HUB_MAX_ADDRESS_LEN`: address bound (default: 256)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            dispute_period_blocks: env_or("HUB_DISPUTE_PERIOD_BLOCKS", defaults.dispute_period_blocks),
            max_rollapp_id_len: env_or("HUB_MAX_ROLLAPP_ID_LEN", defaults.max_rollapp_id_len),
            max_address_len: env_or("HUB_MAX_ADDRESS_LEN", defaults.max_address_len),
        }
    }

    /// Reject settings the core cannot run with.
    pub fn validate(&self) -> SettlementResult<()> {
        if self.dispute_period_blocks == 0 {
            return Err(SettlementError::InvalidArgument(
                "dispute_period_blocks must be > 0".to_string(),
            ));
        }
        if self.max_rollapp_id_len == 0 || self.max_rollapp_id_len > u16::MAX as usize {
            return Err(SettlementError::InvalidArgument(format!(
                "max_rollapp_id_len must be in 1..={}",
                u16::MAX
            )));
        }
        if self.max_address_len == 0 || self.max_address_len > u16::MAX as usize {
            return Err(SettlementError::InvalidArgument(format!(
                "max_address_len must be in 1..={}",
                u16::MAX
            )));
        }
        Ok(())
    }

    /// Input bounds for the components.
    pub fn limits(&self) -> ValidationLimits {
        ValidationLimits {
            max_rollapp_id_len: self.max_rollapp_id_len,
            max_address_len: self.max_address_len,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
