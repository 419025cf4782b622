//! Configuration file layout and conversions into runtime types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use claimdrop_types::{AmountLimits, ChainTarget, WatchOptions};

use crate::ConfigError;

/// Complete claimdrop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClaimdropConfig {
    pub relay: RelayConfig,
    /// Networks claims can be sent to.
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Relay endpoint and credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Base URL of the relay, without a trailing path.
    pub url: String,
    /// Bearer token sent with every request.
    pub access_token: String,
    /// Default backend wallet for chains that do not set their own.
    #[serde(default)]
    pub backend_wallet: Option<String>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub contract_address: String,
    #[serde(default)]
    pub backend_wallet: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Explorer link with a `{hash}` placeholder; built-in default when absent.
    #[serde(default)]
    pub explorer_tx_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub max_consecutive_errors: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        let defaults = WatchOptions::default();
        Self {
            interval_ms: defaults.interval.as_millis() as u64,
            timeout_ms: defaults.timeout.as_millis() as u64,
            max_consecutive_errors: defaults.max_consecutive_errors,
        }
    }
}

/// Amount bounds as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub min: String,
    pub max: String,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            min: "1".into(),
            max: "5".into(),
        }
    }
}

impl ClaimdropConfig {
    /// Every configured chain as a claim target.
    ///
    /// Chains without their own backend wallet use the relay default.
    pub fn chain_targets(&self) -> Result<Vec<ChainTarget>, ConfigError> {
        self.chains.iter().map(|chain| self.target(chain)).collect()
    }

    /// Targets for the given chain ids, in the order asked for. An empty
    /// selection means every configured chain.
    pub fn select_targets(&self, chain_ids: &[u64]) -> Result<Vec<ChainTarget>, ConfigError> {
        if chain_ids.is_empty() {
            return self.chain_targets();
        }
        chain_ids
            .iter()
            .map(|id| {
                let chain = self
                    .chains
                    .iter()
                    .find(|c| c.chain_id == *id)
                    .ok_or_else(|| ConfigError::UnknownChain(*id))?;
                self.target(chain)
            })
            .collect()
    }

    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            interval: Duration::from_millis(self.polling.interval_ms),
            timeout: Duration::from_millis(self.polling.timeout_ms),
            max_consecutive_errors: self.polling.max_consecutive_errors,
        }
    }

    pub fn amount_limits(&self) -> Result<AmountLimits, ConfigError> {
        AmountLimits::new(&self.limits.min, &self.limits.max)
            .map_err(|e| ConfigError::ValidationError(format!("limits: {}", e)))
    }

    fn target(&self, chain: &ChainConfig) -> Result<ChainTarget, ConfigError> {
        let wallet = chain
            .backend_wallet
            .as_deref()
            .or(self.relay.backend_wallet.as_deref())
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "chain {} has no backend wallet and relay.backend_wallet is not set",
                    chain.chain_id
                ))
            })?;
        let mut target = ChainTarget::new(chain.chain_id, &chain.contract_address, wallet);
        target.name = chain.name.clone();
        if chain.explorer_tx_template.is_some() {
            target.explorer_tx_template = chain.explorer_tx_template.clone();
        }
        Ok(target)
    }
}
