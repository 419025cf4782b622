//! Configuration loading for claimdrop.
//!
//! A TOML file is read, `${VAR}` references are replaced from the
//! environment, `CLAIMDROP_*` variables override selected keys, and the
//! result is validated before use.

pub mod types;

use regex::Regex;
use std::collections::HashSet;
use std::env;
use std::path::Path;
use thiserror::Error;

use claimdrop_types::Address;

pub use types::{ChainConfig, ClaimdropConfig, LimitsConfig, PollingConfig, RelayConfig};

pub const DEFAULT_ENV_PREFIX: &str = "CLAIMDROP_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Chain {0} is not configured")]
    UnknownChain(u64),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader {
    file_path: Option<String>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            file_path: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.file_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn load(&self) -> Result<ClaimdropConfig, ConfigError> {
        let file_path = self
            .file_path
            .as_deref()
            .ok_or_else(|| ConfigError::FileNotFound("No configuration file specified".into()))?;
        if !Path::new(file_path).exists() {
            return Err(ConfigError::FileNotFound(file_path.to_string()));
        }

        let content = std::fs::read_to_string(file_path)?;
        let mut config = self.parse(&content)?;
        self.apply_env_overrides(&mut config)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse configuration text after `${VAR}` substitution.
    pub fn parse(&self, content: &str) -> Result<ClaimdropConfig, ConfigError> {
        let substituted = substitute_env_vars(content)?;
        toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(&self, config: &mut ClaimdropConfig) -> Result<(), ConfigError> {
        if let Some(url) = self.env_override("RELAY_URL") {
            config.relay.url = url;
        }
        if let Some(token) = self.env_override("ACCESS_TOKEN") {
            config.relay.access_token = token;
        }
        if let Some(wallet) = self.env_override("BACKEND_WALLET") {
            config.relay.backend_wallet = Some(wallet);
        }
        if let Some(interval) = self.env_override("POLL_INTERVAL_MS") {
            config.polling.interval_ms = interval.trim().parse().map_err(|e| {
                ConfigError::ValidationError(format!("Invalid poll interval: {}", e))
            })?;
        }
        Ok(())
    }

    fn env_override(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", self.env_prefix, key)).ok()
    }
}

/// Replace every `${VAR_NAME}` with the variable's value; unset variables are errors.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ParseError(e.to_string()))?;
    let mut result = content.to_string();

    for cap in re.captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];
        let value =
            env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
        result = result.replace(full_match, &value);
    }

    Ok(result)
}

pub fn validate_config(config: &ClaimdropConfig) -> Result<(), ConfigError> {
    let url = config.relay.url.trim();
    if url.is_empty() {
        return Err(ConfigError::ValidationError("relay.url must be set".into()));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::ValidationError(format!(
            "relay.url must be an http(s) URL, got {}",
            url
        )));
    }
    if config.relay.access_token.trim().is_empty() {
        return Err(ConfigError::ValidationError("relay.access_token must be set".into()));
    }

    if config.chains.is_empty() {
        return Err(ConfigError::ValidationError(
            "At least one chain must be configured".into(),
        ));
    }
    let mut seen = HashSet::new();
    for chain in &config.chains {
        if !seen.insert(chain.chain_id) {
            return Err(ConfigError::ValidationError(format!(
                "chain {} is configured more than once",
                chain.chain_id
            )));
        }
        Address::parse(&chain.contract_address).map_err(|e| {
            ConfigError::ValidationError(format!("chain {} contract_address: {}", chain.chain_id, e))
        })?;
    }
    for target in config.chain_targets()? {
        Address::parse(&target.backend_wallet).map_err(|e| {
            ConfigError::ValidationError(format!("chain {} backend_wallet: {}", target.chain_id, e))
        })?;
    }

    config.amount_limits()?;

    let polling = &config.polling;
    if polling.interval_ms == 0 {
        return Err(ConfigError::ValidationError("polling.interval_ms must be positive".into()));
    }
    if polling.timeout_ms == 0 {
        return Err(ConfigError::ValidationError("polling.timeout_ms must be positive".into()));
    }
    if polling.timeout_ms < polling.interval_ms {
        return Err(ConfigError::ValidationError(
            "polling.timeout_ms must not be shorter than polling.interval_ms".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    const WALLET: &str = "0x1111111111111111111111111111111111111111";

    fn sample() -> String {
        format!(
            r#"
[relay]
url = "https://relay.example.com"
access_token = "${{TEST_CLAIMDROP_TOKEN}}"
backend_wallet = "{WALLET}"

[[chains]]
chain_id = 11155420
contract_address = "0x2222222222222222222222222222222222222222"

[[chains]]
chain_id = 84532
contract_address = "0x3333333333333333333333333333333333333333"
name = "Base testnet"
explorer_tx_template = "https://explorer.example/tx/{{hash}}"

[limits]
min = "0.5"
max = "10"
"#
        )
    }

    fn write(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_substitutes_env_and_applies_defaults() {
        let file = write(&sample());
        temp_env::with_vars(
            [
                ("TEST_CLAIMDROP_TOKEN", Some("secret")),
                ("CLAIMDROP_RELAY_URL", None::<&str>),
                ("CLAIMDROP_ACCESS_TOKEN", None),
                ("CLAIMDROP_BACKEND_WALLET", None),
                ("CLAIMDROP_POLL_INTERVAL_MS", None),
            ],
            || {
                let config = ConfigLoader::new().with_file(file.path()).load().unwrap();
                assert_eq!(config.relay.access_token, "secret");
                assert_eq!(config.watch_options(), claimdrop_types::WatchOptions::default());

                let targets = config.chain_targets().unwrap();
                assert_eq!(targets.len(), 2);
                assert_eq!(targets[0].backend_wallet, WALLET);
                assert_eq!(
                    targets[0].explorer_tx_template.as_deref(),
                    Some("https://optimism-sepolia.blockscout.com/tx/{hash}")
                );
                assert_eq!(targets[1].display_name(), "Base testnet");
                assert_eq!(
                    targets[1].explorer_tx_template.as_deref(),
                    Some("https://explorer.example/tx/{hash}")
                );

                let limits = config.amount_limits().unwrap();
                assert_eq!(limits, claimdrop_types::AmountLimits::new("0.5", "10").unwrap());
            },
        );
    }

    #[test]
    fn test_missing_env_var_is_reported() {
        temp_env::with_var_unset("TEST_CLAIMDROP_TOKEN", || {
            let err = ConfigLoader::new().parse(&sample()).unwrap_err();
            assert!(matches!(err, ConfigError::EnvVarNotFound(ref v) if v == "TEST_CLAIMDROP_TOKEN"));
        });
    }

    #[test]
    fn test_env_overrides_win() {
        let file = write(&sample());
        temp_env::with_vars(
            [
                ("TEST_CLAIMDROP_TOKEN", Some("from-file")),
                ("CLAIMDROP_RELAY_URL", Some("http://localhost:3005")),
                ("CLAIMDROP_ACCESS_TOKEN", Some("from-env")),
                ("CLAIMDROP_BACKEND_WALLET", Some("0x4444444444444444444444444444444444444444")),
                ("CLAIMDROP_POLL_INTERVAL_MS", Some("250")),
            ],
            || {
                let config = ConfigLoader::new().with_file(file.path()).load().unwrap();
                assert_eq!(config.relay.url, "http://localhost:3005");
                assert_eq!(config.relay.access_token, "from-env");
                assert_eq!(config.watch_options().interval, Duration::from_millis(250));
                assert_eq!(
                    config.chain_targets().unwrap()[0].backend_wallet,
                    "0x4444444444444444444444444444444444444444"
                );
            },
        );
    }

    #[test]
    fn test_bad_interval_override_is_rejected() {
        let file = write(&sample());
        temp_env::with_vars(
            [
                ("TEST_CLAIMDROP_TOKEN", Some("t")),
                ("CLAIMDROP_POLL_INTERVAL_MS", Some("soon")),
            ],
            || {
                let err = ConfigLoader::new().with_file(file.path()).load().unwrap_err();
                assert!(matches!(err, ConfigError::ValidationError(_)));
            },
        );
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new().with_file("/nonexistent/claimdrop.toml").load().unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
        let err = ConfigLoader::new().load().unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    fn parsed(content: &str) -> ClaimdropConfig {
        ConfigLoader::new().parse(content).unwrap()
    }

    #[test]
    fn test_validation_rules() {
        let base = format!(
            r#"
[relay]
url = "https://relay.example.com"
access_token = "t"
backend_wallet = "{WALLET}"

[[chains]]
chain_id = 84532
contract_address = "0x3333333333333333333333333333333333333333"
"#
        );
        assert!(validate_config(&parsed(&base)).is_ok());

        let mut config = parsed(&base);
        config.chains.clear();
        assert!(validate_config(&config).is_err());

        let mut config = parsed(&base);
        let dup = config.chains[0].clone();
        config.chains.push(dup);
        assert!(validate_config(&config).is_err());

        let mut config = parsed(&base);
        config.relay.url = "relay.example.com".into();
        assert!(validate_config(&config).is_err());

        let mut config = parsed(&base);
        config.relay.access_token = " ".into();
        assert!(validate_config(&config).is_err());

        let mut config = parsed(&base);
        config.relay.backend_wallet = None;
        assert!(validate_config(&config).is_err());

        let mut config = parsed(&base);
        config.limits = LimitsConfig { min: "5".into(), max: "1".into() };
        assert!(validate_config(&config).is_err());

        let mut config = parsed(&base);
        config.polling.interval_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = parsed(&base);
        config.chains[0].contract_address = "0x33".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_select_targets() {
        let config = temp_env::with_var("TEST_CLAIMDROP_TOKEN", Some("t"), || parsed(&sample()));
        let picked = config.select_targets(&[84532]).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].chain_id, 84532);
        assert_eq!(config.select_targets(&[]).unwrap().len(), 2);
        assert!(matches!(config.select_targets(&[1]), Err(ConfigError::UnknownChain(1))));
    }
}
