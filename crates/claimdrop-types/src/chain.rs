//! Chain targets, display names and block-explorer links.

use serde::{Deserialize, Serialize};

pub const ETHEREUM_CHAIN_ID: u64 = 1;
pub const POLYGON_CHAIN_ID: u64 = 137;
pub const HOLESKY_CHAIN_ID: u64 = 17_000;
pub const BASE_SEPOLIA_CHAIN_ID: u64 = 84_532;
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;
pub const OP_SEPOLIA_CHAIN_ID: u64 = 11_155_420;

/// Placeholder replaced by the transaction hash in explorer templates.
pub const HASH_PLACEHOLDER: &str = "{hash}";

/// One network a claim is sent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTarget {
    pub chain_id: u64,
    /// ERC-20 contract the claim is made against.
    pub contract_address: String,
    /// Relay-managed wallet that signs and pays for the claim.
    pub backend_wallet: String,
    pub name: Option<String>,
    /// e.g. `https://base-sepolia.blockscout.com/tx/{hash}`
    pub explorer_tx_template: Option<String>,
}

impl ChainTarget {
    pub fn new(chain_id: u64, contract_address: &str, backend_wallet: &str) -> Self {
        Self {
            chain_id,
            contract_address: contract_address.to_string(),
            backend_wallet: backend_wallet.to_string(),
            name: None,
            explorer_tx_template: default_explorer_template(chain_id).map(str::to_string),
        }
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| chain_name(self.chain_id))
    }
}

/// Human-readable network name, `Chain <id>` when unknown.
pub fn chain_name(chain_id: u64) -> String {
    let known = match chain_id {
        ETHEREUM_CHAIN_ID => "Ethereum",
        POLYGON_CHAIN_ID => "Polygon",
        HOLESKY_CHAIN_ID => "Holesky",
        BASE_SEPOLIA_CHAIN_ID => "Base Sepolia",
        SEPOLIA_CHAIN_ID => "Sepolia",
        OP_SEPOLIA_CHAIN_ID => "OP Sepolia",
        _ => return format!("Chain {}", chain_id),
    };
    known.to_string()
}

/// Built-in explorer templates for the test networks claims usually target.
pub fn default_explorer_template(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        BASE_SEPOLIA_CHAIN_ID => Some("https://base-sepolia.blockscout.com/tx/{hash}"),
        OP_SEPOLIA_CHAIN_ID => Some("https://optimism-sepolia.blockscout.com/tx/{hash}"),
        SEPOLIA_CHAIN_ID => Some("https://eth-sepolia.blockscout.com/tx/{hash}"),
        _ => None,
    }
}

/// Substitute a transaction hash into an explorer template.
///
/// Templates without the placeholder are treated as a base URL and get the
/// hash appended as the last path segment.
pub fn explorer_url(template: &str, tx_hash: &str) -> String {
    if template.contains(HASH_PLACEHOLDER) {
        template.replace(HASH_PLACEHOLDER, tx_hash)
    } else {
        format!("{}/{}", template.trim_end_matches('/'), tx_hash)
    }
}
