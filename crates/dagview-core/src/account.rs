//! Account summary: balance and nonce for one asset, plus the assets the
//! account holds.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::daemon::Daemon;
use crate::error::ExplorerError;
use crate::types::is_hash;

/// Hash of the chain's native asset.
pub const NATIVE_ASSET: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Decimals of the native asset; the node is not asked for them.
pub const NATIVE_DECIMALS: u8 = 8;

/// Balance of one asset at a topoheight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountBalance {
    pub topoheight: u64,
    /// Plain balance in atomic units, `None` when the node only has the
    /// encrypted form.
    pub balance: Option<u64>,
}

#[derive(Deserialize)]
struct RawBalanceVersion {
    #[serde(default)]
    balance: Option<u64>,
}

#[derive(Deserialize)]
struct RawBalance {
    topoheight: u64,
    version: RawBalanceVersion,
}

impl AccountBalance {
    pub fn from_payload(payload: Value) -> Result<Self, ExplorerError> {
        let raw: RawBalance = serde_json::from_value(payload)
            .map_err(|e| ExplorerError::validation(format!("balance: {e}")))?;
        Ok(Self {
            topoheight: raw.topoheight,
            balance: raw.version.balance,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountNonce {
    pub nonce: u64,
    #[serde(default)]
    pub topoheight: u64,
}

/// Asset metadata as registered on the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetData {
    pub decimals: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub topoheight: Option<u64>,
}

impl AssetData {
    pub fn native() -> Self {
        Self {
            decimals: NATIVE_DECIMALS,
            name: Some("XELIS".into()),
            ticker: Some("XEL".into()),
            topoheight: Some(0),
        }
    }
}

/// Everything shown above an account's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub address: String,
    /// Asset the balance refers to.
    pub asset: String,
    pub asset_data: AssetData,
    pub balance: AccountBalance,
    pub nonce: AccountNonce,
    /// Every asset the account has a balance for.
    pub assets: Vec<String>,
}

impl AccountSummary {
    /// Load the summary for `asset` (the native asset when `None`).
    ///
    /// The first failing call fails the whole summary.
    pub async fn load(
        daemon: &Daemon,
        address: &str,
        asset: Option<&str>,
    ) -> Result<Self, ExplorerError> {
        let asset = asset.unwrap_or(NATIVE_ASSET).to_ascii_lowercase();
        if !is_hash(&asset) {
            return Err(ExplorerError::validation(format!(
                "asset `{asset}` is not 64 hex characters"
            )));
        }

        let balance = daemon.get_balance(address, &asset).await?;
        let nonce = daemon.get_nonce(address).await?;
        let assets = daemon.get_account_assets(address).await?;
        let asset_data = if asset == NATIVE_ASSET {
            AssetData::native()
        } else {
            daemon.get_asset(&asset).await?
        };
        tracing::debug!(address, assets = assets.len(), "loaded account summary");

        Ok(Self {
            address: address.to_string(),
            asset,
            asset_data,
            balance,
            nonce,
            assets,
        })
    }
}
