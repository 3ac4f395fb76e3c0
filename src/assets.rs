use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// 256-bit asset identifier: sha256 of the canonical symbol, stable across
/// the whole asset catalog.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(pub [u8; 32]);

impl AssetId {
    pub fn from_symbol(symbol: &str) -> Self {
        Self(Sha256::digest(symbol.as_bytes()).into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", self.to_hex())
    }
}

impl FromStr for AssetId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| anyhow::anyhow!("decode asset id hex: {e}"))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("asset id must be 32 bytes"))?;
        Ok(Self(bytes))
    }
}

impl Serialize for AssetId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetAddress {
    Native,
    Contract(String),
}

impl AssetAddress {
    /// Address form expected by the routing venue ("native" for the chain's
    /// base asset, the master contract address otherwise).
    pub fn routing_repr(&self) -> &str {
        match self {
            Self::Native => "native",
            Self::Contract(address) => address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub symbol: String,
    pub id: AssetId,
    pub address: AssetAddress,
    /// Indivisible units per whole asset (10^decimals).
    pub scale: u128,
}

impl AssetInfo {
    pub fn new(symbol: &str, address: AssetAddress, decimals: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            id: AssetId::from_symbol(symbol),
            address,
            scale: 10u128.pow(decimals),
        }
    }

    pub fn is_native(&self) -> bool {
        self.address == AssetAddress::Native
    }

    pub fn from_wei(&self, amount: u128) -> f64 {
        amount as f64 / self.scale as f64
    }

    pub fn to_wei(&self, amount: f64) -> u128 {
        (amount * self.scale as f64).round() as u128
    }
}

/// In-memory asset catalog, built once at startup and read-only afterwards.
/// Symbol lookup is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    by_symbol: HashMap<String, AssetInfo>,
    by_id: HashMap<AssetId, AssetInfo>,
}

impl AssetCatalog {
    pub fn new(assets: impl IntoIterator<Item = AssetInfo>) -> Self {
        let mut catalog = Self::default();
        for asset in assets {
            catalog.insert(asset);
        }
        catalog
    }

    pub fn insert(&mut self, asset: AssetInfo) {
        self.by_symbol
            .insert(asset.symbol.to_lowercase(), asset.clone());
        self.by_id.insert(asset.id, asset);
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&AssetInfo> {
        self.by_symbol.get(&symbol.to_lowercase())
    }

    pub fn by_id(&self, id: AssetId) -> Option<&AssetInfo> {
        self.by_id.get(&id)
    }

    pub fn contains_id(&self, id: AssetId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = AssetId> + '_ {
        self.by_id.keys().copied()
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.by_id.values().map(|a| a.symbol.clone()).collect();
        symbols.sort();
        symbols
    }

    /// The six standard mainnet assets the swapper supports.
    pub fn mainnet() -> Self {
        Self::new(standard_mainnet_assets())
    }

    /// Standard assets plus the LP tokens, used by operator tooling.
    pub fn mainnet_extended() -> Self {
        let mut catalog = Self::mainnet();
        for asset in [
            AssetInfo::new(
                "TONUSDT_DEDUST",
                AssetAddress::Contract(
                    "EQA-X_yo3fzzbDbJ_0bzFWKqtRuZFIRa1sJsveZJ1YpViO3r".to_string(),
                ),
                9,
            ),
            AssetInfo::new(
                "TONUSDT_STONFI",
                AssetAddress::Contract(
                    "EQD8TJ8xEWB1SpnRE4d89YO3jl0W0EiBnNS4IBaHaUmdfizE".to_string(),
                ),
                9,
            ),
            AssetInfo::new(
                "TON_STORM",
                AssetAddress::Contract(
                    "EQCNY2AQ3ZDYwJAqx_nzl9i9Xhd_Ex7izKJM6JTxXRnO6n1F".to_string(),
                ),
                9,
            ),
            AssetInfo::new(
                "USDT_STORM",
                AssetAddress::Contract(
                    "EQCup4xxCulCcNwmOocM9HtDYPU8xe0449tQLp6a-5BLEegW".to_string(),
                ),
                9,
            ),
        ] {
            catalog.insert(asset);
        }
        catalog
    }
}

fn standard_mainnet_assets() -> Vec<AssetInfo> {
    vec![
        AssetInfo::new("TON", AssetAddress::Native, 9),
        AssetInfo::new(
            "USDT",
            AssetAddress::Contract("EQCxE6mUtQJKFnGfaROTKOt1lZbDiiX1kCixRv7Nw2Id_sDs".to_string()),
            6,
        ),
        AssetInfo::new(
            "jUSDT",
            AssetAddress::Contract("EQBynBO23ywHy_CgarY9NK9FTz0yDsG82PtcbSTQgGoXwiuA".to_string()),
            6,
        ),
        AssetInfo::new(
            "jUSDC",
            AssetAddress::Contract("EQB-MPwrd1G6WKNkLz_VnV6WqBDd142KMQv-g1O-8QUA3728".to_string()),
            6,
        ),
        AssetInfo::new(
            "tsTON",
            AssetAddress::Contract("EQC98_qAmNEptUtPc7W6xdHh_ZHrBUFpw5Ft_IzNU20QAJav".to_string()),
            9,
        ),
        AssetInfo::new(
            "stTON",
            AssetAddress::Contract("EQDNhy-nxYFgUqzfUzImBEP67JqsyMIcyk2S5_RwNNEYku0k".to_string()),
            9,
        ),
    ]
}
