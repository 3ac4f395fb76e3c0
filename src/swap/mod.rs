pub mod eligibility;
pub mod orchestrator;
pub mod reconciler;
pub mod status;
pub mod store;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::assets::{AssetCatalog, AssetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapState {
    Pending,
    Sent,
    Success,
    Partial,
    Canceled,
    Failed,
    Timeout,
}

impl SwapState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }

    /// `Pending` and `Sent` are the only states the services still act on.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Sent)
    }
}

impl fmt::Display for SwapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwapState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "success" => Ok(Self::Success),
            "partial" => Ok(Self::Partial),
            "canceled" => Ok(Self::Canceled),
            "failed" => Ok(Self::Failed),
            "timeout" => Ok(Self::Timeout),
            other => Err(anyhow::anyhow!("unknown swap state: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapTask {
    pub id: i64,
    /// Unix milliseconds; `updated_at` is refreshed on every transition.
    pub created_at: i64,
    pub updated_at: i64,

    pub asset_offer: AssetId,
    pub asset_ask: AssetId,
    /// Amount in the offered asset's indivisible units.
    pub amount: u128,
    /// Optional price data captured at creation; absent means the value
    /// check is skipped.
    pub price_snapshot: Option<Vec<u8>>,

    /// Set together with `query_id`, exactly once, when the task is sent.
    pub route_id: Option<u64>,
    pub query_id: Option<u64>,

    pub state: SwapState,
    pub status_mask: u32,
}

impl SwapTask {
    /// "Swap 3: 12.5 TON --> USDT : state: pending"; falls back to raw ids
    /// for assets missing from the catalog.
    pub fn description(&self, catalog: &AssetCatalog) -> String {
        let offer = catalog.by_id(self.asset_offer);
        let ask = catalog.by_id(self.asset_ask);

        let amount = match offer {
            Some(asset) => format!("{}", asset.from_wei(self.amount)),
            None => self.amount.to_string(),
        };
        let offer_name = offer
            .map(|a| a.symbol.clone())
            .unwrap_or_else(|| self.asset_offer.to_hex());
        let ask_name = ask
            .map(|a| a.symbol.clone())
            .unwrap_or_else(|| self.asset_ask.to_hex());

        format!(
            "Swap {}: {} {} --> {} : state: {}",
            self.id, amount, offer_name, ask_name, self.state
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_string_round_trip() {
        for state in [
            SwapState::Pending,
            SwapState::Sent,
            SwapState::Success,
            SwapState::Partial,
            SwapState::Canceled,
            SwapState::Failed,
            SwapState::Timeout,
        ] {
            assert_eq!(state.as_str().parse::<SwapState>().unwrap(), state);
        }
        assert!("bogus".parse::<SwapState>().is_err());
    }

    #[test]
    fn only_pending_and_sent_are_live() {
        assert!(!SwapState::Pending.is_terminal());
        assert!(!SwapState::Sent.is_terminal());
        for state in [
            SwapState::Success,
            SwapState::Partial,
            SwapState::Canceled,
            SwapState::Failed,
            SwapState::Timeout,
        ] {
            assert!(state.is_terminal(), "{state}");
        }
    }

    #[test]
    fn description_uses_catalog_symbols() {
        let catalog = AssetCatalog::mainnet();
        let task = SwapTask {
            id: 7,
            created_at: 0,
            updated_at: 0,
            asset_offer: AssetId::from_symbol("TON"),
            asset_ask: AssetId::from_symbol("USDT"),
            amount: 2_500_000_000,
            price_snapshot: None,
            route_id: None,
            query_id: None,
            state: SwapState::Pending,
            status_mask: 0,
        };
        assert_eq!(
            task.description(&catalog),
            "Swap 7: 2.5 TON --> USDT : state: pending"
        );
    }
}
