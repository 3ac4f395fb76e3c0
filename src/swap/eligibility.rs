use std::collections::BTreeMap;

use anyhow::Result;
use tracing::warn;

use crate::assets::{AssetId, AssetInfo};
use crate::config::SwapPolicy;

/// Prices captured at task creation: a flat list of 32-byte asset id plus
/// big-endian u64 price records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceSnapshot {
    prices: BTreeMap<AssetId, u64>,
}

const RECORD_LEN: usize = 32 + 8;

impl PriceSnapshot {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % RECORD_LEN != 0 {
            anyhow::bail!(
                "price snapshot length {} is not a multiple of {RECORD_LEN}",
                bytes.len()
            );
        }

        let mut prices = BTreeMap::new();
        for record in bytes.chunks_exact(RECORD_LEN) {
            let id = AssetId(record[..32].try_into().expect("32-byte chunk"));
            let price = u64::from_be_bytes(record[32..].try_into().expect("8-byte chunk"));
            prices.insert(id, price);
        }
        Ok(Self { prices })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.prices.len() * RECORD_LEN);
        for (id, price) in &self.prices {
            out.extend_from_slice(&id.0);
            out.extend_from_slice(&price.to_be_bytes());
        }
        out
    }

    pub fn set(&mut self, id: AssetId, price: u64) {
        self.prices.insert(id, price);
    }

    pub fn get(&self, id: AssetId) -> Option<u64> {
        self.prices.get(&id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    /// No price data at all: the value check is skipped, the swap goes
    /// through, and operators get a warning.
    EligibleUnpriced,
    OfferBanned,
    AskBanned,
    /// The snapshot exists but lacks the offered asset: a known problem with
    /// that particular asset, so stricter than having no snapshot.
    PriceMissing,
    BelowMinimum,
}

impl Eligibility {
    pub fn allows_swap(self) -> bool {
        matches!(self, Self::Eligible | Self::EligibleUnpriced)
    }
}

pub fn check_swap_eligibility(
    policy: &SwapPolicy,
    offer: &AssetInfo,
    amount: u128,
    ask: &AssetInfo,
    prices: Option<&PriceSnapshot>,
) -> Eligibility {
    if policy.is_banned_from(offer.id) {
        warn!(asset = %offer.symbol, "asset is banned from being swapped away");
        return Eligibility::OfferBanned;
    }
    if policy.is_banned_to(ask.id) {
        warn!(asset = %ask.symbol, "asset is banned from being swapped into");
        return Eligibility::AskBanned;
    }

    let Some(prices) = prices.filter(|p| !p.is_empty()) else {
        warn!(
            offer = %offer.symbol,
            ask = %ask.symbol,
            "no price data available, swap value will not be checked"
        );
        return Eligibility::EligibleUnpriced;
    };

    let Some(price) = prices.get(offer.id) else {
        warn!(asset = %offer.symbol, "price snapshot has no entry for the offered asset");
        return Eligibility::PriceMissing;
    };

    let value = match amount.checked_mul(u128::from(price)) {
        Some(product) => product / offer.scale,
        None => u128::MAX,
    };
    if value >= policy.min_swap_value {
        Eligibility::Eligible
    } else {
        warn!(
            asset = %offer.symbol,
            value,
            minimum = policy.min_swap_value,
            "swap value is below the minimum"
        );
        Eligibility::BelowMinimum
    }
}
