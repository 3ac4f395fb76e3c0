use std::time::Duration;

use crate::assets::AssetId;

/// Prices are fixed-point with 9 decimal places.
pub const PRICE_ACCURACY: u128 = 1_000_000_000;

/// Minimum swap value, in price units (== 100$).
pub const MIN_SWAP_VALUE: u128 = 100 * PRICE_ACCURACY;

pub mod slippage {
    pub const PP_10: f64 = 0.10;
    pub const PP_05: f64 = 0.05;
    pub const PP_03: f64 = 0.03;
    pub const PP_02: f64 = 0.02;
    pub const PP_01: f64 = 0.01;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapLimits {
    pub max_length: u8,
    pub max_slippage: f64,
}

/// Which swaps the service accepts and under what route constraints.
#[derive(Debug, Clone)]
pub struct SwapPolicy {
    pub native_id: AssetId,
    pub supported: Vec<AssetId>,
    pub banned_from: Vec<AssetId>,
    pub banned_to: Vec<AssetId>,
    pub min_swap_value: u128,
}

impl SwapPolicy {
    /// Only standard tokens are supported for now; jUSDC is banned in both
    /// directions.
    pub fn mainnet() -> Self {
        let ton = AssetId::from_symbol("TON");
        let jusdc = AssetId::from_symbol("jUSDC");
        Self {
            native_id: ton,
            supported: vec![
                ton,
                AssetId::from_symbol("jUSDC"),
                AssetId::from_symbol("jUSDT"),
                AssetId::from_symbol("stTON"),
                AssetId::from_symbol("tsTON"),
                AssetId::from_symbol("USDT"),
            ],
            banned_from: vec![jusdc],
            banned_to: vec![jusdc],
            min_swap_value: MIN_SWAP_VALUE,
        }
    }

    pub fn is_supported(&self, id: AssetId) -> bool {
        self.supported.contains(&id)
    }

    pub fn is_banned_from(&self, id: AssetId) -> bool {
        self.banned_from.contains(&id)
    }

    pub fn is_banned_to(&self, id: AssetId) -> bool {
        self.banned_to.contains(&id)
    }

    /// Native-inclusive pairs route through at most two hops with a tighter
    /// slippage bound; jetton-to-jetton swaps get one more hop and a looser
    /// bound.
    pub fn swap_limits(&self, offer: AssetId, ask: AssetId) -> SwapLimits {
        let includes_native = offer == self.native_id || ask == self.native_id;
        if includes_native {
            SwapLimits {
                max_length: 2,
                max_slippage: slippage::PP_03,
            }
        } else {
            SwapLimits {
                max_length: 3,
                max_slippage: slippage::PP_05,
            }
        }
    }
}

/// Cadence and batching knobs for the two periodic services.
#[derive(Debug, Clone)]
pub struct ServiceTiming {
    pub swap_interval: Duration,
    pub track_interval: Duration,
    pub inter_task_delay: Duration,
    pub max_swaps_per_cycle: usize,
    pub max_tracks_per_cycle: usize,
    pub shutdown_grace: Duration,
}

impl Default for ServiceTiming {
    fn default() -> Self {
        Self {
            swap_interval: Duration::from_millis(5_000),
            track_interval: Duration::from_millis(5_100),
            inter_task_delay: Duration::from_millis(450),
            max_swaps_per_cycle: 10,
            max_tracks_per_cycle: 10,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}
