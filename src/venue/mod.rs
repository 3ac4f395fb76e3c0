pub mod routing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::wallet::OutboundMessage;

/// Outcome of one step within a route, reported independently by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTxStatus {
    Pending,
    PartiallyComplete,
    Succeeded,
    TimedOut,
    Failed,
    #[serde(other)]
    Unknown,
}

/// An ordered execution plan for one swap, plus the id used to query its
/// outcome later.
#[derive(Debug, Clone)]
pub struct PlannedRoute {
    pub route_id: u64,
    pub messages: Vec<OutboundMessage>,
}

#[derive(Debug, Clone)]
pub struct PlanRouteRequest {
    pub offer_address: String,
    pub ask_address: String,
    /// Amount in whole asset units, as the venue expects it.
    pub amount: f64,
    pub max_slippage: f64,
    pub max_length: u8,
    pub sender: String,
    pub referral: Option<String>,
}

#[derive(Debug, Error)]
pub enum VenueError {
    #[error("venue returned no path for the requested pair")]
    NoPathFound,
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("venue returned no usable data: {0}")]
    Unavailable(String),
    #[error("venue transport failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl VenueError {
    /// Definitive rejections are not worth another attempt; everything else
    /// is assumed transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NoPathFound | Self::InvalidParameters(_))
    }
}

/// The external routing/pricing capability, treated as opaque: plan a
/// slippage-bounded route and query its sub-transaction outcomes.
#[async_trait]
pub trait ExecutionVenue: Send + Sync {
    async fn plan_route(&self, request: &PlanRouteRequest) -> Result<PlannedRoute, VenueError>;
    async fn query_status(&self, route_id: u64) -> Result<Vec<SubTxStatus>, VenueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_status_decodes_known_and_unknown_strings() {
        let parsed: Vec<SubTxStatus> = serde_json::from_str(
            r#"["pending","partially_complete","succeeded","timed_out","failed","whatever"]"#,
        )
        .expect("decode statuses");
        assert_eq!(
            parsed,
            vec![
                SubTxStatus::Pending,
                SubTxStatus::PartiallyComplete,
                SubTxStatus::Succeeded,
                SubTxStatus::TimedOut,
                SubTxStatus::Failed,
                SubTxStatus::Unknown,
            ]
        );
    }
}
