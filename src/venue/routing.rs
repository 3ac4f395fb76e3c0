use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ExecutionVenue, PlanRouteRequest, PlannedRoute, SubTxStatus, VenueError};
use crate::wallet::OutboundMessage;

/// HTTP client for the routing venue. Planning is two calls: build the route,
/// then build the transactions implementing it; both are collapsed into one
/// `plan_route`.
pub struct RoutingClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireToken<'a> {
    blockchain: &'a str,
    address: &'a str,
}

#[derive(Debug, Serialize)]
struct BuildRouteBody<'a> {
    input_token: WireToken<'a>,
    output_token: WireToken<'a>,
    input_amount: f64,
    max_length: u8,
}

#[derive(Debug, Deserialize)]
struct BuildRouteReply {
    paths: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct BuildTransactionsBody<'a> {
    sender_address: &'a str,
    slippage: f64,
    paths: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    referral_name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct BuildTransactionsReply {
    route_id: Option<u64>,
    transactions: Option<Vec<WireTransaction>>,
}

/// Untyped venue payload; every field is validated before an
/// `OutboundMessage` is constructed from it.
#[derive(Debug, Deserialize)]
struct WireTransaction {
    address: Option<String>,
    value: Option<String>,
    cell: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RouteResultReply {
    transactions: Option<Vec<WireTransactionResult>>,
}

#[derive(Debug, Deserialize)]
struct WireTransactionResult {
    status: Option<SubTxStatus>,
}

impl RoutingClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("X-Api-Key", key),
            None => builder,
        }
    }

    fn validate(request: &PlanRouteRequest) -> Result<(), VenueError> {
        if request.max_slippage <= 0.0 || request.max_slippage >= 1.0 {
            return Err(VenueError::InvalidParameters(format!(
                "slippage must be in (0, 1), got {}",
                request.max_slippage
            )));
        }
        if !(2..=5).contains(&request.max_length) {
            return Err(VenueError::InvalidParameters(format!(
                "max length must be in [2, 5], got {}",
                request.max_length
            )));
        }
        Ok(())
    }
}

fn into_message(index: usize, wire: WireTransaction) -> Result<OutboundMessage, VenueError> {
    let dest = wire
        .address
        .filter(|a| !a.is_empty())
        .ok_or_else(|| VenueError::Unavailable(format!("transaction {index} has no address")))?;
    let value = wire
        .value
        .as_deref()
        .and_then(|v| v.parse::<u128>().ok())
        .ok_or_else(|| VenueError::Unavailable(format!("transaction {index} has no value")))?;
    let cell = wire
        .cell
        .ok_or_else(|| VenueError::Unavailable(format!("transaction {index} has no cell")))?;
    let payload = BASE64
        .decode(cell.as_bytes())
        .map_err(|e| VenueError::Unavailable(format!("transaction {index} cell: {e}")))?;

    Ok(OutboundMessage {
        dest,
        value,
        payload,
    })
}

#[async_trait]
impl ExecutionVenue for RoutingClient {
    async fn plan_route(&self, request: &PlanRouteRequest) -> Result<PlannedRoute, VenueError> {
        Self::validate(request)?;

        debug!(
            offer = %request.offer_address,
            ask = %request.ask_address,
            amount = request.amount,
            "building route"
        );

        let route: BuildRouteReply = self
            .request(self.http.post(format!("{}/route", self.base_url)))
            .json(&BuildRouteBody {
                input_token: WireToken {
                    blockchain: "ton",
                    address: &request.offer_address,
                },
                output_token: WireToken {
                    blockchain: "ton",
                    address: &request.ask_address,
                },
                input_amount: request.amount,
                max_length: request.max_length,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let paths = match route.paths {
            Some(paths) if !paths.is_null() => paths,
            _ => return Err(VenueError::NoPathFound),
        };

        debug!("building route transactions");

        let reply: BuildTransactionsReply = self
            .request(
                self.http
                    .post(format!("{}/route/transactions", self.base_url)),
            )
            .json(&BuildTransactionsBody {
                sender_address: &request.sender,
                slippage: request.max_slippage,
                paths,
                referral_name: request.referral.as_deref(),
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let route_id = reply
            .route_id
            .ok_or_else(|| VenueError::Unavailable("no route id in reply".to_string()))?;
        let wire_transactions = reply
            .transactions
            .filter(|t| !t.is_empty())
            .ok_or_else(|| VenueError::Unavailable("no transactions in reply".to_string()))?;

        let messages = wire_transactions
            .into_iter()
            .enumerate()
            .map(|(index, wire)| into_message(index, wire))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PlannedRoute { route_id, messages })
    }

    async fn query_status(&self, route_id: u64) -> Result<Vec<SubTxStatus>, VenueError> {
        let reply: RouteResultReply = self
            .request(self.http.get(format!("{}/route/result", self.base_url)))
            .query(&[("route_id", route_id)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(reply
            .transactions
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.status.unwrap_or(SubTxStatus::Unknown))
            .collect())
    }
}
