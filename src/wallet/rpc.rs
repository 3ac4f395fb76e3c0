use anyhow::{Context as _, Result};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;

use super::ExternalSender;

/// Thin JSON-RPC client for the ledger endpoint; only external message
/// delivery is needed here.
pub struct TonRpcClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl TonRpcClient {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl ExternalSender for TonRpcClient {
    async fn send_external(&self, envelope: &[u8]) -> Result<()> {
        let body = json!({
            "id": 1,
            "jsonrpc": "2.0",
            "method": "sendBoc",
            "params": { "boc": BASE64.encode(envelope) },
        });

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request
            .send()
            .await
            .context("post external message")?
            .error_for_status()
            .context("rpc http status")?;

        let reply: serde_json::Value = response.json().await.context("decode rpc reply")?;
        if reply.get("ok").and_then(|v| v.as_bool()) == Some(false) {
            anyhow::bail!("rpc rejected external message: {reply}");
        }
        Ok(())
    }
}
