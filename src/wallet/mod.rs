pub mod envelope;
pub mod rpc;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use thiserror::Error;
use tracing::warn;

use crate::retry::{RetryPolicy, retry_notify};
use envelope::EnvelopeBuilder;

pub const DEFAULT_SUBWALLET_ID: u32 = 698_983_191;

const SEND_ATTEMPTS: u32 = 3;
const SEND_INTERVAL: Duration = Duration::from_secs(1);

/// One outbound account operation: destination, attached value, opaque body
/// produced by the routing venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub dest: String,
    pub value: u128,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Envelope(#[from] envelope::EnvelopeError),
    #[error("batch submission exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Network seam: delivers a signed external envelope to the ledger.
#[async_trait]
pub trait ExternalSender: Send + Sync {
    async fn send_external(&self, envelope: &[u8]) -> Result<()>;
}

/// The capability the orchestrator consumes: submit a batch of operations
/// through the custodial account, get the envelope's query id back.
#[async_trait]
pub trait BatchSubmitter: Send + Sync {
    fn address(&self) -> &str;
    async fn submit_batch(&self, messages: &[OutboundMessage]) -> Result<u64, SubmitError>;
}

/// Owns the account address and signing key for its lifetime; never re-keyed.
pub struct HighloadWallet<S> {
    address: String,
    builder: EnvelopeBuilder,
    sender: S,
    send_retry: RetryPolicy,
}

impl<S: ExternalSender> HighloadWallet<S> {
    pub fn new(address: String, signing_key: SigningKey, subwallet_id: u32, sender: S) -> Self {
        Self {
            address,
            builder: EnvelopeBuilder::new(subwallet_id, signing_key),
            sender,
            send_retry: RetryPolicy::new(SEND_ATTEMPTS, SEND_INTERVAL).verbose(),
        }
    }
}

#[async_trait]
impl<S: ExternalSender> BatchSubmitter for HighloadWallet<S> {
    fn address(&self) -> &str {
        &self.address
    }

    async fn submit_batch(&self, messages: &[OutboundMessage]) -> Result<u64, SubmitError> {
        let envelope = self.builder.build(messages)?;

        let sender = &self.sender;
        let bytes = envelope.as_bytes();
        let outcome = retry_notify(
            &self.send_retry,
            move || sender.send_external(bytes),
            |_| warn!("send messages failed, retrying"),
        )
        .await;

        if !outcome.ok() {
            return Err(SubmitError::Exhausted {
                attempts: self.send_retry.attempts,
            });
        }
        Ok(envelope.query_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::envelope::query_expiry;
    use super::*;

    struct RecordingSender {
        sent: Mutex<Vec<Vec<u8>>>,
        fail_first: Mutex<u32>,
    }

    #[async_trait]
    impl ExternalSender for RecordingSender {
        async fn send_external(&self, envelope: &[u8]) -> Result<()> {
            let mut fail = self.fail_first.lock().expect("mutex poisoned");
            if *fail > 0 {
                *fail -= 1;
                anyhow::bail!("transient send failure");
            }
            self.sent
                .lock()
                .expect("mutex poisoned")
                .push(envelope.to_vec());
            Ok(())
        }
    }

    fn wallet(fail_first: u32) -> HighloadWallet<RecordingSender> {
        let mut wallet = HighloadWallet::new(
            "EQwallet".to_string(),
            SigningKey::from_bytes(&[3u8; 32]),
            DEFAULT_SUBWALLET_ID,
            RecordingSender {
                sent: Mutex::new(Vec::new()),
                fail_first: Mutex::new(fail_first),
            },
        );
        wallet.send_retry = RetryPolicy::new(SEND_ATTEMPTS, Duration::from_millis(5));
        wallet
    }

    fn batch() -> Vec<OutboundMessage> {
        vec![OutboundMessage {
            dest: "EQdest".to_string(),
            value: 1_000,
            payload: b"swap".to_vec(),
        }]
    }

    #[tokio::test]
    async fn submit_returns_fresh_query_id() {
        let wallet = wallet(0);
        let query_id = wallet.submit_batch(&batch()).await.expect("submit");
        assert!(query_expiry(query_id) > 0);
        assert_eq!(wallet.sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn submit_survives_transient_send_failures() {
        let wallet = wallet(2);
        wallet.submit_batch(&batch()).await.expect("submit");
        assert_eq!(wallet.sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn submit_exhausts_into_error() {
        let wallet = wallet(10);
        let err = wallet.submit_batch(&batch()).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Exhausted {
                attempts: SEND_ATTEMPTS
            }
        ));
        assert!(wallet.sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_batch_is_an_envelope_error() {
        let wallet = wallet(0);
        let err = wallet.submit_batch(&[]).await.unwrap_err();
        assert!(matches!(err, SubmitError::Envelope(_)));
    }
}
