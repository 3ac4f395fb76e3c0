use std::time::{SystemTime, UNIX_EPOCH};

use ed25519_dalek::{Signer as _, SigningKey};
use sha2::{Digest as _, Sha256};
use thiserror::Error;

use super::OutboundMessage;

/// Delivery mode stored in every slot: fees are paid from the account
/// balance, separately from the transferred value.
pub const SEND_MODE_PAY_FEES_SEPARATELY: u8 = 1;

/// Window after which the account rejects the envelope's query id.
pub const QUERY_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("cannot build an envelope from an empty batch")]
    EmptyBatch,
    #[error("batch of {0} messages exceeds the slot index range")]
    BatchTooLarge(usize),
    #[error("message {index} does not fit the binary shape: {reason}")]
    MalformedMessage { index: usize, reason: String },
}

/// Freshness token: high 32 bits hold the expiry timestamp (now + timeout),
/// low 32 bits a random nonce. The account rejects expired ids and repeats
/// within the live window.
pub fn make_query_id() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let nonce: u32 = rand::random();
    ((now + QUERY_TIMEOUT_SECS) << 32) | u64::from(nonce)
}

pub fn query_expiry(query_id: u64) -> u64 {
    query_id >> 32
}

/// A signed batch ready for external submission: 64-byte signature followed
/// by the signed body. Built fresh per submission and never persisted; only
/// the query id outlives the call.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub query_id: u64,
    bytes: Vec<u8>,
}

impl Envelope {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Single source of truth for the signed batch structure. Any change in slot
/// order or mode flag invalidates a previously computed signature, so all
/// serialization lives here.
pub struct EnvelopeBuilder {
    subwallet_id: u32,
    signing_key: SigningKey,
}

impl EnvelopeBuilder {
    pub fn new(subwallet_id: u32, signing_key: SigningKey) -> Self {
        Self {
            subwallet_id,
            signing_key,
        }
    }

    pub fn build(&self, messages: &[OutboundMessage]) -> Result<Envelope, EnvelopeError> {
        self.build_with_query_id(make_query_id(), messages)
    }

    /// Deterministic for a fixed query id; exposed for signature checks.
    pub fn build_with_query_id(
        &self,
        query_id: u64,
        messages: &[OutboundMessage],
    ) -> Result<Envelope, EnvelopeError> {
        if messages.is_empty() {
            return Err(EnvelopeError::EmptyBatch);
        }
        if messages.len() > usize::from(u16::MAX) {
            return Err(EnvelopeError::BatchTooLarge(messages.len()));
        }

        let mut body = Vec::new();
        body.extend_from_slice(&self.subwallet_id.to_be_bytes());
        body.extend_from_slice(&query_id.to_be_bytes());
        body.extend_from_slice(&(messages.len() as u16).to_be_bytes());

        for (index, message) in messages.iter().enumerate() {
            let payload = encode_message(index, message)?;
            body.extend_from_slice(&(index as u16).to_be_bytes());
            body.push(SEND_MODE_PAY_FEES_SEPARATELY);
            body.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            body.extend_from_slice(&payload);
        }

        let digest = Sha256::digest(&body);
        let signature = self.signing_key.sign(&digest);

        let mut bytes = Vec::with_capacity(64 + body.len());
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.extend_from_slice(&body);

        Ok(Envelope { query_id, bytes })
    }
}

/// Opaque slot payload: destination, attached value, operation body.
fn encode_message(index: usize, message: &OutboundMessage) -> Result<Vec<u8>, EnvelopeError> {
    let dest = message.dest.as_bytes();
    if dest.is_empty() {
        return Err(EnvelopeError::MalformedMessage {
            index,
            reason: "empty destination".to_string(),
        });
    }
    if dest.len() > usize::from(u16::MAX) {
        return Err(EnvelopeError::MalformedMessage {
            index,
            reason: format!("destination of {} bytes", dest.len()),
        });
    }
    if message.payload.len() > u32::MAX as usize {
        return Err(EnvelopeError::MalformedMessage {
            index,
            reason: format!("payload of {} bytes", message.payload.len()),
        });
    }

    let mut out = Vec::with_capacity(2 + dest.len() + 16 + 4 + message.payload.len());
    out.extend_from_slice(&(dest.len() as u16).to_be_bytes());
    out.extend_from_slice(dest);
    out.extend_from_slice(&message.value.to_be_bytes());
    out.extend_from_slice(&(message.payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&message.payload);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signature, Verifier as _};

    use super::*;

    fn test_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn message(dest: &str, value: u128, payload: &[u8]) -> OutboundMessage {
        OutboundMessage {
            dest: dest.to_string(),
            value,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn query_ids_are_unique_and_carry_future_expiry() {
        let before = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let a = make_query_id();
        let b = make_query_id();
        assert_ne!(a, b);
        assert!(query_expiry(a) >= before + QUERY_TIMEOUT_SECS);
        assert!(query_expiry(b) >= before + QUERY_TIMEOUT_SECS);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let builder = EnvelopeBuilder::new(1, test_key());
        assert!(matches!(builder.build(&[]), Err(EnvelopeError::EmptyBatch)));
    }

    #[test]
    fn empty_destination_is_rejected() {
        let builder = EnvelopeBuilder::new(1, test_key());
        let err = builder.build(&[message("", 1, b"x")]).unwrap_err();
        assert!(matches!(
            err,
            EnvelopeError::MalformedMessage { index: 0, .. }
        ));
    }

    #[test]
    fn signature_covers_the_body() {
        let key = test_key();
        let verifying = key.verifying_key();
        let builder = EnvelopeBuilder::new(698_983_191, key);

        let envelope = builder
            .build_with_query_id(42 << 32, &[message("EQabc", 100, b"op")])
            .expect("build envelope");

        let bytes = envelope.as_bytes();
        let signature = Signature::from_bytes(bytes[..64].try_into().unwrap());
        let digest = Sha256::digest(&bytes[64..]);
        verifying
            .verify(&digest, &signature)
            .expect("signature verifies over body digest");
    }

    #[test]
    fn slots_preserve_input_order() {
        let builder = EnvelopeBuilder::new(5, test_key());
        let envelope = builder
            .build_with_query_id(
                1 << 32,
                &[message("first", 1, b"aaa"), message("second", 2, b"bbb")],
            )
            .expect("build envelope");

        let body = &envelope.as_bytes()[64..];
        // subwallet (4) + query id (8) + count (2)
        assert_eq!(&body[..4], &5u32.to_be_bytes());
        assert_eq!(&body[4..12], &(1u64 << 32).to_be_bytes());
        assert_eq!(&body[12..14], &2u16.to_be_bytes());

        let first = body.windows(5).position(|w| w == b"first").unwrap();
        let second = body.windows(6).position(|w| w == b"second").unwrap();
        assert!(first < second);

        // slot 0 header: index then the fixed send mode
        assert_eq!(&body[14..16], &0u16.to_be_bytes());
        assert_eq!(body[16], SEND_MODE_PAY_FEES_SEPARATELY);
    }

    #[test]
    fn same_query_id_builds_identical_envelopes() {
        let builder = EnvelopeBuilder::new(9, test_key());
        let batch = [message("dest", 7, b"payload")];
        let a = builder.build_with_query_id(99 << 32, &batch).unwrap();
        let b = builder.build_with_query_id(99 << 32, &batch).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }
}
