//! CBOR framing for envelopes carried over byte-oriented channels.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use ring_relay_core::ForwardEnvelope;

use crate::error::{Result, TransportError};

/// Encode an envelope as a CBOR frame.
pub fn encode_envelope<P: Serialize>(envelope: &ForwardEnvelope<P>) -> Result<Bytes> {
    let mut buf = Vec::new();
    ciborium::into_writer(envelope, &mut buf).map_err(|e| TransportError::Codec(e.to_string()))?;
    Ok(Bytes::from(buf))
}

/// Decode a CBOR frame into an envelope.
pub fn decode_envelope<P: DeserializeOwned>(frame: &[u8]) -> Result<ForwardEnvelope<P>> {
    ciborium::from_reader(frame).map_err(|e| TransportError::Codec(e.to_string()))
}
