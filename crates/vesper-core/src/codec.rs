//! Versioned binary record serialization.
//!
//! Every durable record shares one envelope: a 4-byte big-endian magic, a
//! 1-byte format version, then a CBOR body. The raw-binary envelope makes
//! version gating an O(1) prefix check; CBOR carries the structured body
//! so field evolution does not need hand-rolled offsets.
//!
//! Wire compatibility is a hard requirement here: archived session states
//! must remain decodable indefinitely, so the version byte is checked on
//! every decode and unknown versions are rejected rather than guessed at.
//!
//! # Invariants
//!
//! - Round-trip: `decode(encode(r)) == r` for every record type.
//! - A decode failure never yields a partially-initialized record.

use serde::{Serialize, de::DeserializeOwned};
use vesper_crypto::bytes::{put_u32_be, read_u32_be};

use crate::error::DecodeError;

/// Record envelope magic: "VESP" in ASCII
pub const MAGIC: u32 = 0x5645_5350;

/// Current record format version
pub const VERSION: u8 = 0x01;

/// Envelope length preceding the CBOR body (magic + version)
pub const ENVELOPE_LEN: usize = 5;

/// Encode a record into the versioned envelope.
pub fn encode_record<T: Serialize>(record: &T) -> Vec<u8> {
    let mut out = Vec::with_capacity(ENVELOPE_LEN + 64);
    out.extend_from_slice(&put_u32_be(MAGIC));
    out.push(VERSION);

    let Ok(()) = ciborium::into_writer(record, &mut out) else {
        unreachable!("CBOR encoding into a Vec cannot fail");
    };

    out
}

/// Decode a record from the versioned envelope.
///
/// # Errors
///
/// - [`DecodeError::Truncated`] if the input is shorter than the envelope
/// - [`DecodeError::BadMagic`] if the magic prefix does not match
/// - [`DecodeError::UnsupportedVersion`] for an unknown format version
/// - [`DecodeError::Body`] if the CBOR body is malformed
pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DecodeError> {
    if bytes.len() < ENVELOPE_LEN {
        return Err(DecodeError::Truncated { expected: ENVELOPE_LEN, actual: bytes.len() });
    }

    let Some(magic) = read_u32_be(bytes) else {
        return Err(DecodeError::Truncated { expected: ENVELOPE_LEN, actual: bytes.len() });
    };
    if magic != MAGIC {
        return Err(DecodeError::BadMagic { got: magic });
    }

    let version = bytes[4];
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    ciborium::from_reader(&bytes[ENVELOPE_LEN..]).map_err(|err| DecodeError::Body(err.to_string()))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: u32,
        payload: Vec<u8>,
    }

    #[test]
    fn round_trip() {
        let sample = Sample { id: 7, payload: vec![1, 2, 3] };
        let wire = encode_record(&sample);
        let parsed: Sample = decode_record(&wire).unwrap();
        assert_eq!(parsed, sample);
    }

    #[test]
    fn envelope_prefix_is_magic_then_version() {
        let wire = encode_record(&Sample { id: 0, payload: vec![] });
        assert_eq!(&wire[..4], &put_u32_be(MAGIC));
        assert_eq!(wire[4], VERSION);
    }

    #[test]
    fn reject_truncated_input() {
        let result: Result<Sample, _> = decode_record(&[0x56, 0x45]);
        assert_eq!(result, Err(DecodeError::Truncated { expected: ENVELOPE_LEN, actual: 2 }));
    }

    #[test]
    fn reject_bad_magic() {
        let mut wire = encode_record(&Sample { id: 0, payload: vec![] });
        wire[0] = 0xFF;
        let result: Result<Sample, _> = decode_record(&wire);
        assert!(matches!(result, Err(DecodeError::BadMagic { .. })));
    }

    #[test]
    fn reject_unknown_version() {
        let mut wire = encode_record(&Sample { id: 0, payload: vec![] });
        wire[4] = 0x7F;
        let result: Result<Sample, _> = decode_record(&wire);
        assert_eq!(result, Err(DecodeError::UnsupportedVersion(0x7F)));
    }

    #[test]
    fn reject_garbage_body() {
        let mut wire = encode_record(&Sample { id: 0, payload: vec![] });
        wire.truncate(ENVELOPE_LEN + 1);
        let result: Result<Sample, _> = decode_record(&wire);
        assert!(matches!(result, Err(DecodeError::Body(_))));
    }
}
