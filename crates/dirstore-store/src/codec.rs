//! Versioned binary envelope for stored units.
//!
//! Every object and attribute file holds one envelope:
//!
//! ```text
//! [4 bytes: magic "DSO1"]
//! [2 bytes: format version (little-endian u16)]
//! [2 bytes: reserved, zero]
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode)]
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

pub const MAGIC: [u8; 4] = *b"DSO1";

/// Current envelope format version.
pub const VERSION: u16 = 1;

/// Header size: magic + version + reserved + length + CRC.
pub const HEADER_SIZE: usize = 16;

/// Why a unit could not be encoded or decoded.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("serialization failed: {0}")]
    Serialize(String),

    #[error("unit truncated: {len} bytes is shorter than the 16-byte header")]
    Truncated { len: usize },

    #[error("bad magic")]
    BadMagic,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),

    #[error("payload length mismatch: header says {expected}, found {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("CRC mismatch: expected {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("deserialization failed: {0}")]
    Deserialize(String),
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let payload = bincode::serialize(value).map_err(|e| CodecError::Serialize(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| CodecError::Serialize(format!("payload of {} bytes", payload.len())))?;

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&length.to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    if bytes.len() < HEADER_SIZE {
        return Err(CodecError::Truncated { len: bytes.len() });
    }
    let (header, payload) = bytes.split_at(HEADER_SIZE);

    if header[0..4] != MAGIC {
        return Err(CodecError::BadMagic);
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let length = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
    if length != payload.len() {
        return Err(CodecError::LengthMismatch {
            expected: length,
            actual: payload.len(),
        });
    }
    let expected = u32::from_le_bytes([header[12], header[13], header[14], header[15]]);
    let actual = crc32fast::hash(payload);
    if expected != actual {
        return Err(CodecError::ChecksumMismatch { expected, actual });
    }

    bincode::deserialize(payload).map_err(|e| CodecError::Deserialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirstore_types::Attributes;

    fn sample() -> Attributes {
        Attributes::new().with("classname", "Widget").with("size", 3i64)
    }

    #[test]
    fn roundtrip_attributes() {
        let bytes = encode(&sample()).unwrap();
        assert_eq!(&bytes[..4], b"DSO1");
        let decoded: Attributes = decode(&bytes).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn corrupted_payload_detected() {
        let mut bytes = encode(&"hello".to_string()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            decode::<String>(&bytes),
            Err(CodecError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn truncated_unit_rejected() {
        let bytes = encode(&"hello".to_string()).unwrap();
        assert_eq!(
            decode::<String>(&bytes[..10]),
            Err(CodecError::Truncated { len: 10 })
        );
        assert!(matches!(
            decode::<String>(&bytes[..bytes.len() - 1]),
            Err(CodecError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn foreign_bytes_rejected() {
        let bytes = b"not an envelope at all".to_vec();
        assert_eq!(decode::<String>(&bytes), Err(CodecError::BadMagic));

        let mut future = encode(&1u64).unwrap();
        future[4] = 9;
        assert_eq!(decode::<u64>(&future), Err(CodecError::UnsupportedVersion(9)));
    }
}
