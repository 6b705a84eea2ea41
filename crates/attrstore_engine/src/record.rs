//! Log record framing for the file engine.
//!
//! ```text
//! | magic (4) | version (2) | type (1) | len (4) | payload (len) | crc32 (4) |
//! ```
//!
//! The checksum covers header and payload. A batch payload is a count
//! followed by its operations:
//!
//! ```text
//! | count u32 | (tag u8 | key_len u32 | key | [value_len u32 | value])* |
//! ```
//!
//! All integers are little-endian.

use crate::engine::{BatchOp, WriteBatch};
use crate::error::{EngineError, EngineResult};

/// Magic bytes identifying a log record.
pub const LOG_MAGIC: [u8; 4] = *b"AKVL";

/// Current log format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;

const TAG_PUT: u8 = 1;
const TAG_DELETE: u8 = 2;

/// Type of log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum RecordType {
    /// An atomically applied write batch.
    Batch = 1,
}

impl RecordType {
    pub(crate) fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Batch),
            _ => None,
        }
    }
}

/// Encodes a batch as one framed record.
pub(crate) fn encode_batch(batch: &WriteBatch) -> EngineResult<Vec<u8>> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&len_u32(batch.len())?.to_le_bytes());

    for op in batch.ops() {
        match op {
            BatchOp::Put { key, value } => {
                payload.push(TAG_PUT);
                put_bytes(&mut payload, key)?;
                put_bytes(&mut payload, value)?;
            }
            BatchOp::Delete { key } => {
                payload.push(TAG_DELETE);
                put_bytes(&mut payload, key)?;
            }
        }
    }

    let mut record = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    record.extend_from_slice(&LOG_MAGIC);
    record.extend_from_slice(&LOG_VERSION.to_le_bytes());
    record.push(RecordType::Batch as u8);
    record.extend_from_slice(&len_u32(payload.len())?.to_le_bytes());
    record.extend_from_slice(&payload);
    let crc = compute_crc32(&record);
    record.extend_from_slice(&crc.to_le_bytes());
    Ok(record)
}

/// Result of parsing one record from a buffer.
#[derive(Debug)]
pub(crate) enum Parsed {
    /// A complete record and the number of bytes it occupied.
    Record(WriteBatch, usize),
    /// The buffer ends in the middle of a record.
    Incomplete,
}

/// Parses the record at the start of `buf`.
///
/// `offset` is only used to label errors.
pub(crate) fn decode_record(buf: &[u8], offset: u64) -> EngineResult<Parsed> {
    if buf.len() < HEADER_SIZE {
        return Ok(Parsed::Incomplete);
    }

    if buf[0..4] != LOG_MAGIC {
        return Err(EngineError::corrupted(offset, "invalid magic"));
    }

    let version = u16::from_le_bytes([buf[4], buf[5]]);
    if version > LOG_VERSION {
        return Err(EngineError::corrupted(
            offset,
            format!("unsupported version {version}"),
        ));
    }

    let type_byte = buf[6];
    let record_type = RecordType::from_byte(type_byte).ok_or_else(|| {
        EngineError::corrupted(offset, format!("unknown record type {type_byte}"))
    })?;

    let len = u32::from_le_bytes([buf[7], buf[8], buf[9], buf[10]]) as usize;
    let total = HEADER_SIZE + len + CRC_SIZE;
    if buf.len() < total {
        return Ok(Parsed::Incomplete);
    }

    let body_end = HEADER_SIZE + len;
    let stored_crc = u32::from_le_bytes([
        buf[body_end],
        buf[body_end + 1],
        buf[body_end + 2],
        buf[body_end + 3],
    ]);
    let actual_crc = compute_crc32(&buf[..body_end]);
    if stored_crc != actual_crc {
        return Err(EngineError::corrupted(
            offset,
            format!("checksum mismatch: expected {stored_crc:08x}, got {actual_crc:08x}"),
        ));
    }

    let batch = match record_type {
        RecordType::Batch => decode_batch(&buf[HEADER_SIZE..body_end], offset)?,
    };
    Ok(Parsed::Record(batch, total))
}

fn decode_batch(payload: &[u8], offset: u64) -> EngineResult<WriteBatch> {
    let mut cursor = 0;

    let read_u32 = |cursor: &mut usize| -> EngineResult<u32> {
        if *cursor + 4 > payload.len() {
            return Err(EngineError::corrupted(offset, "unexpected end of payload"));
        }
        let bytes: [u8; 4] = payload[*cursor..*cursor + 4]
            .try_into()
            .map_err(|_| EngineError::corrupted(offset, "invalid u32"))?;
        *cursor += 4;
        Ok(u32::from_le_bytes(bytes))
    };

    let read_bytes = |cursor: &mut usize| -> EngineResult<Vec<u8>> {
        let len = read_u32(cursor)? as usize;
        if *cursor + len > payload.len() {
            return Err(EngineError::corrupted(offset, "unexpected end of bytes"));
        }
        let bytes = payload[*cursor..*cursor + len].to_vec();
        *cursor += len;
        Ok(bytes)
    };

    let count = read_u32(&mut cursor)?;
    let mut batch = WriteBatch::new();
    for _ in 0..count {
        let tag = *payload
            .get(cursor)
            .ok_or_else(|| EngineError::corrupted(offset, "unexpected end of payload"))?;
        cursor += 1;
        match tag {
            TAG_PUT => {
                let key = read_bytes(&mut cursor)?;
                let value = read_bytes(&mut cursor)?;
                batch.put(key, value);
            }
            TAG_DELETE => {
                let key = read_bytes(&mut cursor)?;
                batch.delete(key);
            }
            other => {
                return Err(EngineError::corrupted(
                    offset,
                    format!("unknown operation tag {other}"),
                ));
            }
        }
    }

    if cursor != payload.len() {
        return Err(EngineError::corrupted(
            offset,
            format!(
                "trailing bytes in batch record: expected {} bytes, got {}",
                cursor,
                payload.len()
            ),
        ));
    }

    Ok(batch)
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> EngineResult<()> {
    buf.extend_from_slice(&len_u32(bytes.len())?.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

fn len_u32(len: usize) -> EngineResult<u32> {
    u32::try_from(len).map_err(|_| {
        EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("length {len} does not fit the log format"),
        ))
    })
}

/// Computes the CRC32 (IEEE) checksum of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch() -> WriteBatch {
        let mut batch = WriteBatch::new();
        batch.put(b"doc\0id".to_vec(), b"value".to_vec());
        batch.delete(b"gone".to_vec());
        batch
    }

    #[test]
    fn batch_record_decodes_to_same_ops() {
        let batch = sample_batch();
        let bytes = encode_batch(&batch).unwrap();

        match decode_record(&bytes, 0).unwrap() {
            Parsed::Record(decoded, used) => {
                assert_eq!(decoded, batch);
                assert_eq!(used, bytes.len());
            }
            Parsed::Incomplete => panic!("record should be complete"),
        }
    }

    #[test]
    fn truncated_record_is_incomplete() {
        let bytes = encode_batch(&sample_batch()).unwrap();
        for cut in [0, 5, HEADER_SIZE, bytes.len() - 1] {
            assert!(matches!(
                decode_record(&bytes[..cut], 0).unwrap(),
                Parsed::Incomplete
            ));
        }
    }

    #[test]
    fn flipped_payload_byte_fails_checksum() {
        let mut bytes = encode_batch(&sample_batch()).unwrap();
        bytes[HEADER_SIZE + 6] ^= 0xFF;

        let err = decode_record(&bytes, 42).unwrap_err();
        assert!(matches!(err, EngineError::Corrupted { offset: 42, .. }));
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut bytes = encode_batch(&sample_batch()).unwrap();
        bytes[0] = b'X';
        assert!(decode_record(&bytes, 0).is_err());
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn crc32_empty() {
        assert_eq!(compute_crc32(b""), 0x0000_0000);
    }
}
