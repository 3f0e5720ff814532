//! Binary encoding/decoding utilities for ID triples and dictionary lengths

use crate::core::TripleId;
use crate::error::{Error, Result};

/// Size of a single encoded triple record in bytes
pub const RECORD_SIZE: usize = 12;

/// Encode an ID triple into a byte buffer
pub fn encode_record(buffer: &mut [u8; RECORD_SIZE], subject: u32, predicate: u32, object: u32) {
    buffer[0..4].copy_from_slice(&subject.to_le_bytes());
    buffer[4..8].copy_from_slice(&predicate.to_le_bytes());
    buffer[8..12].copy_from_slice(&object.to_le_bytes());
}

/// Decode a byte buffer into an ID triple
pub fn decode_record(buffer: &[u8; RECORD_SIZE]) -> TripleId {
    let word = |at: usize| u32::from_le_bytes([buffer[at], buffer[at + 1], buffer[at + 2], buffer[at + 3]]);
    TripleId { subject: word(0), predicate: word(4), object: word(8) }
}

impl TripleId {
    /// Encode this triple to bytes
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buffer = [0u8; RECORD_SIZE];
        encode_record(&mut buffer, self.subject, self.predicate, self.object);
        buffer
    }
}

/// Append `value` to `buf` as an unsigned LEB128 varint.
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode an unsigned LEB128 varint from `buf` at `*pos`, advancing `*pos`.
pub fn decode_varint(buf: &[u8], pos: &mut usize) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = *buf
            .get(*pos)
            .ok_or_else(|| Error::Format("varint: unexpected end of buffer".to_string()))?;
        *pos += 1;

        let payload = u64::from(byte & 0x7F);
        if shift > 63 || (shift == 63 && payload > 1) {
            return Err(Error::Format("varint overflow".to_string()));
        }
        result |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}
