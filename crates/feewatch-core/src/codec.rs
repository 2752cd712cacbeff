//! ABI-style payload encoding
//!
//! Samples travel between the collector and the decision engine as a single
//! 32-byte big-endian word, the layout of a Solidity `uint256`. Decision
//! reasons are encoded as a dynamic `string`: an offset word, a length word,
//! then the UTF-8 bytes right-padded to a word boundary.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Size of one ABI word in bytes
pub const WORD: usize = 32;

/// Encode an unsigned integer as one ABI word
pub fn encode_uint(value: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(WORD);
    buf.put_bytes(0, WORD - 8);
    buf.put_u64(value);
    buf.freeze()
}

/// Decode one ABI word into a `u64`
///
/// Fails when the payload is not exactly one word or the value needs more
/// than 64 bits.
pub fn decode_uint(payload: &[u8]) -> Result<u64> {
    if payload.len() != WORD {
        return Err(Error::decode(format!(
            "expected a {WORD}-byte word, got {} bytes",
            payload.len()
        )));
    }
    read_u64_word(payload)
}

/// Encode a string as an ABI dynamic `string`
pub fn encode_string(value: &str) -> Bytes {
    let data = value.as_bytes();
    let padded = data.len().div_ceil(WORD) * WORD;

    let mut buf = BytesMut::with_capacity(2 * WORD + padded);
    buf.extend_from_slice(&encode_uint(WORD as u64));
    buf.extend_from_slice(&encode_uint(data.len() as u64));
    buf.extend_from_slice(data);
    buf.put_bytes(0, padded - data.len());
    buf.freeze()
}

/// Decode an ABI dynamic `string`
pub fn decode_string(payload: &[u8]) -> Result<String> {
    let offset = word_at(payload, 0)?;
    let offset = usize::try_from(offset)
        .map_err(|_| Error::decode(format!("string offset {offset} out of range")))?;
    let len = word_at(payload, offset)?;
    let len = usize::try_from(len)
        .map_err(|_| Error::decode(format!("string length {len} out of range")))?;

    let start = offset
        .checked_add(WORD)
        .ok_or_else(|| Error::decode("string offset overflows"))?;
    let end = start
        .checked_add(len)
        .ok_or_else(|| Error::decode("string length overflows"))?;
    let data = payload.get(start..end).ok_or_else(|| {
        Error::decode(format!(
            "string data {start}..{end} exceeds payload of {} bytes",
            payload.len()
        ))
    })?;

    String::from_utf8(data.to_vec()).map_err(|e| Error::decode(format!("invalid UTF-8: {e}")))
}

/// Render bytes as `0x`-prefixed lowercase hex
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse `0x`-prefixed (or bare) hex into bytes
pub fn from_hex(value: &str) -> Result<Bytes> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| Error::decode(format!("invalid hex '{value}': {e}")))
}

fn word_at(payload: &[u8], offset: usize) -> Result<u64> {
    let word = offset
        .checked_add(WORD)
        .and_then(|end| payload.get(offset..end))
        .ok_or_else(|| {
            Error::decode(format!(
                "no word at offset {offset} in payload of {} bytes",
                payload.len()
            ))
        })?;
    read_u64_word(word)
}

fn read_u64_word(word: &[u8]) -> Result<u64> {
    let (high, low) = word.split_at(WORD - 8);
    if high.iter().any(|b| *b != 0) {
        return Err(Error::decode("value does not fit in 64 bits"));
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(low);
    Ok(u64::from_be_bytes(raw))
}
