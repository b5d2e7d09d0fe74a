//! Base58Check payload codec.
//!
//! Hand-rolled base conversion: the payload is treated as one big-endian
//! number and digits are extracted by long division, so no big-integer
//! dependency sits in the hot path. See
//! <https://en.bitcoin.it/wiki/Base58Check_encoding>.

use once_cell::sync::Lazy;
use thiserror::Error;

/// The 58-character alphabet. `0`, `O`, `I` and `l` are excluded.
pub const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Byte length of a decoded address payload: version + hash160 + checksum.
pub const PAYLOAD_LEN: usize = 1 + 20 + 4;

static DIGIT_VALUES: Lazy<[i8; 128]> = Lazy::new(|| {
    let mut table = [-1_i8; 128];
    for (value, &c) in ALPHABET.iter().enumerate() {
        table[c as usize] = value as i8;
    }
    table
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Base58Error {
    #[error("invalid base58 character {0:?}")]
    InvalidCharacter(char),
    #[error("decoded payload is {0} bytes, expected {PAYLOAD_LEN}")]
    LengthMismatch(usize),
}

/// Encodes `data` as base58, most significant digit first.
///
/// Each leading zero byte maps to a leading `1`; at most `data.len() - 1`
/// of them can do so, since the digit stream always holds one digit.
pub fn encode(data: &[u8]) -> String {
    // 138% is a safe upper bound for the base-256 -> base-58 expansion
    let mut digits = vec![0_u8; data.len() * 138 / 100 + 1];
    let mut digits_len = 1_usize;
    for &byte in data {
        let mut carry = byte as u32;
        for digit in digits.iter_mut().take(digits_len) {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits[digits_len] = (carry % 58) as u8;
            digits_len += 1;
            carry /= 58;
        }
    }

    let zeros = data
        .iter()
        .take(data.len().saturating_sub(1))
        .take_while(|&&b| b == 0)
        .count();

    let mut out = String::with_capacity(zeros + digits_len);
    for _ in 0..zeros {
        out.push(ALPHABET[0] as char);
    }
    for i in (0..digits_len).rev() {
        out.push(ALPHABET[digits[i] as usize] as char);
    }
    out
}

/// Decodes a base58 string into the 25-byte address payload.
///
/// Leading `1` characters are counted and restored as zero bytes after the
/// base conversion, which itself strips any leading zeros it produced.
pub fn decode(s: &str) -> Result<[u8; PAYLOAD_LEN], Base58Error> {
    let zeros = s.bytes().take_while(|&b| b == ALPHABET[0]).count();
    let rest = &s[zeros..];

    // 73.3% bounds the base-58 -> base-256 contraction
    let mut buf = vec![0_u8; rest.len() * 733 / 1000 + 1];
    for c in rest.chars() {
        let index = c as usize;
        if index >= 128 || DIGIT_VALUES[index] < 0 {
            return Err(Base58Error::InvalidCharacter(c));
        }
        let mut carry = DIGIT_VALUES[index] as u32;
        for byte in buf.iter_mut().rev() {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        debug_assert_eq!(carry, 0);
    }

    let first = buf.iter().position(|&b| b != 0).unwrap_or(buf.len());
    let len = zeros + buf.len() - first;
    if len != PAYLOAD_LEN {
        return Err(Base58Error::LengthMismatch(len));
    }

    let mut payload = [0_u8; PAYLOAD_LEN];
    payload[zeros..].copy_from_slice(&buf[first..]);
    Ok(payload)
}
