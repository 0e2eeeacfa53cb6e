//! The MQTT remaining-length varint.
//!
//! Base-128, little-endian, one continuation bit per byte, at most four
//! bytes. The largest encodable value is 268 435 455 (256 MiB − 1).

use super::error::{DecodeError, EncodeError};

/// Largest value the remaining-length encoding can carry.
pub const MAX_REMAINING_LENGTH: u32 = 268_435_455;

/// Maximum encoded width in bytes.
pub const MAX_VARINT_LEN: usize = 4;

/// Outcome of a varint decode attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarintDecode {
    /// The buffer ended on a byte whose continuation flag was set.
    NeedMore,
    /// A complete value was read.
    Done {
        /// Decoded value.
        value: u32,
        /// Number of bytes the encoding occupied.
        consumed: usize,
    },
}

/// A remaining length encoded into its wire form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodedVarint {
    bytes: [u8; MAX_VARINT_LEN],
    len: usize,
}

impl EncodedVarint {
    /// The encoded bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] { &self.bytes[..self.len] }

    /// Width of the encoding in bytes.
    #[must_use]
    pub fn len(&self) -> usize { self.len }

    /// Always `false`: the encoding is at least one byte wide.
    #[must_use]
    pub fn is_empty(&self) -> bool { false }
}

/// Encode `value` as an MQTT remaining length.
///
/// # Errors
///
/// Returns [`EncodeError::ValueTooLarge`] when `value` exceeds
/// [`MAX_REMAINING_LENGTH`].
///
/// # Examples
///
/// ```
/// use tether::codec::varint;
///
/// let encoded = varint::encode(50_000).expect("value in range");
/// assert_eq!(encoded.as_slice(), &[0xD0, 0x86, 0x03]);
/// ```
pub fn encode(value: u32) -> Result<EncodedVarint, EncodeError> {
    if value > MAX_REMAINING_LENGTH {
        return Err(EncodeError::ValueTooLarge {
            value: value as usize,
        });
    }
    let mut bytes = [0u8; MAX_VARINT_LEN];
    let mut remaining = value;
    let mut len = 0;
    loop {
        let mut byte = (remaining & 0x7F) as u8;
        remaining >>= 7;
        if remaining > 0 {
            byte |= 0x80;
        }
        bytes[len] = byte;
        len += 1;
        if remaining == 0 {
            break;
        }
    }
    Ok(EncodedVarint { bytes, len })
}

/// Width in bytes `value` occupies once encoded.
///
/// `value` must already be known to fit the encoding.
#[must_use]
pub fn encoded_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        _ => 4,
    }
}

/// Attempt to decode a remaining length from the front of `buf`.
///
/// # Errors
///
/// Returns [`DecodeError::MalformedVarint`] when the fourth byte still has
/// its continuation flag set.
///
/// # Examples
///
/// ```
/// use tether::codec::varint::{self, VarintDecode};
///
/// assert_eq!(
///     varint::try_decode(&[0xE8, 0x07]).expect("well formed"),
///     VarintDecode::Done { value: 1000, consumed: 2 },
/// );
/// assert_eq!(
///     varint::try_decode(&[0x80]).expect("incomplete is not an error"),
///     VarintDecode::NeedMore,
/// );
/// ```
pub fn try_decode(buf: &[u8]) -> Result<VarintDecode, DecodeError> {
    let mut value: u32 = 0;
    for (index, byte) in buf.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= u32::from(byte & 0x7F) << (7 * index);
        if byte & 0x80 == 0 {
            return Ok(VarintDecode::Done {
                value,
                consumed: index + 1,
            });
        }
        if index + 1 == MAX_VARINT_LEN {
            return Err(DecodeError::MalformedVarint);
        }
    }
    Ok(VarintDecode::NeedMore)
}
