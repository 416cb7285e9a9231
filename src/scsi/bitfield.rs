//! Encoding and decoding of a single bit field inside a big-endian byte buffer.
//!
//! SCSI describes every field of a CDB or parameter list as a run of bits
//! starting at some byte offset, with multi-byte values stored most significant
//! byte first. A field is identified here by a `mask` and a byte `offset`: the
//! mask is written as if the byte run starting at `offset` was a big-endian
//! integer, so `0x1f` at offset 1 is the low five bits of byte 1, and
//! `0xffff` at offset 7 is bytes 7 and 8.

use super::error::{Error, Result};

/// Number of bytes covered by `mask`, i.e. `ceil(bit_length(mask) / 8)`.
pub const fn run_width(mask: u64) -> usize {
    let bits = 64 - mask.leading_zeros() as usize;
    bits.div_ceil(8)
}

/// The per-byte mask of byte `index` (0 being the most significant) inside the
/// byte run described by `mask`.
pub const fn byte_mask(mask: u64, index: usize) -> u8 {
    let width = run_width(mask);
    if index >= width {
        return 0;
    }
    ((mask >> (8 * (width - 1 - index))) & 0xff) as u8
}

fn run(buf: &[u8], mask: u64, offset: usize) -> Result<std::ops::Range<usize>> {
    let end = offset + run_width(mask);
    if end > buf.len() {
        return Err(Error::Truncated {
            what: "bit field",
            need: end,
            have: buf.len(),
        });
    }
    Ok(offset..end)
}

/// Reads the field described by `mask` at `offset`.
///
/// The covered bytes are read as a big-endian integer, shifted right until the
/// lowest set bit of `mask` lands on bit 0, then masked.
pub fn decode_field(buf: &[u8], mask: u64, offset: usize) -> Result<u64> {
    if mask == 0 {
        return Ok(0);
    }
    let range = run(buf, mask, offset)?;
    let raw = buf[range].iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    let shift = mask.trailing_zeros();
    Ok((raw & mask) >> shift)
}

/// Writes `value` into the field described by `mask` at `offset`.
///
/// Bits of `value` wider than the mask are dropped. Only the bits under the
/// mask are replaced, so neighbouring fields in the same byte run survive as
/// long as masks do not overlap; every [`Layout`](super::field::Layout)
/// proves that at compile time.
pub fn encode_field(buf: &mut [u8], mask: u64, offset: usize, value: u64) -> Result<()> {
    if mask == 0 {
        return Ok(());
    }
    let range = run(buf, mask, offset)?;
    let shift = mask.trailing_zeros();
    let shifted = (value & (mask >> shift)) << shift;
    let width = range.len();
    for (i, byte) in buf[range].iter_mut().enumerate() {
        let lane = 8 * (width - 1 - i);
        let keep = !((mask >> lane) as u8);
        *byte = (*byte & keep) | (shifted >> lane) as u8;
    }
    Ok(())
}

/// Whether `value` fits in the field described by `mask`.
pub const fn fits(mask: u64, value: u64) -> bool {
    if mask == 0 {
        return value == 0;
    }
    value & !(mask >> mask.trailing_zeros()) == 0
}

/// Big-endian integer of an arbitrary byte slice (up to 8 bytes).
pub fn be_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// `value` as `len` big-endian bytes, truncating the high bytes.
pub fn be_bytes(value: u64, len: usize) -> Vec<u8> {
    (0..len)
        .rev()
        .map(|i| value.checked_shr(8 * i as u32).unwrap_or(0) as u8)
        .collect()
}
