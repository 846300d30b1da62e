//! Little-endian two's-complement helpers for fixed-width value bytes.
//!
//! A counter value of any width is read as a signed little-endian integer.
//! Arithmetic wraps at the value's width, like the fixed-size C integers the
//! probe programs increment.

/// Add `delta` to `bytes` in place, wrapping at `bytes.len() * 8` bits.
pub fn add_signed(bytes: &mut [u8], delta: i64) {
    let ext = if delta < 0 { 0xff } else { 0x00 };
    let d = delta.to_le_bytes();
    let mut carry = 0u16;
    for (i, b) in bytes.iter_mut().enumerate() {
        let addend = d.get(i).copied().unwrap_or(ext);
        let sum = u16::from(*b) + u16::from(addend) + carry;
        *b = (sum & 0xff) as u8;
        carry = sum >> 8;
    }
}

/// Encode `n` into exactly `width` bytes: truncated when narrower than 8,
/// sign-extended when wider.
pub fn encode(n: i64, width: usize) -> Box<[u8]> {
    let ext = if n < 0 { 0xff } else { 0x00 };
    let le = n.to_le_bytes();
    (0..width)
        .map(|i| le.get(i).copied().unwrap_or(ext))
        .collect()
}

/// Decode the low (at most 8) bytes as a sign-extended integer.
pub fn decode(bytes: &[u8]) -> i64 {
    let width = bytes.len().min(8);
    if width == 0 {
        return 0;
    }
    let mut le = [0u8; 8];
    le[..width].copy_from_slice(&bytes[..width]);
    let raw = i64::from_le_bytes(le);
    let shift = 64 - 8 * width as u32;
    (raw << shift) >> shift
}
