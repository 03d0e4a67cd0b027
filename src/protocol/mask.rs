//! Payload masking (RFC 6455 section 5.3).
//!
//! Masking is a plain XOR with a repeating 4-byte key, so applying it twice
//! with the same key and the same starting offset restores the input.

/// XOR `data` with `mask`, starting at key index 0.
///
/// # Example
///
/// ```
/// use hybiws::protocol::mask::apply_mask;
///
/// let mut data = b"Hello".to_vec();
/// apply_mask(&mut data, [0x37, 0xfa, 0x21, 0x3d]);
/// assert_eq!(data, [0x7f, 0x9f, 0x4d, 0x51, 0x58]);
/// ```
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    apply_mask_at(data, mask, 0);
}

/// XOR `data` with `mask`, where `data[0]` sits at absolute payload offset
/// `offset`.
///
/// Byte `i` of `data` is combined with `mask[(offset + i) % 4]`. Unmasking a
/// payload piecewise with the running offset yields the same bytes as
/// unmasking it in one go.
#[inline]
pub fn apply_mask_at(data: &mut [u8], mask: [u8; 4], offset: u64) {
    // Rotate once so the inner loop can index from zero.
    let shift = (offset % 4) as usize;
    let key = [
        mask[shift],
        mask[(shift + 1) % 4],
        mask[(shift + 2) % 4],
        mask[(shift + 3) % 4],
    ];

    let mut chunks = data.chunks_exact_mut(4);
    let key_u32 = u32::from_ne_bytes(key);
    for chunk in &mut chunks {
        let val = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(val ^ key_u32).to_ne_bytes());
    }
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= key[i];
    }
}

/// Generate a fresh mask key from the OS random source.
///
/// Falls back to a time-derived key if the random source is unavailable.
#[must_use]
pub fn random_mask() -> [u8; 4] {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        buf
    } else {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x1234_5678);
        nanos.wrapping_mul(0x9E37_79B9).to_le_bytes()
    }
}
