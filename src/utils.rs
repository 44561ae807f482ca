pub(crate) const fn div_ceil(lhs: usize, rhs: usize) -> usize {
    let d = lhs / rhs;
    let r = lhs % rhs;
    if r > 0 && rhs > 0 {
        d + 1
    } else {
        d
    }
}

/// Bytes in one unfiltered row of `width` pixels of `bits_per_pixel` bits.
pub(crate) const fn row_bytes(width: usize, bits_per_pixel: usize) -> usize {
    div_ceil(width * bits_per_pixel, 8)
}
