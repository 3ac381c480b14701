//! Transaction Window
//!
//! The comparable span of a payload buffer: everything after the tag byte.

/// Index of the tag byte.
pub const TAG_INDEX: usize = 0;

/// First byte of the comparison window.
pub const WINDOW_START: usize = TAG_INDEX + 1;

/// Window `[1, len)` of a buffer. Empty for buffers shorter than two bytes.
#[inline]
pub fn window(buf: &[u8]) -> &[u8] {
    buf.get(WINDOW_START..).unwrap_or(&[])
}

/// Buffer offset (not window offset) of the first differing window byte.
pub fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    window(a)
        .iter()
        .zip(window(b))
        .position(|(x, y)| x != y)
        .map(|pos| pos + WINDOW_START)
}
