//! Hex dump formatting.

use std::fmt::Write;

/// Bytes per dump line.
pub const DEFAULT_LINE_SIZE: usize = 32;

/// Format `data` as `prefix | XX XX ..  | text` lines.
///
/// The last line is padded with `__` cells. Bytes below 33, 255 and anything
/// outside printable ASCII show as `.` in the text column.
pub fn hex_dump(data: &[u8], line_size: usize, prefix: &str) -> String {
    let line_size = line_size.max(1);
    let mut out = String::with_capacity(data.len() * 4 + prefix.len() * 2);

    for line in data.chunks(line_size) {
        out.push_str(prefix);
        out.push_str(" | ");
        for byte in line {
            let _ = write!(out, "{:02X} ", byte);
        }
        for _ in line.len()..line_size {
            out.push_str("__ ");
        }
        out.push_str(" | ");
        out.extend(line.iter().map(|&b| printable(b)));
        out.push('\n');
    }

    out
}

fn printable(b: u8) -> char {
    if b < 33 || b >= 127 {
        '.'
    } else {
        b as char
    }
}
