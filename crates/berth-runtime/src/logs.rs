//! Container log stream decoding.
//!
//! Containers started without a TTY have their stdout and stderr
//! multiplexed into one stream. Each frame carries an 8-byte header:
//! the stream type (0 stdin, 1 stdout, 2 stderr), three zero bytes, and a
//! big-endian `u32` payload length. TTY containers produce raw bytes.

const HEADER_LEN: usize = 8;

/// Returns whether `raw` starts with a multiplexed frame header.
#[must_use]
pub fn is_multiplexed(raw: &[u8]) -> bool {
    raw.len() >= HEADER_LEN && raw[0] <= 2 && raw[1..4] == [0, 0, 0]
}

/// Strips frame headers and concatenates payloads in stream order.
///
/// Raw (TTY) input is returned unchanged. A truncated final frame
/// contributes whatever payload bytes are present.
#[must_use]
pub fn demultiplex(raw: &[u8]) -> Vec<u8> {
    if !is_multiplexed(raw) {
        return raw.to_vec();
    }
    let mut out = Vec::with_capacity(raw.len());
    let mut rest = raw;
    while rest.len() >= HEADER_LEN {
        let len = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let body = &rest[HEADER_LEN..];
        let take = len.min(body.len());
        out.extend_from_slice(&body[..take]);
        rest = &body[take..];
    }
    out
}

/// Splits decoded output into non-empty lines.
#[must_use]
pub fn split_lines(decoded: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(decoded)
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
