//! Flux text handling for tasks.
//!
//! InfluxDB stores a task's query with a scheduling block prepended, e.g.
//!
//! ```text
//! option task = { name: "downsample", every: 1h }
//!
//! from(bucket: "raw") |> ...
//! ```
//!
//! Stored state only ever holds the body after that block. Updates splice the
//! remote block back in front of the new body.

use std::ops::Range;

/// Opening of the scheduling block InfluxDB injects.
pub const PREAMBLE_MARKER: &str = "option task = {";

/// Byte range from the start of the preamble marker to just past its matching
/// closing brace. `None` when there is no marker or the block never closes.
///
/// Braces inside double-quoted strings do not count towards nesting.
pub fn preamble_span(flux: &str) -> Option<Range<usize>> {
    let start = flux.find(PREAMBLE_MARKER)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in flux[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start..start + offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

/// Drop everything up to and including the scheduling block and trim the rest.
/// Text without a complete block is returned unchanged.
pub fn strip_preamble(flux: &str) -> String {
    match preamble_span(flux) {
        Some(span) => flux[span.end..].trim().to_string(),
        None => flux.to_string(),
    }
}

/// Replace the body of `remote` with the body of `desired`, keeping the
/// remote scheduling block when there is one.
pub fn splice_preamble(remote: &str, desired: &str) -> String {
    let body = strip_preamble(desired).trim().to_string();
    match preamble_span(remote) {
        Some(span) => format!("{} {}", &remote[..span.end], body),
        None => body,
    }
}

/// Canonical form for comparison: every line trimmed, blank lines removed.
pub fn normalize(flux: &str) -> String {
    flux.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// True when the two texts differ only in blank lines or per-line
/// leading/trailing whitespace.
pub fn equivalent(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}
