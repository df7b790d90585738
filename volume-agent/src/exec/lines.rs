//! Line handling for captured backup-exec output.

/// Split raw output into lines, preserving order.
///
/// A `\r` before the `\n` is dropped. A trailing fragment without a
/// terminator is returned as the final line; empty input yields no lines.
pub fn split_lines(output: &[u8]) -> Vec<&[u8]> {
    if output.is_empty() {
        return Vec::new();
    }

    let body = output.strip_suffix(b"\n").unwrap_or(output);

    body.split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .collect()
}

/// Return the last non-empty line of the output, or an empty slice.
///
/// Only meant for diagnostics when no summary could be extracted.
pub fn last_line(output: &[u8]) -> &[u8] {
    split_lines(output)
        .into_iter()
        .rev()
        .find(|line| !line.trim_ascii().is_empty())
        .unwrap_or_default()
}

/// Lossy UTF-8 rendering of [`last_line`] for log and error messages.
pub fn last_line_lossy(output: &[u8]) -> String {
    String::from_utf8_lossy(last_line(output)).into_owned()
}
