use std::fmt::Write as _;

/// Double embedded single quotes: `it's` → `it''s`.
#[must_use]
pub fn escape_doubled(text: &str) -> String {
    text.replace('\'', "''")
}

/// Backslash-escape quotes and control characters the way MySQL reads them.
#[must_use]
pub fn escape_backslash(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\u{8}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{1a}' => out.push_str("\\Z"),
            '\'' | '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backslash_escapes_cover_control_characters() {
        assert_eq!(escape_backslash("a\nb"), "a\\nb");
        assert_eq!(escape_backslash("\\'\""), "\\\\\\'\\\"");
        assert_eq!(escape_backslash("\0\u{1a}"), "\\0\\Z");
    }

    #[test]
    fn doubled_quotes() {
        assert_eq!(escape_doubled("'; DROP TABLE x; --"), "''; DROP TABLE x; --");
    }
}
