#[derive(Clone, Copy)]
enum State<'a> {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    /// `$tag$ ... $tag$`, holding the tag.
    DollarQuoted(&'a str),
}

/// A placeholder found outside quoted text and comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Placeholder<'a> {
    /// `?`
    Positional,
    /// `:name`
    Named(&'a str),
}

/// Which placeholder syntax the scan recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PlaceholderSyntax {
    Positional,
    Named,
}

/// Rebuild `sql`, asking `replace` for each placeholder found in normal text.
/// `replace` returns `None` to keep the placeholder untouched.
pub(super) fn substitute<'a, E>(
    sql: &'a str,
    syntax: PlaceholderSyntax,
    mut replace: impl FnMut(Placeholder<'a>) -> Result<Option<String>, E>,
) -> Result<String, E> {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut state = State::Normal;
    let mut copied = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if at(bytes, idx, b"--") => state = State::LineComment,
                _ if at(bytes, idx, b"/*") => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some(tag) = dollar_tag(sql, idx) {
                        state = State::DollarQuoted(tag);
                        idx += tag.len() + 1;
                    }
                }
                b'?' if syntax == PlaceholderSyntax::Positional => {
                    if let Some(text) = replace(Placeholder::Positional)? {
                        out.push_str(&sql[copied..idx]);
                        out.push_str(&text);
                        copied = idx + 1;
                    }
                }
                b':' if syntax == PlaceholderSyntax::Named
                    && idx.checked_sub(1).and_then(|prev| bytes.get(prev)) != Some(&b':') =>
                {
                    if let Some(end) = scan_name(bytes, idx + 1) {
                        if let Some(text) = replace(Placeholder::Named(&sql[idx + 1..end]))? {
                            out.push_str(&sql[copied..idx]);
                            out.push_str(&text);
                            copied = end;
                        }
                        idx = end - 1;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if at(bytes, idx, b"/*") {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if at(bytes, idx, b"*/") {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(tag) => {
                if b == b'$' && dollar_tag(sql, idx) == Some(tag) {
                    state = State::Normal;
                    idx += tag.len() + 1;
                }
            }
        }
        idx += 1;
    }

    out.push_str(&sql[copied..]);
    Ok(out)
}

fn at(bytes: &[u8], idx: usize, token: &[u8]) -> bool {
    bytes.get(idx..).is_some_and(|rest| rest.starts_with(token))
}

/// Tag of a `$tag$` delimiter starting at `start` (empty for `$$`).
fn dollar_tag(sql: &str, start: usize) -> Option<&str> {
    let rest = sql.get(start + 1..)?;
    let len = rest.find('$')?;
    let tag = &rest[..len];
    tag.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        .then_some(tag)
}

/// End of a `[A-Za-z_][A-Za-z0-9_]*` name starting at `start`.
fn scan_name(bytes: &[u8], start: usize) -> Option<usize> {
    let first = *bytes.get(start)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let mut idx = start + 1;
    while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
        idx += 1;
    }
    Some(idx)
}
