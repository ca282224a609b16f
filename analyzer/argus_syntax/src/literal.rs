//! Literal decoding helpers.
//!
//! `BasicLit` nodes keep their raw source text; the scanner and
//! evaluator decode on demand with these functions. All of them return
//! `None` for malformed input instead of panicking — the caller treats
//! an undecodable literal as an unknown value.

/// Decode a Go integer literal (decimal, `0x`, `0o`, `0b`, with `_`
/// separators). Returns `None` on overflow or malformed text.
pub fn parse_int(text: &str) -> Option<i64> {
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();
    let (digits, radix) = if let Some(rest) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        (rest, 16)
    } else if let Some(rest) = cleaned.strip_prefix("0b").or_else(|| cleaned.strip_prefix("0B")) {
        (rest, 2)
    } else if let Some(rest) = cleaned.strip_prefix("0o").or_else(|| cleaned.strip_prefix("0O")) {
        (rest, 8)
    } else if cleaned.len() > 1 && cleaned.starts_with('0') && cleaned.chars().all(|c| c.is_ascii_digit()) {
        // Legacy octal: 0755
        (&cleaned[1..], 8)
    } else {
        (cleaned.as_str(), 10)
    };
    i64::from_str_radix(digits, radix).ok()
}

/// Decode a Go float literal.
pub fn parse_float(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();
    cleaned.parse().ok()
}

/// Decode an imaginary literal (`2i`, `1.5i`) to its imaginary part.
pub fn parse_imag(text: &str) -> Option<f64> {
    let body = text.strip_suffix('i')?;
    if body.is_empty() {
        return None;
    }
    parse_float(body)
}

/// Decode a rune literal (`'a'`, `'\n'`, `'é'`).
pub fn parse_rune(text: &str) -> Option<char> {
    let body = text.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut chars = body.chars();
    let first = chars.next()?;
    if first != '\\' {
        return if chars.next().is_none() { Some(first) } else { None };
    }
    let decoded = decode_escape(&mut chars, '\'')?;
    if chars.next().is_none() { Some(decoded) } else { None }
}

/// Decode a string literal, either interpreted (`"a\nb"`) or raw
/// (`` `a` ``). Raw strings drop carriage returns, per the Go spec.
pub fn unquote_string(text: &str) -> Option<String> {
    if let Some(body) = text.strip_prefix('`') {
        let body = body.strip_suffix('`')?;
        return Some(body.chars().filter(|&c| c != '\r').collect());
    }
    let body = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        out.push(decode_escape(&mut chars, '"')?);
    }
    Some(out)
}

fn decode_escape(chars: &mut std::str::Chars<'_>, quote: char) -> Option<char> {
    let c = chars.next()?;
    Some(match c {
        'a' => '\u{07}',
        'b' => '\u{08}',
        'f' => '\u{0C}',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\u{0B}',
        '\\' => '\\',
        'x' => return hex_escape(chars, 2),
        'u' => return hex_escape(chars, 4),
        'U' => return hex_escape(chars, 8),
        '0'..='7' => {
            let mut value = c.to_digit(8)?;
            for _ in 0..2 {
                value = value * 8 + chars.next()?.to_digit(8)?;
            }
            return char::from_u32(value);
        }
        c if c == quote => quote,
        _ => return None,
    })
}

fn hex_escape(chars: &mut std::str::Chars<'_>, digits: u32) -> Option<char> {
    let mut value = 0u32;
    for _ in 0..digits {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    char::from_u32(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_int_radixes() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("0x2A"), Some(42));
        assert_eq!(parse_int("0b101010"), Some(42));
        assert_eq!(parse_int("0o52"), Some(42));
        assert_eq!(parse_int("052"), Some(42));
        assert_eq!(parse_int("1_000_000"), Some(1_000_000));
        assert_eq!(parse_int("not"), None);
    }

    #[test]
    fn test_unquote_string() {
        assert_eq!(unquote_string(r#""a\nb""#), Some("a\nb".to_string()));
        assert_eq!(unquote_string(r#""\"q\"""#), Some("\"q\"".to_string()));
        assert_eq!(unquote_string("`raw\\n`"), Some("raw\\n".to_string()));
        assert_eq!(unquote_string(r#""é""#), Some("\u{e9}".to_string()));
    }

    #[test]
    fn test_parse_rune() {
        assert_eq!(parse_rune("'a'"), Some('a'));
        assert_eq!(parse_rune(r"'\n'"), Some('\n'));
        assert_eq!(parse_rune(r"'\''"), Some('\''));
        assert_eq!(parse_rune(r"'\x41'"), Some('A'));
    }

    #[test]
    fn test_parse_imag() {
        assert_eq!(parse_imag("2i"), Some(2.0));
        assert_eq!(parse_imag("1.5i"), Some(1.5));
        assert_eq!(parse_imag("i"), None);
    }
}
