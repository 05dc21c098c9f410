//! Struct tags.
//!
//! A tag is a flat string of space-separated `key:"value"` pairs; values are
//! double-quoted with Go escape sequences.

use std::fmt;

#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct StructTag(String);

impl StructTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value for `key`, or empty if absent or malformed.
    pub fn get(&self, key: &str) -> String {
        self.lookup(key).unwrap_or_default()
    }

    /// Value for `key`, distinguishing an absent key from an empty value.
    ///
    /// Escapes that decode to invalid UTF-8 (`\xff`) come back as U+FFFD;
    /// `lookup_bytes` keeps the raw bytes.
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.lookup_bytes(key).map(|b| String::from_utf8_lossy(&b).into_owned())
    }

    /// Decoded bytes of the value for `key`.
    pub fn lookup_bytes(&self, key: &str) -> Option<Vec<u8>> {
        let mut tag = self.0.as_bytes();
        while !tag.is_empty() {
            let skip = tag.iter().take_while(|&&c| c == b' ').count();
            tag = &tag[skip..];
            if tag.is_empty() {
                break;
            }

            // Key runs up to the colon; control characters, spaces and quotes end it.
            let name_len = tag.iter().take_while(|&&c| c > b' ' && c != b':' && c != b'"' && c != 0x7f).count();
            if name_len == 0 || name_len + 1 >= tag.len() || tag[name_len] != b':' || tag[name_len + 1] != b'"' {
                break;
            }
            let name = &tag[..name_len];
            tag = &tag[name_len + 1..];

            // Quoted value, honoring backslash escapes.
            let mut i = 1;
            while i < tag.len() && tag[i] != b'"' {
                if tag[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            if i >= tag.len() {
                break;
            }
            let quoted = &tag[..=i];
            tag = &tag[i + 1..];

            if name == key.as_bytes() {
                return unquote(quoted);
            }
        }
        None
    }
}

impl fmt::Debug for StructTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote(&self.0))
    }
}

impl fmt::Display for StructTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hex_digits(s: &[u8], n: usize) -> Option<u32> {
    let digits = s.get(..n)?;
    let text = std::str::from_utf8(digits).ok()?;
    u32::from_str_radix(text, 16).ok()
}

/// Decode a double-quoted literal into its bytes.
pub(crate) fn unquote(quoted: &[u8]) -> Option<Vec<u8>> {
    let inner = quoted.strip_prefix(b"\"")?.strip_suffix(b"\"")?;
    let mut out: Vec<u8> = Vec::with_capacity(inner.len());
    let mut i = 0;
    while i < inner.len() {
        let c = inner[i];
        if c == b'"' || c == b'\n' {
            return None;
        }
        if c != b'\\' {
            out.push(c);
            i += 1;
            continue;
        }
        let esc = *inner.get(i + 1)?;
        i += 2;
        match esc {
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(0x0b),
            b'\\' => out.push(b'\\'),
            b'"' => out.push(b'"'),
            b'x' => {
                out.push(hex_digits(&inner[i..], 2)? as u8);
                i += 2;
            }
            b'u' | b'U' => {
                let n = if esc == b'u' { 4 } else { 8 };
                let ch = char::from_u32(hex_digits(&inner[i..], n)?)?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                i += n;
            }
            b'0'..=b'7' => {
                let digits = inner.get(i - 1..i + 2)?;
                let text = std::str::from_utf8(digits).ok()?;
                let v = u32::from_str_radix(text, 8).ok()?;
                if v > 255 {
                    return None;
                }
                out.push(v as u8);
                i += 2;
            }
            _ => return None,
        }
    }
    Some(out)
}

/// Encode `s` as a double-quoted literal.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            c if (c as u32) < 0x20 || c == '\x7f' => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_basic_pairs() {
        let tag = StructTag::new(r#"json:"name,omitempty" xml:"n" k2:"v\"q""#);
        assert_eq!(tag.get("json"), "name,omitempty");
        assert_eq!(tag.get("xml"), "n");
        assert_eq!(tag.get("k2"), "v\"q");
        assert_eq!(tag.get("missing"), "");
    }

    #[test]
    fn test_lookup_empty_value_vs_absent() {
        let tag = StructTag::new(r#"a:"" b:"x""#);
        assert_eq!(tag.lookup("a"), Some(String::new()));
        assert_eq!(tag.lookup("c"), None);
    }

    #[test]
    fn test_escapes() {
        let tag = StructTag::new(r#"e:"tab\there\x41\u00e9\101\\""#);
        assert_eq!(tag.get("e"), "tab\thereAéA\\");
    }

    #[test]
    fn test_malformed_stops_parsing() {
        assert_eq!(StructTag::new("noquote:x k:\"v\"").get("k"), "");
        assert_eq!(StructTag::new("k:\"unterminated").get("k"), "");
        assert_eq!(StructTag::new("k :\"v\"").get("k"), "");
    }

    #[test]
    fn test_quote_roundtrip() {
        let s = "a\"b\\c\n\x01é";
        assert_eq!(quote(s), "\"a\\\"b\\\\c\\n\\x01é\"");
        assert_eq!(unquote(quote(s).as_bytes()).as_deref(), Some(s.as_bytes()));
    }

    #[test]
    fn test_high_hex_escape_is_present() {
        let tag = StructTag::new(r#"k:"ÿ" o:"Ã©""#);
        assert_eq!(tag.lookup_bytes("k"), Some(vec![0xff]));
        assert_eq!(tag.lookup("k"), Some("\u{FFFD}".to_string()));
        assert_eq!(tag.get("k"), "\u{FFFD}");
        assert_eq!(tag.get("o"), "é");
    }
}
