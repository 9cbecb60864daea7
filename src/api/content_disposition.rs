//! Parser for the `Content-Disposition` response header.
//!
//! Accepts `type *( ";" name "=" value )` where a value is a token or a
//! quoted string. The extended `filename*` parameter (RFC 5987) takes
//! precedence over plain `filename`. Anything that does not fit the
//! grammar is rejected as a whole, so callers fall back to
//! [`DEFAULT_FILENAME`] instead of guessing.

use std::sync::LazyLock;

use regex::Regex;

pub const DEFAULT_FILENAME: &str = "audio.mp3";

const TOKEN: &str = r"[!#$%&'*+\-.^_`|~0-9A-Za-z]+";

static TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^\s*({TOKEN})\s*")).expect("valid regex"));

static PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"^;\s*({TOKEN})\s*=\s*("(?:[^"\\]|\\.)*"|{TOKEN})\s*"#
    ))
    .expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    pub disposition: String,
    filename: Option<String>,
    filename_ext: Option<String>,
}

impl ContentDisposition {
    pub fn parse(header: &str) -> Option<Self> {
        let caps = TYPE_RE.captures(header)?;
        let disposition = caps[1].to_ascii_lowercase();
        let mut rest = &header[caps.get(0)?.end()..];

        let mut filename = None;
        let mut filename_ext = None;

        loop {
            let trimmed = rest.trim_start();
            // tolerate a trailing separator
            if trimmed.trim_start_matches(';').trim().is_empty() {
                break;
            }

            let caps = PARAM_RE.captures(trimmed)?;
            let name = caps[1].to_ascii_lowercase();
            let raw = &caps[2];

            match name.as_str() {
                "filename" => filename = Some(unquote(raw)),
                "filename*" => {
                    // quoted ext-values are not allowed
                    if raw.starts_with('"') {
                        return None;
                    }
                    filename_ext = Some(decode_ext_value(raw)?);
                }
                _ => {}
            }

            rest = &trimmed[caps.get(0)?.end()..];
        }

        Some(Self {
            disposition,
            filename: filename.filter(|f| !f.is_empty()),
            filename_ext: filename_ext.filter(|f| !f.is_empty()),
        })
    }

    /// `filename*` if present, else `filename`.
    pub fn filename(&self) -> Option<&str> {
        self.filename_ext
            .as_deref()
            .or(self.filename.as_deref())
    }
}

/// Filename carried by a `Content-Disposition` header, or [`DEFAULT_FILENAME`].
pub fn filename_or_default(header: Option<&str>) -> String {
    header
        .and_then(ContentDisposition::parse)
        .and_then(|cd| cd.filename().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Decodes `charset'language'percent-encoded-value`.
fn decode_ext_value(raw: &str) -> Option<String> {
    let mut parts = raw.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;

    let bytes = percent_decode(encoded)?;
    if charset.eq_ignore_ascii_case("utf-8") {
        String::from_utf8(bytes).ok()
    } else if charset.eq_ignore_ascii_case("iso-8859-1") {
        Some(bytes.into_iter().map(char::from).collect())
    } else {
        None
    }
}

fn percent_decode(encoded: &str) -> Option<Vec<u8>> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_filename() {
        let cd = ContentDisposition::parse(r#"attachment; filename="song.mp3""#).unwrap();
        assert_eq!(cd.disposition, "attachment");
        assert_eq!(cd.filename(), Some("song.mp3"));
    }

    #[test]
    fn test_token_filename() {
        assert_eq!(
            filename_or_default(Some("attachment; filename=3f2a.mp3")),
            "3f2a.mp3"
        );
    }

    #[test]
    fn test_missing_header_defaults() {
        assert_eq!(filename_or_default(None), "audio.mp3");
        assert_eq!(filename_or_default(Some("attachment")), "audio.mp3");
        assert_eq!(filename_or_default(Some(r#"attachment; filename="""#)), "audio.mp3");
    }

    #[test]
    fn test_extended_filename_wins() {
        let header = r#"attachment; filename="rates.mp3"; filename*=UTF-8''%E2%82%AC%20rates.mp3"#;
        assert_eq!(filename_or_default(Some(header)), "€ rates.mp3");

        // order does not matter
        let header = r#"attachment; filename*=UTF-8''caf%C3%A9.mp3; filename="cafe.mp3""#;
        assert_eq!(filename_or_default(Some(header)), "café.mp3");
    }

    #[test]
    fn test_latin1_extended_filename() {
        let header = "attachment; filename*=iso-8859-1'en'%A3%20tune.mp3";
        assert_eq!(filename_or_default(Some(header)), "£ tune.mp3");
    }

    #[test]
    fn test_escaped_quotes() {
        let header = r#"attachment; filename="say \"hi\".mp3""#;
        assert_eq!(filename_or_default(Some(header)), r#"say "hi".mp3"#);
    }

    #[test]
    fn test_semicolon_inside_quotes_and_trailing_separator() {
        let header = r#"attachment; filename="a;b.mp3";"#;
        assert_eq!(filename_or_default(Some(header)), "a;b.mp3");
    }

    #[test]
    fn test_case_insensitive_names() {
        let header = r#"Attachment; FileName="Loud.mp3""#;
        let cd = ContentDisposition::parse(header).unwrap();
        assert_eq!(cd.disposition, "attachment");
        assert_eq!(cd.filename(), Some("Loud.mp3"));
    }

    #[test]
    fn test_malformed_headers_fall_back() {
        // unterminated quote
        assert_eq!(
            filename_or_default(Some(r#"attachment; filename="song.mp3"#)),
            "audio.mp3"
        );
        // bad percent escape
        assert_eq!(
            filename_or_default(Some("attachment; filename*=UTF-8''%ZZ.mp3")),
            "audio.mp3"
        );
        // unsupported charset
        assert_eq!(
            filename_or_default(Some("attachment; filename*=koi8-r''x.mp3")),
            "audio.mp3"
        );
        // missing value
        assert_eq!(filename_or_default(Some("attachment; filename=")), "audio.mp3");
    }
}
