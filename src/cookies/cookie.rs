//! Cookie record, `document.cookie` string parsing, and the encodings it relies on.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc2822;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Characters left untouched by the classic `escape()` encoding.
const ESCAPE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'@')
    .remove(b'*')
    .remove(b'_')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'/');

/// `Tue, 20 Oct 2026 10:00:00 GMT`
const GMT_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Percent-escapes a cookie name or value.
pub fn escape(s: &str) -> String {
    utf8_percent_encode(s, ESCAPE_SET).to_string()
}

/// Reverses [`escape`]. Invalid UTF-8 sequences are replaced.
pub fn unescape(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Formats a timestamp as a GMT cookie date.
pub fn format_http_date(t: OffsetDateTime) -> Result<String, time::error::Format> {
    t.to_offset(UtcOffset::UTC).format(GMT_FORMAT)
}

/// Parses a GMT cookie date. RFC 2822 dates with a numeric offset are accepted as well.
pub fn parse_http_date(s: &str) -> Option<OffsetDateTime> {
    let s = s.trim();
    PrimitiveDateTime::parse(s, GMT_FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .or_else(|_| OffsetDateTime::parse(s, &Rfc2822))
        .ok()
}

/// A cookie as held by the jar.
///
/// Name and value are kept exactly as they appeared in the cookie string (still escaped).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name (case-sensitive).
    pub name: String,

    /// Raw cookie value.
    pub value: String,

    /// Path scoping (e.g., `"/"`).
    pub path: Option<String>,

    /// Domain scoping (host-only if `None`), leading dot stripped.
    pub domain: Option<String>,

    /// Raw `expires` attribute. Session cookies have `None`.
    pub expires: Option<String>,

    /// If `true`, cookie is hidden from `document.cookie`.
    pub http_only: bool,
}

impl Cookie {
    /// Parses a `document.cookie` assignment. Returns `None` when there is no `name=value`
    /// pair in front.
    pub fn parse(cookie_string: &str) -> Option<Cookie> {
        let mut parts = cookie_string.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie {
            name: name.to_string(),
            value: value.trim().to_string(),
            path: None,
            domain: None,
            expires: None,
            http_only: false,
        };

        for part in parts {
            let part = part.trim();
            if let Some((k, v)) = part.split_once('=') {
                let v = v.trim();
                match k.trim().to_ascii_lowercase().as_str() {
                    "path" => cookie.path = Some(v.to_string()),
                    "domain" => cookie.domain = Some(v.trim_start_matches('.').to_string()),
                    "expires" => cookie.expires = Some(v.to_string()),
                    // transport attributes (samesite, max-age, ...) do not affect the jar
                    _ => {}
                }
            } else if part.eq_ignore_ascii_case("httponly") {
                cookie.http_only = true;
            }
        }

        Some(cookie)
    }

    /// Parsed `expires` attribute. Unparsable dates count as no expiry.
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.expires.as_deref().and_then(parse_http_date)
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at().is_some_and(|t| t <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn escape_matches_classic_character_set() {
        assert_eq!(escape("abc-123_./@*+"), "abc-123_./@*+");
        assert_eq!(escape("a b;c=d"), "a%20b%3Bc%3Dd");
        assert_eq!(escape("é"), "%C3%A9");
        assert_eq!(unescape("a%20b%3Bc%3Dd"), "a b;c=d");
        assert_eq!(unescape(&escape("héllo wörld;")), "héllo wörld;");
    }

    #[test]
    fn http_date_format_and_parse() {
        let t = datetime!(2026-10-20 10:00:00 UTC);
        let s = format_http_date(t).unwrap();
        assert_eq!(s, "Tue, 20 Oct 2026 10:00:00 GMT");
        assert_eq!(parse_http_date(&s), Some(t));
        assert_eq!(parse_http_date("Thu, 01 Jan 1970 00:00:00 GMT"), Some(OffsetDateTime::UNIX_EPOCH));
        assert_eq!(parse_http_date("Tue, 20 Oct 2026 12:00:00 +0200"), Some(t));
        assert_eq!(parse_http_date("not a date"), None);
    }

    #[test]
    fn parse_full_assignment() {
        let c = Cookie::parse(
            "sid=abc%20def; expires=Tue, 20 Oct 2026 10:00:00 GMT; path=/app; domain=.example.com; Secure; HttpOnly; SameSite=lax",
        )
        .unwrap();

        assert_eq!(c.name, "sid");
        assert_eq!(c.value, "abc%20def");
        assert_eq!(c.path.as_deref(), Some("/app"));
        assert_eq!(c.domain.as_deref(), Some("example.com"));
        assert_eq!(c.expires.as_deref(), Some("Tue, 20 Oct 2026 10:00:00 GMT"));
        assert!(c.http_only);
        assert_eq!(c.expires_at(), Some(datetime!(2026-10-20 10:00:00 UTC)));
    }

    #[test]
    fn parse_rejects_missing_pair() {
        assert!(Cookie::parse("novalue").is_none());
        assert!(Cookie::parse("=value").is_none());
        assert!(Cookie::parse("").is_none());
        assert_eq!(Cookie::parse("empty=").unwrap().value, "");
    }

    #[test]
    fn expiry_checks() {
        let past = Cookie::parse("a=1;expires=Thu, 01 Jan 1970 00:00:00 GMT").unwrap();
        let session = Cookie::parse("a=1").unwrap();
        let garbage = Cookie::parse("a=1;expires=someday").unwrap();
        let now = datetime!(2026-10-19 00:00:00 UTC);

        assert!(past.is_expired_at(now));
        assert!(!session.is_expired_at(now));
        assert!(!garbage.is_expired_at(now));
    }
}
