//! Cookie jar abstraction and a simple in-memory implementation.
//!
//! A **cookie jar** holds the cookies visible to one document. The storage manager only
//! talks to it through `document.cookie`-style strings: [`CookieJar::set_cookie`] for an
//! assignment and [`CookieJar::cookie_string`] for a read.
//!
//! ## Notes & limitations
//! - Cookies are identified by **name** only. Assigning a cookie with an existing name
//!   replaces it, whatever its path or domain ("last write wins").
//! - `Max-Age`, size limits and eviction policies are not implemented.
//! - This module is **not** internally synchronized. Use it via a
//!   [`CookieJarHandle`](crate::cookies::CookieJarHandle).
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::cookies::{Cookie, CookieJarHandle};

/// A cookie jar keeps the cookies of a single document.
pub trait CookieJar: Send + Sync {
    /// Commits a `document.cookie` assignment such as `"a=1; expires=...; path=/"`.
    ///
    /// A cookie whose expiry lies in the past removes any cookie with the same name and is
    /// not stored.
    fn set_cookie(&mut self, cookie_string: &str) -> Result<()>;

    /// Returns the `document.cookie` read value: every live, script-visible cookie as
    /// `name=value`, joined by `"; "`. Empty when there are none.
    fn cookie_string(&self) -> String;

    /// Returns a copy of every live cookie, including attributes.
    fn cookies(&self) -> Vec<Cookie>;

    /// Removes all cookies from the jar.
    fn clear(&mut self);
}

/// Default cookie jar, in-memory only.
///
/// Cookies are kept in assignment order. Expired cookies are hidden on read and dropped on the
/// next assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultCookieJar {
    pub entries: Vec<Cookie>,
}

impl DefaultCookieJar {
    /// Creates an empty in-memory cookie jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the jar into a shareable handle.
    pub fn into_handle(self) -> CookieJarHandle {
        std::sync::Arc::new(std::sync::RwLock::new(self))
    }

    /// Serializes the jar (expired cookies included) to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restores a jar previously produced by [`DefaultCookieJar::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Drops every expired cookie, returning how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = OffsetDateTime::now_utc();
        let before = self.entries.len();
        self.entries.retain(|c| !c.is_expired_at(now));
        before - self.entries.len()
    }

    fn live(&self) -> impl Iterator<Item = &Cookie> {
        let now = OffsetDateTime::now_utc();
        self.entries.iter().filter(move |c| !c.is_expired_at(now))
    }
}

impl CookieJar for DefaultCookieJar {
    fn set_cookie(&mut self, cookie_string: &str) -> Result<()> {
        let cookie = Cookie::parse(cookie_string)
            .ok_or_else(|| anyhow!("malformed cookie string: {cookie_string:?}"))?;

        let purged = self.purge_expired();
        if purged > 0 {
            log::trace!("Purged {} expired cookie(s)", purged);
        }

        if cookie.is_expired_at(OffsetDateTime::now_utc()) {
            self.entries.retain(|c| c.name != cookie.name);
            return Ok(());
        }

        // Replace existing cookie with same name
        if let Some(existing) = self.entries.iter_mut().find(|c| c.name == cookie.name) {
            *existing = cookie;
        } else {
            self.entries.push(cookie);
        }
        Ok(())
    }

    fn cookie_string(&self) -> String {
        self.live()
            .filter(|c| !c.http_only)
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn cookies(&self) -> Vec<Cookie> {
        self.live().cloned().collect()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::format_http_date;
    use time::Duration;

    fn in_days(days: i64) -> String {
        format_http_date(OffsetDateTime::now_utc() + Duration::days(days)).unwrap()
    }

    #[test]
    fn assignments_accumulate_into_cookie_string() {
        let mut jar = DefaultCookieJar::new();
        assert_eq!(jar.cookie_string(), "");

        jar.set_cookie("a=1;path=/").unwrap();
        jar.set_cookie("b=2").unwrap();
        assert_eq!(jar.cookie_string(), "a=1; b=2");
    }

    #[test]
    fn same_name_replaces_in_place() {
        let mut jar = DefaultCookieJar::new();
        jar.set_cookie("a=1").unwrap();
        jar.set_cookie("b=2").unwrap();
        jar.set_cookie("a=3;path=/other").unwrap();

        assert_eq!(jar.cookie_string(), "a=3; b=2");
        assert_eq!(jar.cookies()[0].path.as_deref(), Some("/other"));
    }

    #[test]
    fn past_expiry_deletes() {
        let mut jar = DefaultCookieJar::new();
        jar.set_cookie(&format!("a=1;expires={}", in_days(1))).unwrap();
        jar.set_cookie("b=2").unwrap();
        jar.set_cookie(&format!("a=;expires={}", in_days(-1))).unwrap();

        assert_eq!(jar.cookie_string(), "b=2");
        assert_eq!(jar.entries.len(), 1);
    }

    #[test]
    fn expired_entries_are_hidden_and_purged() {
        let mut jar = DefaultCookieJar::new();
        jar.set_cookie("a=1").unwrap();
        jar.entries.push(Cookie::parse("old=1;expires=Thu, 01 Jan 1970 00:00:00 GMT").unwrap());

        assert_eq!(jar.cookie_string(), "a=1");
        assert_eq!(jar.cookies().len(), 1);
        assert_eq!(jar.purge_expired(), 1);
        assert_eq!(jar.entries.len(), 1);
    }

    #[test]
    fn http_only_is_not_script_visible() {
        let mut jar = DefaultCookieJar::new();
        jar.set_cookie("secret=1; HttpOnly").unwrap();
        jar.set_cookie("open=2").unwrap();
        assert_eq!(jar.cookie_string(), "open=2");
        assert_eq!(jar.cookies().len(), 2);
    }

    #[test]
    fn malformed_assignment_is_rejected() {
        let mut jar = DefaultCookieJar::new();
        assert!(jar.set_cookie("garbage").is_err());
        assert!(jar.entries.is_empty());
    }

    #[test]
    fn clear_and_json_snapshot() {
        let mut jar = DefaultCookieJar::new();
        jar.set_cookie("a=1;path=/x").unwrap();

        let json = jar.to_json().unwrap();
        let restored = DefaultCookieJar::from_json(&json).unwrap();
        assert_eq!(restored.entries, jar.entries);

        jar.clear();
        assert_eq!(jar.cookie_string(), "");
    }

    #[test]
    fn handle_is_shareable() {
        let handle = DefaultCookieJar::new().into_handle();
        let other = handle.clone();
        handle.write().unwrap().set_cookie("k=v").unwrap();
        assert_eq!(other.read().unwrap().cookie_string(), "k=v");
    }
}
