//! Cookies: the [`Cookie`] record, the [`CookieJar`] abstraction and its in-memory
//! implementation.
//!
//! The jar models the `document.cookie` surface of one document: assignments are whole cookie
//! strings (`name=value; expires=...; path=...`), reads return every live cookie as
//! `name=value` pairs joined by `"; "`. Cookies expire natively: a cookie whose `expires`
//! attribute lies in the past is purged on assignment and hidden on read.

mod cookie;
mod cookie_jar;

use std::sync::{Arc, RwLock};

pub use cookie::{escape, format_http_date, parse_http_date, unescape, Cookie};
pub use cookie_jar::{CookieJar, DefaultCookieJar};

/// A handle to a cookie jar trait.
///
/// Take a **read lock** for queries and a **write lock** for assignments.
pub type CookieJarHandle = Arc<RwLock<dyn CookieJar + Send + Sync>>;
