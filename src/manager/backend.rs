//! Raw read/write access to the three storage media.
//!
//! Backends know nothing about timers or watchers. The manager wraps local and session areas
//! in an [`AreaBackend`] and the document's cookie jar in a [`CookieBackend`].

use std::sync::{Arc, PoisonError};
use anyhow::{anyhow, Result};
use time::OffsetDateTime;

use crate::config::ManagerConfig;
use crate::cookies::{escape, format_http_date, unescape, CookieJarHandle};
use crate::storage::StorageArea;

/// Attributes a write may carry. Only the cookie medium looks at them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteAttributes {
    /// Pre-formatted GMT expiry date
    pub expires: Option<String>,
    pub path: Option<String>,
    pub domain: Option<String>,
}

/// Key/value contract shared by every storage medium.
pub trait Backend: Send + Sync {
    /// Current raw value, or `None` when the key is absent.
    fn raw_get(&self, key: &str) -> Option<String>;

    fn raw_set(&self, key: &str, value: &str, attrs: &WriteAttributes) -> Result<()>;

    /// Removes `key`. Cookie deletions are scoped by the path and domain in `attrs`.
    fn raw_delete(&self, key: &str, attrs: &WriteAttributes) -> Result<()>;

    /// Drops every entry. Only valid for media whose kind reports `can_clear_all`.
    fn raw_clear(&self) -> Result<()>;

    /// Every key currently present.
    fn keys(&self) -> Vec<String>;
}

/// Local or session storage area.
pub struct AreaBackend {
    area: Arc<dyn StorageArea>,
}

impl AreaBackend {
    pub fn new(area: Arc<dyn StorageArea>) -> Self {
        Self { area }
    }
}

impl Backend for AreaBackend {
    fn raw_get(&self, key: &str) -> Option<String> {
        self.area.get_item(key)
    }

    fn raw_set(&self, key: &str, value: &str, _attrs: &WriteAttributes) -> Result<()> {
        log::trace!("area set {:?}", key);
        self.area.set_item(key, value)
    }

    fn raw_delete(&self, key: &str, _attrs: &WriteAttributes) -> Result<()> {
        log::trace!("area delete {:?}", key);
        self.area.remove_item(key)
    }

    fn raw_clear(&self) -> Result<()> {
        self.area.clear()
    }

    fn keys(&self) -> Vec<String> {
        self.area.keys()
    }
}

/// Builds a `document.cookie` assignment: `name=value[;expires=..][;path=..][;domain=..]`.
/// Name and value are escaped, attributes are written verbatim.
pub fn build_cookie_string(key: &str, value: &str, attrs: &WriteAttributes) -> String {
    assignment(&escape(key), &escape(value), attrs)
}

fn assignment(name: &str, value: &str, attrs: &WriteAttributes) -> String {
    let mut cookie = format!("{}={}", name, value);
    if let Some(expires) = &attrs.expires {
        cookie.push_str(";expires=");
        cookie.push_str(expires);
    }
    if let Some(path) = &attrs.path {
        cookie.push_str(";path=");
        cookie.push_str(path);
    }
    if let Some(domain) = &attrs.domain {
        cookie.push_str(";domain=");
        cookie.push_str(domain);
    }
    cookie
}

/// The document's cookie jar, seen through `document.cookie`.
pub struct CookieBackend {
    jar: CookieJarHandle,
    default_path: String,
    default_domain: Option<String>,
}

impl CookieBackend {
    pub fn new(jar: CookieJarHandle, config: &ManagerConfig) -> Self {
        Self {
            jar,
            default_path: config.default_cookie_path.clone(),
            default_domain: config.default_cookie_domain.clone(),
        }
    }

    fn cookie_string(&self) -> String {
        self.jar.read().unwrap_or_else(PoisonError::into_inner).cookie_string()
    }

    /// Raw `(name, value)` pairs in cookie-string order, exactly as the jar reports them.
    fn raw_pairs(&self) -> Vec<(String, String)> {
        self.cookie_string()
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect()
    }

    /// Fills in the configured path and domain.
    fn scoped(&self, attrs: &WriteAttributes) -> WriteAttributes {
        WriteAttributes {
            expires: attrs.expires.clone(),
            path: attrs.path.clone().or_else(|| Some(self.default_path.clone())),
            domain: attrs.domain.clone().or_else(|| self.default_domain.clone()),
        }
    }

    fn assign(&self, cookie: &str) -> Result<()> {
        log::trace!("document.cookie = {:?}", cookie);
        self.jar
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_cookie(cookie)
    }
}

impl Backend for CookieBackend {
    fn raw_get(&self, key: &str) -> Option<String> {
        self.raw_pairs()
            .into_iter()
            .find(|(name, _)| unescape(name) == key)
            .map(|(_, value)| unescape(&value))
    }

    fn raw_set(&self, key: &str, value: &str, attrs: &WriteAttributes) -> Result<()> {
        self.assign(&build_cookie_string(key, value, &self.scoped(attrs)))
    }

    /// Expires every visible cookie whose unescaped name is `key`, under its name as the jar
    /// holds it. Cookies written by other parties need not be escaped the way `raw_set` writes.
    fn raw_delete(&self, key: &str, attrs: &WriteAttributes) -> Result<()> {
        let attrs = WriteAttributes {
            expires: Some(format_http_date(OffsetDateTime::UNIX_EPOCH)?),
            ..self.scoped(attrs)
        };

        let mut names: Vec<String> = self
            .raw_pairs()
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| unescape(name) == key)
            .collect();
        if names.is_empty() {
            names.push(escape(key));
        }

        for name in names {
            self.assign(&assignment(&name, "", &attrs))?;
        }
        Ok(())
    }

    fn raw_clear(&self) -> Result<()> {
        Err(anyhow!("the cookie jar has no clear-all primitive"))
    }

    fn keys(&self) -> Vec<String> {
        self.raw_pairs().into_iter().map(|(name, _)| unescape(&name)).collect()
    }
}
