/// Capacity of the storage event bus shared by all tabs of an origin.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;

const DEFAULT_COOKIE_PATH: &str = "/";

/// Storage manager configuration.
///
/// ```rust
/// use gosub_storage::config::ManagerConfig;
///
/// let config = ManagerConfig::default()
///     .with_cookie_path("/app")
///     .with_cookie_domain("example.com");
/// assert_eq!(config.default_cookie_path, "/app");
/// ```
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Path attribute for cookies written without an explicit scope
    pub default_cookie_path: String,
    /// Domain attribute for cookies written without an explicit scope. `None` omits the attribute.
    pub default_cookie_domain: Option<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_cookie_path: DEFAULT_COOKIE_PATH.to_string(),
            default_cookie_domain: None,
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.default_cookie_path = path.into();
        self
    }

    pub fn with_cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.default_cookie_domain = Some(domain.into());
        self
    }
}
