//! Core-wide configuration.
//!
//! [`CoreConfig`] collects every tunable this crate's components read:
//! pool/cache capacities, the outbound debounce window, the capture budget,
//! the anti-reload-loop window, and the policy lists used by [`crate::url_policy`].
//!
//! Use [`CoreConfig::default()`] for the values named throughout the spec, or
//! [`CoreConfig::builder()`] for a fluent builder with validation.
//!
//! # Examples
//!
//! ```rust
//! use classic_browser_core::CoreConfig;
//!
//! let cfg = CoreConfig::default();
//! assert_eq!(cfg.max_pool_size, 5);
//! assert_eq!(cfg.max_snapshots, 10);
//! ```
//!
//! ```rust
//! use std::time::Duration;
//! use classic_browser_core::CoreConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = CoreConfig::builder()
//!     .max_pool_size(8)
//!     .max_snapshots(20)
//!     .debounce(Duration::from_millis(50))
//!     .build()?;
//! assert_eq!(cfg.max_pool_size, 8);
//! # Ok(()) }
//! ```

use std::{fmt, time::Duration};

/// Overall Core configuration.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Maximum number of live renderers the `ViewPool` holds at once (default 5).
    pub max_pool_size: usize,
    /// Maximum number of cached snapshots the `SnapshotStore` holds at once (default 10).
    pub max_snapshots: usize,
    /// Quiescence window for the `StateService` outbound notification debounce.
    pub debounce: Duration,
    /// Soft budget for a single snapshot capture before it is considered stale.
    pub capture_budget: Duration,
    /// Minimum time since the last programmatic navigation on a view before
    /// `ViewManager::ensure_view_navigated_to_tab` is allowed to navigate again.
    pub reload_anti_loop_window: Duration,
    /// Query parameters stripped before comparing two URLs for equivalence.
    pub tracking_params: Vec<String>,
    /// Hosts (after stripping a leading `www.`) treated as search engines for
    /// URL-equivalence purposes; only their `q`/`query` parameter is compared.
    pub search_engine_hosts: Vec<String>,
    /// Path/host keywords identifying an authentication URL.
    pub auth_url_keywords: Vec<String>,
    /// Hosts (after stripping a leading `www.`) of known identity providers;
    /// any URL whose host is one of these, or a subdomain of one, is treated
    /// as an authentication URL regardless of path/keyword match.
    pub identity_provider_domains: Vec<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_pool_size: 5,
            max_snapshots: 10,
            debounce: Duration::from_millis(50),
            capture_budget: Duration::from_secs(5),
            reload_anti_loop_window: Duration::from_millis(1000),
            tracking_params: [
                "utm_source",
                "utm_medium",
                "utm_campaign",
                "utm_term",
                "utm_content",
                "fbclid",
                "gclid",
                "msclkid",
                "_ga",
                "_gid",
                "sessionid",
                "timestamp",
                "source",
                "ref",
                "referer",
                "referrer",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            search_engine_hosts: ["google.com", "bing.com", "yahoo.com", "duckduckgo.com"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            auth_url_keywords: [
                "oauth",
                "sso",
                "login",
                "signin",
                "auth",
                "finish_google_sso",
                "callback",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            identity_provider_domains: [
                "accounts.google.com",
                "login.microsoftonline.com",
                "github.com",
                "appleid.apple.com",
                "okta.com",
                "auth0.com",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl CoreConfig {
    /// Start building a `CoreConfig` from defaults using a fluent builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

// ---------- Builder ----------

#[derive(Debug, Clone)]
pub struct CoreConfigBuilder {
    inner: CoreConfig,
}

impl Default for CoreConfigBuilder {
    fn default() -> Self {
        Self {
            inner: CoreConfig::default(),
        }
    }
}

impl CoreConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut CoreConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn max_pool_size(self, n: usize) -> Self {
        self.map(|c| c.max_pool_size = n)
    }
    pub fn max_snapshots(self, n: usize) -> Self {
        self.map(|c| c.max_snapshots = n)
    }
    pub fn debounce(self, d: Duration) -> Self {
        self.map(|c| c.debounce = d)
    }
    pub fn capture_budget(self, d: Duration) -> Self {
        self.map(|c| c.capture_budget = d)
    }
    pub fn reload_anti_loop_window(self, d: Duration) -> Self {
        self.map(|c| c.reload_anti_loop_window = d)
    }
    pub fn tracking_params(self, v: Vec<String>) -> Self {
        self.map(|c| c.tracking_params = v)
    }
    pub fn search_engine_hosts(self, v: Vec<String>) -> Self {
        self.map(|c| c.search_engine_hosts = v)
    }
    pub fn auth_url_keywords(self, v: Vec<String>) -> Self {
        self.map(|c| c.auth_url_keywords = v)
    }
    pub fn identity_provider_domains(self, v: Vec<String>) -> Self {
        self.map(|c| c.identity_provider_domains = v)
    }

    /// Apply multiple mutations in one go.
    pub fn with(self, f: impl FnOnce(&mut CoreConfig)) -> Self {
        self.map(f)
    }

    /// Validate and build the final `CoreConfig`.
    pub fn build(self) -> Result<CoreConfig, CoreConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone)]
pub enum CoreConfigError {
    ZeroPoolSize,
    ZeroSnapshots,
    ZeroDuration(&'static str),
}

impl fmt::Display for CoreConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CoreConfigError::*;
        match self {
            ZeroPoolSize => write!(f, "max_pool_size must be at least 1"),
            ZeroSnapshots => write!(f, "max_snapshots must be at least 1"),
            ZeroDuration(name) => write!(f, "{name} must be greater than zero"),
        }
    }
}
impl std::error::Error for CoreConfigError {}

fn validate(c: &CoreConfig) -> Result<(), CoreConfigError> {
    if c.max_pool_size == 0 {
        return Err(CoreConfigError::ZeroPoolSize);
    }
    if c.max_snapshots == 0 {
        return Err(CoreConfigError::ZeroSnapshots);
    }
    if c.debounce.is_zero() {
        return Err(CoreConfigError::ZeroDuration("debounce"));
    }
    if c.capture_budget.is_zero() {
        return Err(CoreConfigError::ZeroDuration("capture_budget"));
    }
    if c.reload_anti_loop_window.is_zero() {
        return Err(CoreConfigError::ZeroDuration("reload_anti_loop_window"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_constants() {
        let c = CoreConfig::default();
        assert_eq!(c.max_pool_size, 5);
        assert_eq!(c.max_snapshots, 10);
        assert_eq!(c.debounce, Duration::from_millis(50));
        assert_eq!(c.reload_anti_loop_window, Duration::from_millis(1000));
        assert!(c.tracking_params.iter().any(|p| p == "utm_source"));
        assert!(c.search_engine_hosts.iter().any(|h| h == "google.com"));
        assert!(c.auth_url_keywords.iter().any(|k| k == "oauth"));
        assert!(c.identity_provider_domains.iter().any(|d| d == "accounts.google.com"));
    }

    #[test]
    fn builder_rejects_zero_pool_size() {
        let err = CoreConfig::builder().max_pool_size(0).build().unwrap_err();
        assert!(matches!(err, CoreConfigError::ZeroPoolSize));
    }

    #[test]
    fn builder_rejects_zero_debounce() {
        let err = CoreConfig::builder()
            .debounce(Duration::from_millis(0))
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreConfigError::ZeroDuration("debounce")));
    }

    #[test]
    fn builder_applies_overrides() {
        let cfg = CoreConfig::builder()
            .max_pool_size(8)
            .max_snapshots(20)
            .build()
            .unwrap();
        assert_eq!(cfg.max_pool_size, 8);
        assert_eq!(cfg.max_snapshots, 20);
    }
}
