//! Cache controller configuration.
//!
//! Everything the worker variants kept as module-level globals (version
//! string, manifest, endpoint lists, timeout budget) lives here so a
//! controller is fully described by the config it was constructed with.

use std::time::Duration;

use url::Url;
use wydatki_common::RetryConfig;
use wydatki_net::UrlPattern;

/// Configuration for a [`CacheController`](crate::CacheController).
#[derive(Debug, Clone)]
pub struct SwConfig {
    /// Scope the worker controls; relative manifest entries resolve against it.
    pub scope: Url,

    /// Worker script URL (derived from the scope unless overridden).
    pub script_url: Url,

    /// Cache generation, e.g. "1.0.3".
    pub version: String,

    /// Store-name prefix; the active store is named `"<prefix>v<version>"`.
    pub cache_prefix: String,

    /// URLs pre-fetched and stored at install time.
    pub manifest: Vec<String>,

    /// Requests matching any of these never touch the cache.
    pub api_matchers: Vec<UrlPattern>,

    /// Path suffixes that get background revalidation on a cache hit.
    pub critical_extensions: Vec<String>,

    /// Budget for API-bypass requests.
    pub api_timeout: Duration,

    /// Document served to navigations that cannot reach the network.
    pub fallback_document: String,

    /// Heartbeat period; `None` disables the keepalive task.
    pub keepalive_interval: Option<Duration>,

    /// Retry policy for pre-caching manifest entries.
    pub precache_retry: RetryConfig,
}

impl SwConfig {
    /// Create a config with the Wydatki dashboard defaults (v1.0.3 worker).
    pub fn new(scope: Url) -> Self {
        let script_url = scope
            .join("service-worker.js")
            .unwrap_or_else(|_| scope.clone());

        Self {
            scope,
            script_url,
            version: "1.0.3".to_string(),
            cache_prefix: "dashboard-wydatki-".to_string(),
            manifest: vec![
                "/".to_string(),
                "/dashboard.html".to_string(),
                "/manifest.json".to_string(),
                "/css/main.css".to_string(),
                "/css/yearly-chart.css".to_string(),
                "/js/config.js".to_string(),
                "/js/utils.js".to_string(),
                "/js/api.js".to_string(),
                "/js/haptic.js".to_string(),
                "/js/yearly-chart.js".to_string(),
                "/js/expense-form.js".to_string(),
                "/js/dashboard.js".to_string(),
                "/js/app.js".to_string(),
                "https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.js".to_string(),
            ],
            api_matchers: vec![
                UrlPattern::contains("jan204-20204.wykr.es"),
                UrlPattern::contains("n8n.wykr.es"),
                UrlPattern::contains("webhook"),
                UrlPattern::contains("dashboard-wydatki"),
                UrlPattern::contains("dashboard-add-expense"),
            ],
            critical_extensions: vec![".js".to_string(), ".css".to_string(), ".html".to_string()],
            api_timeout: Duration::from_secs(10),
            fallback_document: "/dashboard.html".to_string(),
            keepalive_interval: None,
            precache_retry: RetryConfig::none(),
        }
    }

    /// Set the cache version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Replace the pre-cache manifest.
    pub fn with_manifest(mut self, manifest: Vec<String>) -> Self {
        self.manifest = manifest;
        self
    }

    /// Replace the API matchers.
    pub fn with_api_matchers(mut self, matchers: Vec<UrlPattern>) -> Self {
        self.api_matchers = matchers;
        self
    }

    /// Set the API timeout budget.
    pub fn with_api_timeout(mut self, timeout: Duration) -> Self {
        self.api_timeout = timeout;
        self
    }

    /// Enable the keepalive heartbeat.
    pub fn with_keepalive(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }

    /// Set the pre-cache retry policy.
    pub fn with_precache_retry(mut self, retry: RetryConfig) -> Self {
        self.precache_retry = retry;
        self
    }

    /// Name of the store for the current version.
    pub fn cache_name(&self) -> String {
        format!("{}v{}", self.cache_prefix, self.version)
    }

    /// Resolve a manifest entry or document path against the scope.
    pub fn resolve(&self, entry: &str) -> Option<Url> {
        match Url::parse(entry) {
            Ok(absolute) => Some(absolute),
            Err(_) => self.scope.join(entry).ok(),
        }
    }

    /// The absolute URL of the offline fallback document.
    pub fn fallback_url(&self) -> Option<Url> {
        self.resolve(&self.fallback_document)
    }

    /// Whether a URL belongs to the bypassed API.
    pub fn is_api_url(&self, url: &Url) -> bool {
        self.api_matchers.iter().any(|m| m.matches(url))
    }

    /// Whether a path names a critical resource (revalidated in background).
    pub fn is_critical_path(&self, path: &str) -> bool {
        self.critical_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
    }
}
