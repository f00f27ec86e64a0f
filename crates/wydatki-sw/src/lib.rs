//! # Wydatki SW
//!
//! The offline-cache service worker core for the Wydatki expense dashboard.
//!
//! ## Architecture
//!
//! ```text
//! CacheController
//!     ├── SwConfig          (version, manifest, API matchers, budgets)
//!     ├── Registration      (installing → waiting → active workers)
//!     ├── Clients           (controlled pages + event channels)
//!     ├── CacheStorage      (one store per cache version)
//!     └── FetchBackend      (the network)
//! ```
//!
//! The controller owns one handler per lifecycle hook: [`CacheController::install`],
//! [`CacheController::activate`], [`CacheController::handle_fetch`],
//! [`CacheController::handle_message`], and [`CacheController::handle_sync`].
//!
//! Fetch routing is two-tier: cache-first for static assets (with background
//! revalidation for critical resources), network-only for API calls, with
//! synthesized JSON errors and an offline fallback page when both tiers fail.
//! Every intercepted request resolves to a decision; nothing rejects upward.

use std::sync::Arc;

use http::{Method, StatusCode};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use wydatki_cache::{CacheEntry, CacheError, CacheStorage};
use wydatki_common::{retry_with_backoff, with_timeout, Result, WydatkiError};
use wydatki_net::{FetchBackend, NetError, Request, Response};

pub mod config;
pub mod fetch;
pub mod lifecycle;
pub mod message;
pub mod metrics;
pub mod offline;

pub use config::SwConfig;
pub use fetch::{FetchDecision, FetchEvent, FetchResponse};
pub use lifecycle::{Clients, Registration, Worker, WorkerState};
pub use message::{ClientMessage, ControllerEvent, ControllerReply};
pub use metrics::{MetricsSnapshot, PerfCounters, RequestKind};

use crate::offline::{
    iso_now, now_ms, ERROR_NETWORK_UNAVAILABLE, ERROR_REQUEST_TIMEOUT, MSG_NETWORK_UNAVAILABLE,
    MSG_REQUEST_TIMEOUT,
};

/// Outcome of the install phase.
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    /// Manifest entries successfully pre-cached.
    pub cached: Vec<String>,

    /// Manifest entries that could not be cached.
    pub failed: Vec<String>,
}

impl InstallReport {
    /// Whether every manifest entry was cached.
    pub fn all_cached(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The service worker core: lifecycle, fetch routing, and the message protocol.
pub struct CacheController {
    config: SwConfig,

    /// Cache storage, shared with background revalidation tasks.
    pub caches: Arc<RwLock<CacheStorage>>,

    /// Connected clients.
    pub clients: Arc<RwLock<Clients>>,

    backend: Arc<dyn FetchBackend>,
    registration: RwLock<Registration>,
    metrics: Arc<PerfCounters>,
    keepalive: Mutex<Option<JoinHandle<()>>>,
}

impl CacheController {
    /// Create a controller from config and a network backend.
    pub fn new(config: SwConfig, backend: Arc<dyn FetchBackend>) -> Self {
        let registration = Registration::new(config.scope.clone());

        Self {
            config,
            caches: Arc::new(RwLock::new(CacheStorage::new())),
            clients: Arc::new(RwLock::new(Clients::new())),
            backend,
            registration: RwLock::new(registration),
            metrics: Arc::new(PerfCounters::new()),
            keepalive: Mutex::new(None),
        }
    }

    /// The controller's configuration.
    pub fn config(&self) -> &SwConfig {
        &self.config
    }

    /// Current metric totals.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // ==================== Lifecycle ====================

    /// Install: open the versioned store and pre-cache the manifest.
    ///
    /// Per-entry failures are isolated; install only fails if the store
    /// itself cannot be opened. Completes with the new worker in the
    /// waiting state, ready for immediate activation.
    pub async fn install(&self) -> Result<InstallReport> {
        info!(version = %self.config.version, "Service worker installing");

        self.registration
            .write()
            .await
            .begin_install(self.config.script_url.clone());

        let cache_name = self.config.cache_name();
        self.caches.write().await.open(&cache_name);
        debug!(store = %cache_name, "Cache opened");

        let mut report = InstallReport::default();
        for entry in &self.config.manifest {
            let Some(url) = self.config.resolve(entry) else {
                warn!(entry = %entry, "Skipping unresolvable manifest entry");
                report.failed.push(entry.clone());
                continue;
            };

            match self.precache(&url).await {
                Ok(()) => report.cached.push(entry.clone()),
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to cache manifest entry");
                    report.failed.push(entry.clone());
                }
            }
        }

        if !report.failed.is_empty() {
            warn!(failed = report.failed.len(), "Some resources failed to cache");
        }
        info!(cached = report.cached.len(), "Cache installation completed");

        self.registration.write().await.install_complete();
        Ok(report)
    }

    /// Fetch and store one manifest entry.
    async fn precache(&self, url: &Url) -> Result<()> {
        let response = retry_with_backoff(&self.config.precache_retry, || {
            self.backend.fetch(Request::get(url.clone()))
        })
        .await
        .map_err(|e| WydatkiError::network_with_source(url.to_string(), e))?;

        if !response.ok() {
            return Err(WydatkiError::install(format!(
                "{} responded with status {}",
                url, response.status
            )));
        }

        self.try_store(url, &response)
            .await
            .map_err(|e| WydatkiError::cache_with_source(url.to_string(), e))
    }

    /// Activate: evict stale cache generations and claim all clients.
    ///
    /// Returns the names of the deleted stores.
    pub async fn activate(&self) -> Result<Vec<String>> {
        info!(version = %self.config.version, "Service worker activating");

        let current = self.config.cache_name();
        let deleted = {
            let mut caches = self.caches.write().await;
            let stale: Vec<String> = caches
                .keys_with_prefix(&self.config.cache_prefix)
                .into_iter()
                .filter(|name| *name != current)
                .collect();

            for name in &stale {
                info!(store = %name, "Deleting old cache");
                caches.delete(name);
            }
            stale
        };

        self.clients.write().await.claim();
        self.registration.write().await.activate();
        self.start_keepalive().await;

        info!("Service worker activated");
        Ok(deleted)
    }

    /// State of the active worker, if any.
    pub async fn active_worker_state(&self) -> Option<WorkerState> {
        self.registration
            .read()
            .await
            .get_active()
            .map(|worker| worker.state)
    }

    /// Whether a worker is installed and waiting for activation.
    pub async fn has_waiting_worker(&self) -> bool {
        self.registration.read().await.waiting.is_some()
    }

    // ==================== Fetch routing ====================

    /// Decide how to answer an intercepted request.
    ///
    /// Infallible: every path resolves to a passthrough or a response.
    pub async fn handle_fetch(&self, event: FetchEvent) -> FetchDecision {
        if event.method != Method::GET {
            trace!(method = %event.method, url = %event.url, "Skipping non-GET request");
            return FetchDecision::Passthrough;
        }

        if matches!(event.url.scheme(), "chrome-extension" | "moz-extension") {
            return FetchDecision::Passthrough;
        }

        if self.config.is_api_url(&event.url) {
            debug!(url = %event.url, client = ?event.client_id, "Bypassing cache for API call");
            return FetchDecision::Respond(self.fetch_api(&event).await);
        }

        let event = self.rewrite_navigation(event);
        FetchDecision::Respond(self.fetch_asset(&event).await)
    }

    /// Standalone-mode fix: navigations to the root load the dashboard
    /// document instead.
    fn rewrite_navigation(&self, mut event: FetchEvent) -> FetchEvent {
        if event.is_navigation && matches!(event.url.path(), "/" | "/index.html") {
            if let Some(fallback) = self.config.fallback_url() {
                trace!(from = %event.url, to = %fallback, "Rewriting root navigation");
                event.url = fallback;
            }
        }
        event
    }

    /// Network-only path for API calls, bounded by the timeout budget.
    async fn fetch_api(&self, event: &FetchEvent) -> FetchResponse {
        let request = Request::get(event.url.clone());

        match with_timeout(self.config.api_timeout, || self.backend.fetch(request)).await {
            Ok(Ok(response)) => FetchResponse::from_network(&response),
            Ok(Err(NetError::Timeout(_))) | Err(_) => {
                error!(url = %event.url, "API request timed out");
                self.record(RequestKind::Error).await;
                self.report_error(format!("API timeout: {}", event.url.path()))
                    .await;
                FetchResponse::json_error(408, ERROR_REQUEST_TIMEOUT, MSG_REQUEST_TIMEOUT)
            }
            Ok(Err(e)) => {
                error!(url = %event.url, error = %e, "API call failed");
                self.record(RequestKind::Error).await;
                self.report_error(format!("API call failed: {}", event.url.path()))
                    .await;
                FetchResponse::json_error(503, ERROR_NETWORK_UNAVAILABLE, MSG_NETWORK_UNAVAILABLE)
            }
        }
    }

    /// Cache-first path for static assets.
    async fn fetch_asset(&self, event: &FetchEvent) -> FetchResponse {
        let cached = {
            let caches = self.caches.read().await;
            caches
                .match_request(Method::GET.as_str(), event.url.as_str())
                .map(FetchResponse::from_entry)
        };

        if let Some(response) = cached {
            debug!(path = %event.url.path(), "Serving from cache");
            self.record(RequestKind::CacheHit).await;

            if self.config.is_critical_path(event.url.path()) {
                self.spawn_revalidation(event.url.clone());
            }
            return response;
        }

        debug!(path = %event.url.path(), "Fetching from network");
        self.record(RequestKind::CacheMiss).await;
        self.record(RequestKind::NetworkRequest).await;

        match self.backend.fetch(Request::get(event.url.clone())).await {
            Ok(response) => {
                if response.status == StatusCode::OK && response.is_same_origin_as(&event.url) {
                    self.store_response(&event.url, &response).await;
                }
                FetchResponse::from_network(&response)
            }
            Err(e) => {
                error!(path = %event.url.path(), error = %e, "Fetch failed");
                self.record(RequestKind::Error).await;
                self.report_error(format!("Fetch failed: {}", event.url.path()))
                    .await;
                self.offline_fallback(event).await
            }
        }
    }

    /// Serve a navigation from the cached fallback document, the generated
    /// offline page, or an empty 404 for sub-resources.
    async fn offline_fallback(&self, event: &FetchEvent) -> FetchResponse {
        if event.is_navigation {
            if let Some(fallback) = self.config.fallback_url() {
                let caches = self.caches.read().await;
                if let Some(entry) = caches.match_request(Method::GET.as_str(), fallback.as_str())
                {
                    debug!("Serving offline fallback document");
                    return FetchResponse::from_entry(entry);
                }
            }
            return FetchResponse::offline_page();
        }

        FetchResponse::empty_not_found()
    }

    /// Refresh a cached critical resource without blocking its caller.
    ///
    /// Only a 200 same-origin response overwrites the entry; failures leave
    /// the cache untouched.
    fn spawn_revalidation(&self, url: Url) {
        let backend = Arc::clone(&self.backend);
        let caches = Arc::clone(&self.caches);
        let cache_name = self.config.cache_name();

        tokio::spawn(async move {
            match backend.fetch(Request::get(url.clone())).await {
                Ok(response)
                    if response.status == StatusCode::OK
                        && response.is_same_origin_as(&url) =>
                {
                    let entry = entry_from_response(&url, &response);
                    if let Err(e) = caches.write().await.open(&cache_name).put(entry) {
                        warn!(url = %url, error = %e, "Background cache update failed");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    trace!(url = %url, error = %e, "Background revalidation failed");
                }
            }
        });
    }

    /// Store a response in the current store, logging failures.
    async fn store_response(&self, url: &Url, response: &Response) {
        if let Err(e) = self.try_store(url, response).await {
            warn!(url = %url, error = %e, "Failed to cache response");
        }
    }

    async fn try_store(&self, url: &Url, response: &Response) -> std::result::Result<(), CacheError> {
        let entry = entry_from_response(url, response);
        self.caches
            .write()
            .await
            .open(&self.config.cache_name())
            .put(entry)
    }

    // ==================== Message protocol ====================

    /// Handle a command from a page. Returns the reply for the port, if any.
    pub async fn handle_message(&self, message: ClientMessage) -> Option<ControllerReply> {
        debug!(?message, "Message received");

        match message {
            ClientMessage::SkipWaiting => {
                self.registration.write().await.skip_waiting();
                None
            }
            ClientMessage::GetVersion => Some(ControllerReply::Version {
                version: self.config.version.clone(),
                cache_name: self.config.cache_name(),
                timestamp: iso_now(),
            }),
            ClientMessage::ClearCache => {
                let deleted = self.caches.write().await.delete(&self.config.cache_name());
                info!(deleted, "Cache cleared on request");
                Some(ControllerReply::ClearCache {
                    success: true,
                    message: Some("Cache cleared successfully".to_string()),
                    error: None,
                })
            }
            ClientMessage::GetCacheStatus => {
                let caches = self.caches.read().await;
                let (cache_size, cached_urls) = caches
                    .get(&self.config.cache_name())
                    .map(|store| (store.len(), store.keys()))
                    .unwrap_or((0, Vec::new()));

                Some(ControllerReply::CacheStatus {
                    cache_size,
                    cached_urls,
                    version: self.config.version.clone(),
                })
            }
            ClientMessage::ClientConnected => {
                self.start_keepalive().await;
                None
            }
        }
    }

    /// Handle a background-sync wakeup.
    pub async fn handle_sync(&self, tag: &str) {
        debug!(tag, "Background sync triggered");

        if tag == "background-sync" {
            self.clients
                .read()
                .await
                .broadcast(&ControllerEvent::sync_complete());
            info!("Background sync completed");
        }
    }

    /// Connect a page to the controller's event channel.
    pub async fn connect_client(
        &self,
        url: Url,
    ) -> (String, tokio::sync::mpsc::UnboundedReceiver<ControllerEvent>) {
        self.clients.write().await.connect(url)
    }

    /// Disconnect a page.
    pub async fn disconnect_client(&self, id: &str) -> bool {
        self.clients.write().await.remove(id)
    }

    // ==================== Background tasks ====================

    /// Record a request and broadcast totals when due.
    async fn record(&self, kind: RequestKind) {
        if let Some(snapshot) = self.metrics.record(kind) {
            self.clients
                .read()
                .await
                .broadcast(&ControllerEvent::metrics(snapshot));
        }
    }

    /// Report a suppressed internal error to every client.
    async fn report_error(&self, message: String) {
        self.clients
            .read()
            .await
            .broadcast(&ControllerEvent::error(message));
    }

    /// Start the keepalive heartbeat if configured and not already running.
    ///
    /// The task stops itself once no clients remain connected.
    async fn start_keepalive(&self) {
        let Some(period) = self.config.keepalive_interval else {
            return;
        };

        let mut guard = self.keepalive.lock().await;
        if guard.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let clients = Arc::clone(&self.clients);
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if clients.read().await.is_empty() {
                    debug!("Keepalive stopped");
                    break;
                }
                trace!("Keepalive tick");
            }
        }));
    }

    /// Whether the keepalive task is currently running.
    pub async fn keepalive_running(&self) -> bool {
        self.keepalive
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Abort the keepalive task.
    pub async fn stop_keepalive(&self) {
        if let Some(handle) = self.keepalive.lock().await.take() {
            handle.abort();
        }
    }
}

/// Snapshot a network response for storage under the requested URL.
fn entry_from_response(url: &Url, response: &Response) -> CacheEntry {
    let mut entry = CacheEntry::get(
        url.as_str(),
        response.status.as_u16(),
        response.body.to_vec(),
        now_ms(),
    );

    for (name, value) in response.headers.iter() {
        if let Ok(value) = value.to_str() {
            entry
                .headers
                .insert(name.as_str().to_string(), value.to_string());
        }
    }

    entry
}
