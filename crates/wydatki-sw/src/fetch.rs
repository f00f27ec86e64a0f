//! Intercepted-request and synthesized-response types.

use hashbrown::HashMap;
use http::Method;
use url::Url;

use wydatki_cache::CacheEntry;
use wydatki_net::Response;

use crate::offline;

/// An intercepted network request from a controlled page.
#[derive(Debug, Clone)]
pub struct FetchEvent {
    /// Request URL.
    pub url: Url,

    /// Request method.
    pub method: Method,

    /// Originating client, if known.
    pub client_id: Option<String>,

    /// Whether this is a navigation (the browser loading a document).
    pub is_navigation: bool,
}

impl FetchEvent {
    /// A plain GET for a sub-resource.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            client_id: None,
            is_navigation: false,
        }
    }

    /// A navigation request for a document.
    pub fn navigation(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            client_id: None,
            is_navigation: true,
        }
    }

    /// Any non-GET request.
    pub fn with_method(url: Url, method: Method) -> Self {
        Self {
            url,
            method,
            client_id: None,
            is_navigation: false,
        }
    }

    /// Attach the originating client ID.
    pub fn from_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

/// The controller's decision for an intercepted request.
#[derive(Debug)]
pub enum FetchDecision {
    /// Let the request proceed untouched (non-GET, extension schemes).
    Passthrough,

    /// Answer with this response.
    Respond(FetchResponse),
}

impl FetchDecision {
    /// The response, if the controller produced one.
    pub fn response(&self) -> Option<&FetchResponse> {
        match self {
            FetchDecision::Passthrough => None,
            FetchDecision::Respond(response) => Some(response),
        }
    }

    /// Whether the request was passed through.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, FetchDecision::Passthrough)
    }
}

/// A response handed back to the page.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Status code.
    pub status: u16,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Vec<u8>,

    /// Whether this was served from the cache.
    pub from_cache: bool,
}

impl FetchResponse {
    /// Build from a cached entry.
    pub fn from_entry(entry: &CacheEntry) -> Self {
        Self {
            status: entry.status,
            headers: entry.headers.clone(),
            body: entry.body.clone(),
            from_cache: true,
        }
    }

    /// Build from a network response, passing status and headers through.
    pub fn from_network(response: &Response) -> Self {
        let mut headers = HashMap::new();
        for (name, value) in response.headers.iter() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_string(), value.to_string());
            }
        }

        Self {
            status: response.status.as_u16(),
            headers,
            body: response.body.to_vec(),
            from_cache: false,
        }
    }

    /// A synthesized JSON error response (503 network failure, 408 timeout).
    pub fn json_error(status: u16, error: &str, message: &str) -> Self {
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/json".to_string(),
        );

        Self {
            status,
            headers,
            body: offline::json_error_body(error, message),
            from_cache: false,
        }
    }

    /// The generated offline page, served with 503.
    pub fn offline_page() -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());

        Self {
            status: 503,
            headers,
            body: offline::offline_page().into_bytes(),
            from_cache: false,
        }
    }

    /// The empty 404 served to failed non-navigation requests.
    pub fn empty_not_found() -> Self {
        Self {
            status: 404,
            headers: HashMap::new(),
            body: Vec::new(),
            from_cache: false,
        }
    }

    /// Get a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|s| s.as_str())
    }

    /// Whether the status is 2xx.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}
