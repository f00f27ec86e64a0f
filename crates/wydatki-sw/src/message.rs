//! The page ↔ controller message protocol.
//!
//! Wire shapes match what the dashboard pages already send and expect:
//! commands are `{ "type": "SKIP_WAITING" }`-style tagged objects, replies
//! carry camelCase payload fields (`cacheName`, `cacheSize`, `cachedUrls`).

use serde::{Deserialize, Serialize};

use crate::metrics::MetricsSnapshot;
use crate::offline::iso_now;

/// A command sent by a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Promote the waiting worker immediately.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,

    /// Ask for the current version and store name.
    #[serde(rename = "GET_VERSION")]
    GetVersion,

    /// Delete the current cache store.
    #[serde(rename = "CLEAR_CACHE")]
    ClearCache,

    /// Ask for the count and list of cached URLs.
    #[serde(rename = "GET_CACHE_STATUS")]
    GetCacheStatus,

    /// A page announced itself (keeps the heartbeat running).
    #[serde(rename = "CLIENT_CONNECTED")]
    ClientConnected,
}

/// A reply sent back over the message port.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ControllerReply {
    #[serde(rename_all = "camelCase")]
    Version {
        version: String,
        cache_name: String,
        timestamp: String,
    },

    ClearCache {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    CacheStatus {
        cache_size: usize,
        cached_urls: Vec<String>,
        version: String,
    },
}

/// An event pushed to every connected client (no reply expected).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ControllerEvent {
    #[serde(rename = "SYNC_COMPLETE")]
    SyncComplete { timestamp: String },

    #[serde(rename = "SW_ERROR")]
    SwError { error: String, timestamp: String },

    #[serde(rename = "PERFORMANCE_METRICS")]
    PerformanceMetrics {
        data: MetricsSnapshot,
        timestamp: String,
    },
}

impl ControllerEvent {
    /// A sync-completed event stamped with the current time.
    pub fn sync_complete() -> Self {
        Self::SyncComplete {
            timestamp: iso_now(),
        }
    }

    /// An error event stamped with the current time.
    pub fn error(error: impl Into<String>) -> Self {
        Self::SwError {
            error: error.into(),
            timestamp: iso_now(),
        }
    }

    /// A metrics event stamped with the current time.
    pub fn metrics(data: MetricsSnapshot) -> Self {
        Self::PerformanceMetrics {
            data,
            timestamp: iso_now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_format() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(msg, ClientMessage::SkipWaiting);

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"GET_CACHE_STATUS"}"#).unwrap();
        assert_eq!(msg, ClientMessage::GetCacheStatus);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"NOT_A_COMMAND"}"#).is_err());
    }

    #[test]
    fn test_version_reply_field_names() {
        let reply = ControllerReply::Version {
            version: "1.0.3".to_string(),
            cache_name: "dashboard-wydatki-v1.0.3".to_string(),
            timestamp: "2024-03-01T00:00:00.000Z".to_string(),
        };

        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["version"], "1.0.3");
        assert_eq!(value["cacheName"], "dashboard-wydatki-v1.0.3");
    }

    #[test]
    fn test_cache_status_reply_field_names() {
        let reply = ControllerReply::CacheStatus {
            cache_size: 2,
            cached_urls: vec!["/a.js".to_string(), "/b.js".to_string()],
            version: "1.0.3".to_string(),
        };

        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["cacheSize"], 2);
        assert_eq!(value["cachedUrls"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_clear_cache_reply_omits_absent_fields() {
        let reply = ControllerReply::ClearCache {
            success: true,
            message: Some("Cache cleared successfully".to_string()),
            error: None,
        };

        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["success"], true);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_event_wire_format() {
        let event = ControllerEvent::SwError {
            error: "boom".to_string(),
            timestamp: "2024-03-01T00:00:00.000Z".to_string(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "SW_ERROR");
        assert_eq!(value["error"], "boom");
    }
}
