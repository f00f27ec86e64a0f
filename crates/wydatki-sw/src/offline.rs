//! Synthesized responses: JSON error bodies and the offline fallback page.

use chrono::{SecondsFormat, Utc};
use serde_json::json;

/// Error kind reported when the network is unreachable.
pub const ERROR_NETWORK_UNAVAILABLE: &str = "Network unavailable";

/// Error kind reported when an API call exceeds its budget.
pub const ERROR_REQUEST_TIMEOUT: &str = "Request timeout";

/// User-facing message for network failures.
pub const MSG_NETWORK_UNAVAILABLE: &str = "Sprawdź połączenie internetowe";

/// User-facing message for timeouts.
pub const MSG_REQUEST_TIMEOUT: &str = "Żądanie przekroczyło limit czasu";

/// Current time as an ISO-8601 string (millisecond precision, UTC).
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in milliseconds since the epoch.
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Build the JSON body for a synthesized API error response.
pub fn json_error_body(error: &str, message: &str) -> Vec<u8> {
    json!({
        "error": error,
        "message": message,
        "timestamp": iso_now(),
    })
    .to_string()
    .into_bytes()
}

/// Build the self-contained offline page served when a navigation cannot be
/// satisfied from cache or network.
pub fn offline_page() -> String {
    r#"<!DOCTYPE html>
<html lang="pl">
<head>
    <title>Offline - Wydatki</title>
    <meta name="viewport" content="width=device-width, initial-scale=1, viewport-fit=cover">
    <meta name="apple-mobile-web-app-capable" content="yes">
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, sans-serif;
            text-align: center;
            padding: 50px 20px;
            background: #F2F2F7;
            color: #000;
            min-height: 100vh;
            display: flex;
            flex-direction: column;
            justify-content: center;
            align-items: center;
        }
        .offline {
            color: #666;
            max-width: 400px;
        }
        .retry-btn {
            background: #007AFF;
            color: white;
            border: none;
            padding: 12px 24px;
            border-radius: 8px;
            margin-top: 20px;
            cursor: pointer;
            font-size: 16px;
            font-weight: 600;
        }
        h1 {
            color: #000;
            margin-bottom: 10px;
        }
        @media (prefers-color-scheme: dark) {
            body { background: #000; color: #fff; }
            h1 { color: #fff; }
            .offline { color: #999; }
        }
    </style>
</head>
<body>
    <h1>Dashboard Wydatków</h1>
    <div class="offline">
        <p><strong>Brak połączenia internetowego</strong></p>
        <p>Sprawdź połączenie Wi-Fi lub mobilne i spróbuj ponownie</p>
    </div>
    <button class="retry-btn" onclick="location.reload()">Spróbuj ponownie</button>
</body>
</html>"#
        .to_string()
}
