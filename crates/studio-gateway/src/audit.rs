//! Fire-and-forget security-event logging.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::warn;

/// A security event appended to the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Event type tag (e.g. `sign_in_success`, `sign_up_blocked`)
    pub event_type: String,
    /// Free-form details; must not contain credentials
    pub event_details: String,
    /// Whether the underlying operation succeeded
    pub success: bool,
}

impl SecurityEvent {
    pub fn new(event_type: &str, event_details: &str, success: bool) -> Self {
        Self {
            event_type: event_type.to_string(),
            event_details: event_details.to_string(),
            success,
        }
    }
}

/// Sink for security events. Recording is fire-and-forget: implementations
/// swallow every failure and must never block the caller.
pub trait SecurityEventSink: Send + Sync {
    fn record(&self, event: SecurityEvent);
}

/// Sink that drops all events.
#[derive(Clone, Debug, Default)]
pub struct NoopSecurityEventSink;

impl SecurityEventSink for NoopSecurityEventSink {
    fn record(&self, _event: SecurityEvent) {}
}

/// Sink that keeps events in memory. Useful for tests and local inspection.
#[derive(Default)]
pub struct MemorySecurityEventSink {
    events: Mutex<Vec<SecurityEvent>>,
}

impl MemorySecurityEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl SecurityEventSink for MemorySecurityEventSink {
    fn record(&self, event: SecurityEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Sink that appends events to the backend audit table in a background task.
pub struct HttpSecurityEventSink {
    http_client: reqwest::Client,
    api_url: String,
    publishable_key: String,
}

impl HttpSecurityEventSink {
    pub fn new(api_url: impl Into<String>, publishable_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.into(),
            publishable_key: publishable_key.into(),
        }
    }
}

impl SecurityEventSink for HttpSecurityEventSink {
    fn record(&self, event: SecurityEvent) {
        let client = self.http_client.clone();
        let url = format!("{}/rest/v1/security_events", self.api_url);
        let key = self.publishable_key.clone();

        // Detached append; failures are logged and dropped.
        tokio::spawn(async move {
            let result = client
                .post(&url)
                .header("apikey", &key)
                .header("Content-Type", "application/json")
                .header("Prefer", "return=minimal")
                .json(&event)
                .send()
                .await;
            match result {
                Ok(response) if !response.status().is_success() => {
                    warn!(status = %response.status(), "Security event append rejected");
                }
                Err(err) => {
                    warn!("Security event append failed: {err}");
                }
                _ => {}
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySecurityEventSink::new();
        sink.record(SecurityEvent::new("sign_in_success", "maker@example.com", true));
        sink.record(SecurityEvent::new("sign_in_failed", "maker@example.com", false));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "sign_in_success");
        assert!(events[0].success);
        assert!(!events[1].success);
    }

    #[test]
    fn noop_sink_accepts_events() {
        let sink = NoopSecurityEventSink;
        sink.record(SecurityEvent::new("sign_out", "", true));
    }

    #[tokio::test]
    async fn http_sink_swallows_unreachable_backend() {
        let sink = HttpSecurityEventSink::new("http://127.0.0.1:1", "test-key");
        // Must not panic or surface the connection failure.
        sink.record(SecurityEvent::new("sign_in_failed", "probe", false));
        tokio::task::yield_now().await;
    }
}
