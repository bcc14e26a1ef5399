use crate::constants::supported_platforms;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Outcome of one platform branch, echoed back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    pub message: String,
    pub payload: Value,
}

impl SendResult {
    pub fn failure(message: impl Into<String>, payload: Value) -> Self {
        Self {
            success: false,
            message: message.into(),
            payload,
        }
    }
}

/// Send capability for one downstream ad platform. Authentication, retries
/// and platform error mapping live behind this seam (Conversions API,
/// GA4 Measurement Protocol, Google Ads conversion upload).
#[async_trait]
pub trait PlatformSender: Send + Sync {
    fn platform_name(&self) -> &'static str;

    async fn send(&self, payload: &Value) -> Result<SendResult>;
}

/// Reference sender: emits the resolved payload as a structured log line
/// and always succeeds. Stands in for the real platform endpoints.
pub struct LogSender {
    platform: &'static str,
}

impl LogSender {
    pub fn new(platform: &'static str) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl PlatformSender for LogSender {
    fn platform_name(&self) -> &'static str {
        self.platform
    }

    async fn send(&self, payload: &Value) -> Result<SendResult> {
        info!(platform = self.platform, payload = %payload, "Dispatching conversion payload");
        Ok(SendResult {
            success: true,
            message: format!("payload logged for {}", self.platform),
            payload: payload.clone(),
        })
    }
}

/// HTTP sender: POSTs the resolved payload as JSON to a configured endpoint.
/// No retries and no auth here; those belong to the receiving collaborator.
pub struct HttpSender {
    platform: &'static str,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSender {
    pub fn new(platform: &'static str, endpoint: impl Into<String>) -> Self {
        Self {
            platform,
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PlatformSender for HttpSender {
    fn platform_name(&self) -> &'static str {
        self.platform
    }

    async fn send(&self, payload: &Value) -> Result<SendResult> {
        let response = self.client.post(&self.endpoint).json(payload).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(SendResult {
                success: true,
                message: format!("delivered to {} ({})", self.platform, status.as_u16()),
                payload: payload.clone(),
            })
        } else {
            Ok(SendResult::failure(
                format!("{} endpoint responded with status {}", self.platform, status.as_u16()),
                payload.clone(),
            ))
        }
    }
}

pub type SenderRegistry = HashMap<String, Arc<dyn PlatformSender>>;

/// Log-emitting senders for every supported platform.
pub fn default_senders() -> SenderRegistry {
    supported_platforms()
        .into_iter()
        .map(|platform| {
            (
                platform.to_string(),
                Arc::new(LogSender::new(platform)) as Arc<dyn PlatformSender>,
            )
        })
        .collect()
}

/// Like `default_senders`, but a platform whose `GTM_SENDER_URL_<PLATFORM>`
/// environment variable is set gets an HTTP sender pointed at it instead.
pub fn senders_from_env() -> SenderRegistry {
    supported_platforms()
        .into_iter()
        .map(|platform| {
            let var = format!("GTM_SENDER_URL_{}", platform.to_uppercase());
            let sender: Arc<dyn PlatformSender> = match std::env::var(&var) {
                Ok(endpoint) if !endpoint.trim().is_empty() => {
                    Arc::new(HttpSender::new(platform, endpoint))
                }
                _ => Arc::new(LogSender::new(platform)),
            };
            (platform.to_string(), sender)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn log_sender_echoes_payload() {
        let sender = LogSender::new("facebook");
        let payload = json!({"value_path": 150});
        let result = sender.send(&payload).await.unwrap();
        assert!(result.success);
        assert_eq!(result.payload, payload);
    }

    #[test]
    fn default_registry_covers_all_platforms() {
        let registry = default_senders();
        assert_eq!(registry.len(), 3);
        assert!(registry.contains_key("facebook"));
        assert!(registry.contains_key("ga4"));
        assert!(registry.contains_key("googleAds"));
    }
}
