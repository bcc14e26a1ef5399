use crate::config::{EventConfig, EventData, EventLog};
use crate::datalayer::get_from_data_layer;
use crate::error::{Result, TrackerError};
use crate::senders::{SendResult, SenderRegistry};
use crate::storage::Storage;
use chrono::Utc;
use metrics::{counter, histogram};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Extension point for callers that need duplicate-send protection.
///
/// The engine never dedups on the key; when a provider is installed the key
/// is recorded on the event-log entry so an external consumer can. Sending
/// the same event twice still produces two downstream sends.
pub trait IdempotencyKey: Send + Sync {
    fn key(&self, customer_id: &str, event: &EventData) -> Option<String>;
}

/// Config-driven runtime that resolves a live event snapshot against a
/// customer's compiled config and fans the values out to each configured
/// platform sender.
///
/// Stateless across requests: the config is reloaded from storage on every
/// call and nothing is cached here. Host platforms may cache around it.
pub struct UniversalEngine {
    storage: Arc<dyn Storage>,
    senders: SenderRegistry,
    idempotency: Option<Arc<dyn IdempotencyKey>>,
}

impl UniversalEngine {
    pub fn new(storage: Arc<dyn Storage>, senders: SenderRegistry) -> Self {
        Self {
            storage,
            senders,
            idempotency: None,
        }
    }

    pub fn with_idempotency_key(mut self, provider: Arc<dyn IdempotencyKey>) -> Self {
        self.idempotency = Some(provider);
        self
    }

    /// Processes one live event: load config, resolve the event mapping,
    /// dispatch per platform, append an event-log record.
    ///
    /// Returns the per-platform result map, which may contain individual
    /// `success: false` entries. Only two conditions are fatal: no config
    /// for the customer, and an event name with no configured mapping.
    #[instrument(skip(self, event), fields(event_name = %event.event_name))]
    pub async fn process_event(
        &self,
        customer_id: &str,
        event: &EventData,
    ) -> Result<BTreeMap<String, SendResult>> {
        let start = std::time::Instant::now();
        counter!("gtm_events_received_total").increment(1);

        // Step 1: load the customer's config; absent is fatal for this event
        let config = self
            .storage
            .get_config(customer_id)
            .await?
            .ok_or_else(|| TrackerError::ConfigNotFound {
                customer_id: customer_id.to_string(),
            })?;

        // Step 2: exact event-name match only, no fuzzy matching
        let event_config =
            config
                .event(&event.event_name)
                .ok_or_else(|| TrackerError::EventNotConfigured {
                    event_name: event.event_name.clone(),
                })?;

        info!(
            "Processing '{}' for customer {} across {} platform(s)",
            event.event_name,
            customer_id,
            event_config.platform_mappings.len()
        );

        // Step 3: fan out; each branch is independent and log-and-continue
        let results = self.dispatch(event_config, event).await;

        let platforms_sent: Vec<String> = results
            .iter()
            .filter(|(_, result)| result.success)
            .map(|(platform, _)| platform.clone())
            .collect();

        // Step 4: fire-and-forget observability record; failures are
        // reported to the operator channel, never to the caller
        let mut entry = EventLog {
            id: None,
            customer_id: customer_id.to_string(),
            event_name: event.event_name.clone(),
            platforms_sent,
            dedup_key: self
                .idempotency
                .as_ref()
                .and_then(|provider| provider.key(customer_id, event)),
            sent_at: Utc::now(),
        };
        if let Err(e) = self.storage.append_event_log(&mut entry).await {
            warn!("Failed to persist event log entry: {}", e);
            counter!("gtm_event_log_failures_total").increment(1);
        }

        histogram!("gtm_process_event_duration_seconds").record(start.elapsed().as_secs_f64());
        Ok(results)
    }

    async fn dispatch(
        &self,
        event_config: &EventConfig,
        event: &EventData,
    ) -> BTreeMap<String, SendResult> {
        let mut results = BTreeMap::new();

        for (platform, mappings) in &event_config.platform_mappings {
            let payload = resolve_payload(mappings, &event.data_layer);
            debug!(
                "Resolved {} field(s) for platform {}",
                payload.as_object().map_or(0, Map::len),
                platform
            );

            let result = match self.senders.get(platform) {
                Some(sender) => match sender.send(&payload).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!("Send to {} failed: {}", platform, e);
                        counter!("gtm_platform_send_failures_total", "platform" => platform.clone())
                            .increment(1);
                        SendResult::failure(format!("send failed: {e}"), payload)
                    }
                },
                None => {
                    warn!("No sender registered for platform {}", platform);
                    SendResult::failure(format!("no sender registered for {platform}"), payload)
                }
            };

            if result.success {
                counter!("gtm_platform_sends_total", "platform" => platform.clone()).increment(1);
            }
            results.insert(platform.clone(), result);
        }

        results
    }
}

/// Resolves a platform's field mappings against the live snapshot. Fields
/// whose path resolves to nothing are omitted entirely; payloads are sparse
/// and never carry null-valued keys.
fn resolve_payload(mappings: &BTreeMap<String, String>, data_layer: &Value) -> Value {
    let mut payload = Map::new();
    for (field, path) in mappings {
        if let Some(value) = get_from_data_layer(data_layer, path) {
            payload.insert(field.clone(), value.clone());
        }
    }
    Value::Object(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_resolutions_are_omitted_from_payload() {
        let mut mappings = BTreeMap::new();
        mappings.insert("value".to_string(), "ecommerce.total".to_string());
        mappings.insert("currency".to_string(), "ecommerce.currency".to_string());

        let payload = resolve_payload(&mappings, &json!({"ecommerce": {"total": 150}}));
        assert_eq!(payload, json!({"value": 150}));
    }

    #[test]
    fn empty_data_layer_yields_empty_payload() {
        let mut mappings = BTreeMap::new();
        mappings.insert("value".to_string(), "ecommerce.total".to_string());
        assert_eq!(resolve_payload(&mappings, &json!({})), json!({}));
    }
}
