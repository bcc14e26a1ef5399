use anyhow::Result;
use async_trait::async_trait;
use gtm_tracker::config::{CustomerConfig, EventConfig, EventData};
use gtm_tracker::engine::{IdempotencyKey, UniversalEngine};
use gtm_tracker::error::TrackerError;
use gtm_tracker::senders::{default_senders, PlatformSender, SendResult};
use gtm_tracker::storage::{FileStorage, InMemoryStorage, Storage};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

fn field_map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn purchase_config(customer_id: &str) -> CustomerConfig {
    let mut platform_mappings = BTreeMap::new();
    platform_mappings.insert(
        "facebook".to_string(),
        field_map(&[
            ("value", "ecommerce.total"),
            ("currency", "ecommerce.currency"),
        ]),
    );
    CustomerConfig {
        customer_id: customer_id.to_string(),
        container_id: customer_id.to_string(),
        events: vec![EventConfig {
            event_name: "purchase".to_string(),
            platform_mappings,
        }],
        version: "1.0.0".to_string(),
    }
}

fn purchase_event(data_layer: Value) -> EventData {
    EventData {
        event_name: "purchase".to_string(),
        data_layer,
    }
}

struct FailingSender;

#[async_trait]
impl PlatformSender for FailingSender {
    fn platform_name(&self) -> &'static str {
        "facebook"
    }

    async fn send(&self, _payload: &Value) -> gtm_tracker::error::Result<SendResult> {
        Err(TrackerError::Config("endpoint unreachable".to_string()))
    }
}

struct FixedKey;

impl IdempotencyKey for FixedKey {
    fn key(&self, customer_id: &str, event: &EventData) -> Option<String> {
        Some(format!("{customer_id}:{}", event.event_name))
    }
}

#[tokio::test]
async fn fan_out_resolves_only_configured_platforms() -> Result<()> {
    let storage = Arc::new(InMemoryStorage::new());
    storage.put_config(&purchase_config("cust-1")).await?;

    let engine = UniversalEngine::new(storage, default_senders());
    let event = purchase_event(json!({"ecommerce": {"total": 150, "currency": "EUR"}}));
    let results = engine.process_event("cust-1", &event).await?;

    let facebook = results.get("facebook").expect("facebook result");
    assert!(facebook.success);
    assert_eq!(facebook.payload, json!({"value": 150, "currency": "EUR"}));
    assert!(!results.contains_key("ga4"));
    assert!(!results.contains_key("googleAds"));
    Ok(())
}

#[tokio::test]
async fn unresolved_fields_are_omitted_not_null() -> Result<()> {
    let storage = Arc::new(InMemoryStorage::new());
    storage.put_config(&purchase_config("cust-1")).await?;

    let engine = UniversalEngine::new(storage, default_senders());
    let event = purchase_event(json!({"ecommerce": {"total": 150, "currency": null}}));
    let results = engine.process_event("cust-1", &event).await?;

    let payload = &results["facebook"].payload;
    assert_eq!(payload, &json!({"value": 150}));
    assert!(payload.get("currency").is_none());
    Ok(())
}

#[tokio::test]
async fn missing_config_is_fatal() {
    let storage = Arc::new(InMemoryStorage::new());
    let engine = UniversalEngine::new(storage, default_senders());

    let err = engine
        .process_event("unknown-customer", &purchase_event(json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::ConfigNotFound { .. }));
}

#[tokio::test]
async fn unconfigured_event_is_fatal() -> Result<()> {
    let storage = Arc::new(InMemoryStorage::new());
    storage.put_config(&purchase_config("cust-1")).await?;

    let engine = UniversalEngine::new(storage, default_senders());
    let event = EventData {
        event_name: "unconfigured_event".to_string(),
        data_layer: json!({}),
    };
    let err = engine.process_event("cust-1", &event).await.unwrap_err();
    assert!(matches!(err, TrackerError::EventNotConfigured { .. }));
    Ok(())
}

#[tokio::test]
async fn send_failure_does_not_block_sibling_platforms() -> Result<()> {
    let storage = Arc::new(InMemoryStorage::new());

    let mut config = purchase_config("cust-1");
    config.events[0].platform_mappings.insert(
        "ga4".to_string(),
        field_map(&[("value", "ecommerce.total")]),
    );
    storage.put_config(&config).await?;

    let mut senders = default_senders();
    senders.insert("facebook".to_string(), Arc::new(FailingSender));

    let engine = UniversalEngine::new(storage.clone(), senders);
    let event = purchase_event(json!({"ecommerce": {"total": 150}}));
    let results = engine.process_event("cust-1", &event).await?;

    assert!(!results["facebook"].success);
    assert!(results["ga4"].success);

    // Only the successful platform is recorded on the event log
    let entries = storage.event_log_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].platforms_sent, vec!["ga4".to_string()]);
    Ok(())
}

#[tokio::test]
async fn unregistered_platform_yields_failure_entry_not_error() -> Result<()> {
    let storage = Arc::new(InMemoryStorage::new());

    let mut config = purchase_config("cust-1");
    config.events[0].platform_mappings.insert(
        "tiktok".to_string(),
        field_map(&[("value", "ecommerce.total")]),
    );
    storage.put_config(&config).await?;

    let engine = UniversalEngine::new(storage, default_senders());
    let event = purchase_event(json!({"ecommerce": {"total": 150}}));
    let results = engine.process_event("cust-1", &event).await?;

    assert!(!results["tiktok"].success);
    assert!(results["tiktok"].message.contains("no sender registered"));
    assert!(results["facebook"].success);
    Ok(())
}

#[tokio::test]
async fn idempotency_key_is_recorded_but_never_dedups() -> Result<()> {
    let storage = Arc::new(InMemoryStorage::new());
    storage.put_config(&purchase_config("cust-1")).await?;

    let engine = UniversalEngine::new(storage.clone(), default_senders())
        .with_idempotency_key(Arc::new(FixedKey));
    let event = purchase_event(json!({"ecommerce": {"total": 150}}));

    engine.process_event("cust-1", &event).await?;
    engine.process_event("cust-1", &event).await?;

    // Two sends, two log entries, same key: dedup is the caller's problem
    let entries = storage.event_log_entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].dedup_key.as_deref(), Some("cust-1:purchase"));
    assert_eq!(entries[0].dedup_key, entries[1].dedup_key);
    Ok(())
}

#[tokio::test]
async fn unparsable_stored_config_surfaces_as_no_config() -> Result<()> {
    let temp_dir = tempdir()?;
    let storage = Arc::new(FileStorage::new(temp_dir.path())?);

    fs::write(temp_dir.path().join("config_cust-1.json"), "{ broken")?;

    let engine = UniversalEngine::new(storage, default_senders());
    let err = engine
        .process_event("cust-1", &purchase_event(json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::ConfigNotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn file_storage_appends_event_log_lines() -> Result<()> {
    let temp_dir = tempdir()?;
    let storage = Arc::new(FileStorage::new(temp_dir.path())?);
    storage.put_config(&purchase_config("cust-1")).await?;

    let engine = UniversalEngine::new(storage, default_senders());
    let event = purchase_event(json!({"ecommerce": {"total": 150}}));
    engine.process_event("cust-1", &event).await?;
    engine.process_event("cust-1", &event).await?;

    let log = fs::read_to_string(temp_dir.path().join("event_log.jsonl"))?;
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 2);
    let entry: Value = serde_json::from_str(lines[0])?;
    assert_eq!(entry["customerId"], "cust-1");
    assert_eq!(entry["eventName"], "purchase");
    assert_eq!(entry["platformsSent"], json!(["facebook"]));
    Ok(())
}
