use crate::constants::{
    CONFIG_VERSION, DEFAULT_CURRENCY, FACEBOOK_PLATFORM, GA4_PLATFORM, GOOGLE_ADS_PLATFORM,
};
use crate::extractor::MacroDefinitions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Flat map of output-field-name → dataLayer path (or literal fallback).
pub type FieldMappings = BTreeMap<String, String>;

/// Per-event mapping onto downstream ad platforms. A platform key is present
/// only when pattern detection found enough supporting data to emit it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventConfig {
    pub event_name: String,
    pub platform_mappings: BTreeMap<String, FieldMappings>,
}

/// Compiled, versioned per-customer artifact. Created once per compile and
/// replaced wholesale on re-compilation; the runtime's single source of truth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerConfig {
    pub customer_id: String,
    pub container_id: String,
    pub events: Vec<EventConfig>,
    pub version: String,
}

impl CustomerConfig {
    pub fn event(&self, event_name: &str) -> Option<&EventConfig> {
        self.events.iter().find(|e| e.event_name == event_name)
    }
}

/// Live event snapshot supplied by the caller at request time. The dataLayer
/// is arbitrary untyped JSON and is never mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    pub event_name: String,
    pub data_layer: Value,
}

/// Append-only observability record written once per processed event. Never
/// consulted by later processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLog {
    pub id: Option<Uuid>,
    pub customer_id: String,
    pub event_name: String,
    pub platforms_sent: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup_key: Option<String>,
    pub sent_at: DateTime<Utc>,
}

// Candidate macro names per detection probe, matched case-insensitively in
// list order against the ordered macro definitions.
const PURCHASE_VALUE_CANDIDATES: &[&str] = &["purchase value", "order total", "revenue"];
const CURRENCY_CANDIDATES: &[&str] = &["currency code", "currency"];
const EMAIL_CANDIDATES: &[&str] = &["email address", "email", "emailaddress"];
const PHONE_CANDIDATES: &[&str] = &["phone number", "phone", "phonenumber"];
const PRODUCT_ID_CANDIDATES: &[&str] = &["product id", "item id", "productid"];
const PRODUCT_NAME_CANDIDATES: &[&str] = &["product name", "item name", "productname"];

/// First candidate with any case-insensitive exact-name match wins. Both the
/// candidate list and the definitions iterate in a fixed order, so lookups
/// are fully deterministic.
fn find_path(definitions: &MacroDefinitions, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|candidate| {
        definitions
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(candidate))
            .map(|(_, path)| path.to_string())
    })
}

fn fields(entries: &[(&str, &str)]) -> FieldMappings {
    entries
        .iter()
        .map(|(field, path)| (field.to_string(), path.to_string()))
        .collect()
}

/// Runs the independent commerce-event probes over the extracted bindings.
/// Probes are order-insensitive with respect to each other; output order is
/// fixed for a stable artifact.
pub fn detect_event_patterns(definitions: &MacroDefinitions) -> Vec<EventConfig> {
    let mut events = Vec::new();

    if let Some(event) = detect_purchase(definitions) {
        events.push(event);
    }
    if let Some(event) = detect_lead(definitions) {
        events.push(event);
    }
    if let Some(event) = detect_view_item(definitions) {
        events.push(event);
    }

    events
}

fn detect_purchase(definitions: &MacroDefinitions) -> Option<EventConfig> {
    let value_path = find_path(definitions, PURCHASE_VALUE_CANDIDATES)?;
    let currency_path =
        find_path(definitions, CURRENCY_CANDIDATES).unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    debug!("Detected purchase pattern, value path '{}'", value_path);

    let mut platform_mappings = BTreeMap::new();
    let value_and_currency = fields(&[
        ("value_path", value_path.as_str()),
        ("currency_path", currency_path.as_str()),
    ]);
    platform_mappings.insert(FACEBOOK_PLATFORM.to_string(), value_and_currency.clone());
    platform_mappings.insert(GA4_PLATFORM.to_string(), value_and_currency);
    platform_mappings.insert(
        GOOGLE_ADS_PLATFORM.to_string(),
        fields(&[("conversion_value", value_path.as_str())]),
    );

    Some(EventConfig {
        event_name: "purchase".to_string(),
        platform_mappings,
    })
}

fn detect_lead(definitions: &MacroDefinitions) -> Option<EventConfig> {
    let email_path = find_path(definitions, EMAIL_CANDIDATES);
    let phone_path = find_path(definitions, PHONE_CANDIDATES);
    if email_path.is_none() && phone_path.is_none() {
        return None;
    }

    // The missing contact path is written as an empty string on purpose so
    // downstream senders see a present-but-empty field, not a missing key.
    let email_path = email_path.unwrap_or_default();
    let phone_path = phone_path.unwrap_or_default();

    debug!("Detected lead pattern");

    let contact = fields(&[
        ("email_path", email_path.as_str()),
        ("phone_path", phone_path.as_str()),
    ]);
    let mut platform_mappings = BTreeMap::new();
    platform_mappings.insert(FACEBOOK_PLATFORM.to_string(), contact.clone());
    platform_mappings.insert(GA4_PLATFORM.to_string(), contact);

    Some(EventConfig {
        event_name: "lead".to_string(),
        platform_mappings,
    })
}

fn detect_view_item(definitions: &MacroDefinitions) -> Option<EventConfig> {
    let product_id_path = find_path(definitions, PRODUCT_ID_CANDIDATES);
    let product_name_path = find_path(definitions, PRODUCT_NAME_CANDIDATES);

    // The pattern fires on either signal, but each platform's fields are
    // gated separately: both facebook and ga4 require a product id.
    if product_id_path.is_none() && product_name_path.is_none() {
        return None;
    }

    debug!("Detected view_item pattern");

    let mut platform_mappings = BTreeMap::new();
    if let Some(id_path) = &product_id_path {
        platform_mappings.insert(
            FACEBOOK_PLATFORM.to_string(),
            fields(&[("item_id_path", id_path.as_str())]),
        );

        let mut ga4_fields = fields(&[("item_id_path", id_path.as_str())]);
        if let Some(name_path) = &product_name_path {
            ga4_fields.insert("item_name_path".to_string(), name_path.clone());
        }
        platform_mappings.insert(GA4_PLATFORM.to_string(), ga4_fields);
    }

    Some(EventConfig {
        event_name: "view_item".to_string(),
        platform_mappings,
    })
}

/// Placeholder seam for future GTM API correlation; currently the container
/// id is the customer id.
pub fn extract_container_id(customer_id: &str) -> String {
    customer_id.to_string()
}

/// Builds the complete replacement artifact for a customer from its
/// extracted macro bindings.
pub fn generate_config(customer_id: &str, definitions: &MacroDefinitions) -> CustomerConfig {
    let events = detect_event_patterns(definitions);
    info!(
        "Generated config for customer {} with {} event pattern(s)",
        customer_id,
        events.len()
    );

    CustomerConfig {
        customer_id: customer_id.to_string(),
        container_id: extract_container_id(customer_id),
        events,
        version: CONFIG_VERSION.to_string(),
    }
}
