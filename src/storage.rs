use crate::config::{CustomerConfig, EventLog};
use crate::error::{Result, TrackerError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// Storage trait for compiled configs and the append-only event log.
///
/// Configs are a key/value read keyed by customer id; `put_config` replaces
/// the artifact wholesale. A stored config that no longer parses is treated
/// the same as an absent one, so the runtime surfaces a single "no config"
/// condition for both.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_config(&self, customer_id: &str) -> Result<Option<CustomerConfig>>;
    async fn put_config(&self, config: &CustomerConfig) -> Result<()>;

    /// Append one event-log record, assigning its id.
    async fn append_event_log(&self, entry: &mut EventLog) -> Result<()>;
}

/// In-memory storage implementation for development/testing
pub struct InMemoryStorage {
    configs: Arc<Mutex<HashMap<String, CustomerConfig>>>,
    event_log: Arc<Mutex<Vec<EventLog>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            configs: Arc::new(Mutex::new(HashMap::new())),
            event_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Snapshot of the event log, oldest first. Test/observability helper.
    pub fn event_log_entries(&self) -> Vec<EventLog> {
        self.event_log.lock().unwrap().clone()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_config(&self, customer_id: &str) -> Result<Option<CustomerConfig>> {
        let configs = self.configs.lock().unwrap();
        Ok(configs.get(customer_id).cloned())
    }

    async fn put_config(&self, config: &CustomerConfig) -> Result<()> {
        let mut configs = self.configs.lock().unwrap();
        configs.insert(config.customer_id.clone(), config.clone());
        debug!("Stored config for customer {}", config.customer_id);
        Ok(())
    }

    async fn append_event_log(&self, entry: &mut EventLog) -> Result<()> {
        entry.id = Some(Uuid::new_v4());
        let mut log = self.event_log.lock().unwrap();
        log.push(entry.clone());
        debug!(
            "Logged event {} for customer {}",
            entry.event_name, entry.customer_id
        );
        Ok(())
    }
}

/// Filesystem-backed storage: one `config_<customerId>.json` per customer
/// plus an `event_log.jsonl` append file, all under a base directory.
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn config_path(&self, customer_id: &str) -> PathBuf {
        self.base_dir.join(format!("config_{customer_id}.json"))
    }

    fn event_log_path(&self) -> PathBuf {
        self.base_dir.join("event_log.jsonl")
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get_config(&self, customer_id: &str) -> Result<Option<CustomerConfig>> {
        let path = self.config_path(customer_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(e) => {
                warn!(
                    "Stored config for customer {} is unparsable: {}",
                    customer_id, e
                );
                Ok(None)
            }
        }
    }

    async fn put_config(&self, config: &CustomerConfig) -> Result<()> {
        let path = self.config_path(&config.customer_id);
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&path, content)?;
        debug!("Wrote config to {}", path.display());
        Ok(())
    }

    async fn append_event_log(&self, entry: &mut EventLog) -> Result<()> {
        entry.id = Some(Uuid::new_v4());
        let line = serde_json::to_string(entry)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.event_log_path())
            .map_err(|e| TrackerError::Storage {
                message: format!("cannot open event log: {e}"),
            })?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}
