// Session state store - the per-session key/value substrate shared by every
// component. Values are arbitrary JSON so the planning layer can read them
// without knowing component internals.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

/// Well-known session keys written by the components.
///
/// The planning layer reads these directly, so the names are part of the
/// contract and stay stable across releases.
pub mod keys {
    pub const SECURITY_LOG: &str = "security_log";
    pub const SECURITY_WARNINGS: &str = "security_warnings";
    pub const SECURITY_COUNTERS: &str = "security_counters";
    pub const QUERY_LOG: &str = "search_security_log";

    pub const SEARCH_HISTORY: &str = "search_history";
    pub const SEARCH_COUNTERS: &str = "search_counters";
    pub const LAST_SEARCH_RESULTS: &str = "last_search_results";
    pub const LAST_FILE_SEARCH_RESULTS: &str = "last_file_search_results";
    pub const LAST_SEARCH_QUERY: &str = "last_search_query";
    pub const DISCOVERED_FILES: &str = "discovered_files";
    pub const FILE_CONTEXTS: &str = "file_contexts";
    pub const LAST_ANALYZED_FILE: &str = "last_analyzed_file";

    pub const INDEX_STATUS: &str = "index_status";
    pub const INDEXED_FILES: &str = "indexed_files";
    pub const INDEXING_LOG: &str = "indexing_log";
    pub const INDEXING_COUNTERS: &str = "indexing_counters";

    pub const FILE_DIAGNOSTICS: &str = "file_diagnostics";
    pub const CODE_VALIDATIONS: &str = "code_validations";
    pub const VALIDATION_LOG: &str = "validation_log";
    pub const VALIDATION_COUNTERS: &str = "validation_counters";
}

/// Keyed store of structured values scoped to one agent session.
///
/// Reads always observe the latest completed write for this session. The
/// store itself enforces no bounds on list values; writers append through
/// [`SessionState::append_capped`], which is the one shared implementation
/// of the truncate-on-append ring buffer every log key uses.
pub struct SessionState {
    id: String,
    values: Mutex<HashMap<String, Value>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            values: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Read and deserialize the value under `key`. Returns `None` when the
    /// key is absent or the stored shape does not match `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.lock().get(key)?.clone();
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!("Session value under '{}' has unexpected shape: {}", key, e);
                None
            }
        }
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(v) => {
                self.lock().insert(key.to_string(), v);
            }
            Err(e) => warn!("Session value for '{}' is not serializable: {}", key, e),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Append `entry` to the list under `key`, evicting the oldest entries
    /// once the list grows past `cap`. The stored shape stays a plain array.
    pub fn append_capped<T: Serialize>(&self, key: &str, entry: &T, cap: usize) {
        let entry = match serde_json::to_value(entry) {
            Ok(v) => v,
            Err(e) => {
                warn!("Log entry for '{}' is not serializable: {}", key, e);
                return;
            }
        };

        let mut values = self.lock();
        let slot = values
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match slot {
            Value::Array(items) => {
                items.push(entry);
                if items.len() > cap {
                    let excess = items.len() - cap;
                    items.drain(..excess);
                }
            }
            other => {
                warn!("Session value under '{}' is not a list, resetting", key);
                *other = Value::Array(vec![entry]);
            }
        }
    }

    /// Increment the named counter inside the counter map under `key`,
    /// creating map and counter as needed.
    pub fn increment(&self, key: &str, counter: &str) {
        let mut values = self.lock();
        let slot = values
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        match slot {
            Value::Object(fields) => {
                let current = fields.get(counter).and_then(Value::as_u64).unwrap_or(0);
                fields.insert(counter.to_string(), Value::from(current + 1));
            }
            other => {
                warn!("Session value under '{}' is not a counter map, resetting", key);
                let mut fields = serde_json::Map::new();
                fields.insert(counter.to_string(), Value::from(1u64));
                *other = Value::Object(fields);
            }
        }
    }

    /// Counter map under `key`, empty when never written.
    pub fn counters(&self, key: &str) -> HashMap<String, u64> {
        self.get(key).unwrap_or_default()
    }

    /// Last `n` entries of the list under `key`, oldest first. Entries that
    /// no longer deserialize as `T` are skipped.
    pub fn tail_as<T: DeserializeOwned>(&self, key: &str, n: usize) -> Vec<T> {
        let entries: Vec<Value> = self.get(key).unwrap_or_default();
        let skip = entries.len().saturating_sub(n);
        entries
            .into_iter()
            .skip(skip)
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        match self.values.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Session state mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
