//! Persisted user preferences: speech length and alert type.

use crate::model::Preferences;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const KEY_END: &str = "end";
pub const KEY_SIGNAL: &str = "signal";

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("preferences file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("preferences file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("preference '{key}' could not be encoded: {source}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value {value:?} for preference '{key}'")]
    InvalidValue { key: &'static str, value: String },
}

/// Key-value storage for scalar preferences.
pub trait PreferenceStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, PrefsError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PrefsError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A flat JSON object on disk, rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/debate-timer/preferences.json`, or the working directory as a fallback.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("debate-timer"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("preferences.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, PrefsError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(PrefsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&content).map_err(|source| PrefsError::Json {
            path: self.path.clone(),
            source,
        })
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PrefsError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        // A corrupt file is replaced rather than blocking every later save.
        let mut values = self.read_all().unwrap_or_default();
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| PrefsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(&values).map_err(|source| PrefsError::Json {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, json).map_err(|source| PrefsError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Stored text of a preference value, from its serde name.
fn encode<T: Serialize>(key: &'static str, value: &T) -> Result<String, PrefsError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(text)) => Ok(text),
        Ok(other) => Err(PrefsError::InvalidValue {
            key,
            value: other.to_string(),
        }),
        Err(source) => Err(PrefsError::Encode { key, source }),
    }
}

/// Parse stored text back through the serde name; case and surrounding space are ignored.
fn decode<T: DeserializeOwned>(key: &'static str, raw: &str) -> Result<T, PrefsError> {
    let text = raw.trim().to_ascii_lowercase();
    serde_json::from_value(serde_json::Value::String(text)).map_err(|_| {
        PrefsError::InvalidValue {
            key,
            value: raw.to_string(),
        }
    })
}

/// Read one key, falling back to the default on any failure.
fn load_or_default<T: Default + DeserializeOwned>(
    store: &dyn PreferenceStore,
    key: &'static str,
) -> T {
    match store.get(key) {
        Ok(Some(raw)) => decode(key, &raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default preference");
            T::default()
        }),
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!(error = %e, key, "could not read preference, using default");
            T::default()
        }
    }
}

impl Preferences {
    pub fn load(store: &dyn PreferenceStore) -> Self {
        Self {
            length: load_or_default(store, KEY_END),
            signal: load_or_default(store, KEY_SIGNAL),
        }
    }

    pub fn save(&self, store: &mut dyn PreferenceStore) -> Result<(), PrefsError> {
        store.set(KEY_END, &encode(KEY_END, &self.length)?)?;
        store.set(KEY_SIGNAL, &encode(KEY_SIGNAL, &self.signal)?)
    }
}
