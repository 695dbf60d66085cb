use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Small durable key-value store, kept as one JSON object on disk
#[derive(Debug, Default)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    values: BTreeMap<String, Value>,
}

impl PreferenceStore {
    /// Load from `path`; a missing file is an empty store
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let values = if path.exists() {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read preferences {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse preferences {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        info!("Loaded {} preferences from {}", values.len(), path.display());

        Ok(Self {
            path: Some(path.to_path_buf()),
            values,
        })
    }

    /// Store that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Typed read; a value of the wrong shape is treated as missing
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Ignoring preference {}: {}", key, e);
                None
            }
        }
    }

    pub fn set(&mut self, key: &str, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Write through a temporary file so a crash never leaves half a file
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.values)?)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        debug!("Saved {} preferences to {}", self.values.len(), path.display());
        Ok(())
    }
}
