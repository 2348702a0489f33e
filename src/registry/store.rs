use log::warn;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::registry::model::{MappingRegistry, RegistryEntry};

const WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Registry write to {path} failed after {attempts} attempts. Reason: {reason}.")]
    WriteConflict {
        path: PathBuf,
        attempts: u32,
        reason: String,
    },
    #[error("Registry serialization failed. Reason: {0}.")]
    Serialize(#[from] serde_json::Error),
}

/// Persistent JSON store for the runtime [`MappingRegistry`].
///
/// Every mutation is a fresh read-modify-write: load the file, replace the
/// entry at its key, bump `lastUpdated`, write a sibling temp file and rename
/// it over the target. The internal mutex serializes writers within this
/// process; the rename keeps readers from ever observing a partial file.
pub struct RegistryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RegistryStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> RegistryStore {
        RegistryStore {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current registry contents. An absent file is an empty registry; a
    /// corrupt one is replaced by an empty registry on the next write.
    pub fn load(&self) -> MappingRegistry {
        match std::fs::read_to_string(&self.path) {
            Err(_) => MappingRegistry::empty(),
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(registry) => registry,
                Err(error) => {
                    warn!(
                        "Registry {} is corrupt ({error}); starting from an empty registry.",
                        self.path.display()
                    );
                    MappingRegistry::empty()
                }
            },
        }
    }

    /// Replace the entry at `key` and persist atomically.
    pub async fn upsert(&self, key: &str, entry: RegistryEntry) -> Result<(), RegistryError> {
        let _guard = self.write_lock.lock().await;

        let mut last_reason = String::new();
        for _ in 0..WRITE_ATTEMPTS {
            let mut registry = self.load();
            registry.upsert(key.to_string(), entry.clone());
            match self.write_atomic(&registry) {
                Ok(()) => return Ok(()),
                Err(error) => last_reason = error.to_string(),
            }
        }

        Err(RegistryError::WriteConflict {
            path: self.path.clone(),
            attempts: WRITE_ATTEMPTS,
            reason: last_reason,
        })
    }

    fn write_atomic(&self, registry: &MappingRegistry) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(registry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)
    }
}
