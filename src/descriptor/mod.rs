use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::registry::model::slug;

/// Plugin identity as recorded by the offline descriptor generator.
#[derive(Clone, Debug, Deserialize)]
pub struct PluginInfo {
    pub manufacturer: String,
    pub name: String,
    #[serde(default)]
    pub format: Option<String>,
}

/// One automatable parameter. Descriptor files carry more fields (label,
/// unit, default, type); only the ones matching needs are read.
#[derive(Clone, Debug, Deserialize)]
pub struct PluginParameter {
    pub index: u32,
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
}

/// Read-only parameter descriptor produced by the offline plugin scanner.
#[derive(Clone, Debug, Deserialize)]
pub struct PluginDescriptor {
    pub plugin: PluginInfo,
    pub parameters: Vec<PluginParameter>,
}

impl PluginDescriptor {
    pub fn parameter(&self, index: u32) -> Option<&PluginParameter> {
        self.parameters.iter().find(|p| p.index == index)
    }

    fn validate(self) -> Result<PluginDescriptor, DescriptorError> {
        let mut seen = HashSet::new();
        for parameter in &self.parameters {
            if !seen.insert(parameter.index) {
                return Err(DescriptorError::DuplicateIndex {
                    plugin: self.plugin.name.clone(),
                    index: parameter.index,
                });
            }
        }
        Ok(self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("No descriptor for plugin '{plugin}' under {dir}.")]
    NotFound { plugin: String, dir: PathBuf },
    #[error("Could not read descriptor {path}. Reason: {source}.")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Descriptor {path} is not valid JSON. Reason: {source}.")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Descriptor for '{plugin}' repeats parameter index {index}.")]
    DuplicateIndex { plugin: String, index: u32 },
}

/// A directory of descriptor JSON files, named
/// `<manufacturer-slug>-<plugin-slug>.json` by the generator tool.
pub struct DescriptorCatalog {
    dir: PathBuf,
}

impl DescriptorCatalog {
    pub fn new<P: Into<PathBuf>>(dir: P) -> DescriptorCatalog {
        DescriptorCatalog { dir: dir.into() }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<PluginDescriptor, DescriptorError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let descriptor: PluginDescriptor =
            serde_json::from_str(&contents).map_err(|source| DescriptorError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        descriptor.validate()
    }

    /// Resolve a plugin name against the catalog. Matches a file whose stem
    /// ends with the plugin's slug, so both `tal-j-8.json` and
    /// `tal-togu-audio-line-tal-j-8.json` resolve "TAL-J-8".
    pub fn find(&self, plugin_name: &str) -> Result<PluginDescriptor, DescriptorError> {
        let wanted = slug(plugin_name);
        let entries = std::fs::read_dir(&self.dir).map_err(|source| DescriptorError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map(|ext| ext == "json").unwrap_or(false))
            .filter(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(|stem| stem == wanted || stem.ends_with(&format!("-{}", wanted)))
                    .unwrap_or(false)
            })
            .collect();
        candidates.sort();

        match candidates.first() {
            Some(path) => Self::load(path),
            None => Err(DescriptorError::NotFound {
                plugin: plugin_name.to_string(),
                dir: self.dir.clone(),
            }),
        }
    }
}
