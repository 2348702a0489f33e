use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::midi::model::{Cc, Channel, ControlRange, ControlType};

pub const CANONICAL_VERSION: &str = "1.0.0";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRef {
    pub manufacturer: String,
    pub model: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapMetadata {
    pub name: String,
    pub description: String,
    pub date: DateTime<Utc>,
}

/// One control of the canonical map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControlDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub control_type: ControlType,
    pub cc: Cc,
    pub channel: Channel,
    pub range: ControlRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_parameter: Option<u32>,
}

/// The device-agnostic intermediate representation every deployer consumes.
///
/// Invariants: `controls` is non-empty and `(channel, cc)` pairs are unique.
/// Both are enforced at construction by the converter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CanonicalMidiMap {
    pub version: String,
    pub device: DeviceRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<PluginRef>,
    pub metadata: MapMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midi_channel: Option<Channel>,
    pub controls: Vec<ControlDefinition>,
}

impl CanonicalMidiMap {
    /// Attach a matched plugin parameter to the control at `cc`.
    /// Returns false when no control carries that cc.
    pub fn set_plugin_parameter(&mut self, cc: Cc, parameter_index: u32) -> bool {
        match self.controls.iter_mut().find(|c| c.cc == cc) {
            Some(control) => {
                control.plugin_parameter = Some(parameter_index);
                true
            }
            None => false,
        }
    }

    pub fn matched_controls(&self) -> usize {
        self.controls
            .iter()
            .filter(|c| c.plugin_parameter.is_some())
            .count()
    }

    pub fn to_yaml(&self) -> serde_yaml::Result<String> {
        serde_yaml::to_string(self)
    }

    pub fn write_yaml<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = self.to_yaml()?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> anyhow::Result<CanonicalMidiMap> {
        let map_file = std::fs::File::open(path)?;
        Ok(serde_yaml::from_reader(map_file)?)
    }
}
