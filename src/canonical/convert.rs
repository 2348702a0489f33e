use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::canonical::model::{
    CanonicalMidiMap, ControlDefinition, DeviceRef, MapMetadata, PluginRef, CANONICAL_VERSION,
};
use crate::device::model::{ControllerConfiguration, DeviceInfo};
use crate::midi::model::{Channel, ControlRange};
use crate::profile::{fallback_canonical_id, ProfileRegistry};

#[derive(Clone, Debug, Default)]
pub struct ConvertOptions {
    pub plugin: Option<PluginRef>,
    pub midi_channel: Option<Channel>,
    pub preserve_labels: bool,
    pub device_override: Option<DeviceRef>,
    /// Pins `metadata.date`; `Utc::now()` when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Control '{id}' has no CC assigned. Configuration is not convertible.")]
    MissingCc { id: String },
    #[error("Controls '{first}' and '{second}' both use CC {cc} on channel {channel}.")]
    DuplicateCc {
        first: String,
        second: String,
        cc: u8,
        channel: u8,
    },
}

/// Pure conversion from a device configuration to the canonical schema.
/// Deterministic: identical inputs produce identical output modulo
/// `metadata.date`.
pub struct CanonicalConverter {
    profiles: Arc<ProfileRegistry>,
}

impl CanonicalConverter {
    pub fn new(profiles: Arc<ProfileRegistry>) -> CanonicalConverter {
        CanonicalConverter { profiles }
    }

    pub fn can_convert(&self, config: &ControllerConfiguration) -> bool {
        config.controls.iter().all(|control| control.cc.is_some())
    }

    pub fn convert(
        &self,
        device: &DeviceInfo,
        config: &ControllerConfiguration,
        options: &ConvertOptions,
    ) -> Result<CanonicalMidiMap, ConvertError> {
        let profile = self.profiles.get(&device.model);
        let mut seen: HashMap<(u8, u8), String> = HashMap::new();
        let mut controls = Vec::with_capacity(config.controls.len());

        for control in &config.controls {
            let cc = control.cc.ok_or_else(|| ConvertError::MissingCc {
                id: control.id.clone(),
            })?;
            let channel = control
                .channel
                .or(options.midi_channel)
                .unwrap_or_default();

            let canonical_id = profile
                .and_then(|p| p.canonical_id(&control.id))
                .map(str::to_string)
                .unwrap_or_else(|| fallback_canonical_id(&control.id));

            if let Some(first) = seen.get(&(channel.as_u8(), cc.as_u8())) {
                return Err(ConvertError::DuplicateCc {
                    first: first.clone(),
                    second: canonical_id,
                    cc: cc.as_u8(),
                    channel: channel.as_u8(),
                });
            }
            seen.insert((channel.as_u8(), cc.as_u8()), canonical_id.clone());

            let name = if options.preserve_labels {
                control.name.clone()
            } else {
                Some(title_case(&canonical_id))
            };

            controls.push(ControlDefinition {
                id: canonical_id,
                name,
                control_type: control.control_type,
                cc,
                channel,
                range: control.range.unwrap_or(ControlRange::FULL),
                plugin_parameter: None,
            });
        }

        let device_ref = options.device_override.clone().unwrap_or(DeviceRef {
            manufacturer: device.manufacturer.clone(),
            model: device.model.clone(),
        });

        Ok(CanonicalMidiMap {
            version: CANONICAL_VERSION.to_string(),
            device: device_ref,
            plugin: options.plugin.clone(),
            metadata: MapMetadata {
                name: config.name.clone(),
                description: format!(
                    "Converted from {} custom mode '{}'",
                    device.model, config.name
                ),
                date: options.timestamp.unwrap_or_else(Utc::now),
            },
            midi_channel: options.midi_channel,
            controls,
        })
    }
}

fn title_case(canonical_id: &str) -> String {
    canonical_id
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
