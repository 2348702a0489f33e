use async_trait::async_trait;
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::canonical::model::CanonicalMidiMap;
use crate::deploy::{DawDeployer, DeployError, DeployOptions, DeploymentResult};
use crate::registry::model::{entry_key, CcMapping, ControllerRef, Curve, RegistryEntry};
use crate::registry::store::RegistryStore;

/// Deploys a canonical map into the runtime mapping registry consumed by the
/// Ableton Live remote-script loader. One registry entry per
/// controller/plugin pair, replaced wholesale on every deploy.
pub struct LiveDeployer {
    store: Arc<RegistryStore>,
}

impl LiveDeployer {
    pub fn new(store: Arc<RegistryStore>) -> LiveDeployer {
        LiveDeployer { store }
    }

    pub fn entry_for(map: &CanonicalMidiMap) -> (String, RegistryEntry) {
        let plugin_or_mode = map
            .plugin
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or(map.metadata.name.as_str());
        let key = entry_key(&map.device.model, plugin_or_mode);

        // deviceIndex is the control's position within the canonical map,
        // not anything parsed out of its textual id.
        let mappings: BTreeMap<_, _> = map
            .controls
            .iter()
            .enumerate()
            .map(|(position, control)| {
                (
                    control.cc,
                    CcMapping {
                        device_index: position as u32,
                        parameter_index: control.plugin_parameter,
                        parameter_name: control
                            .name
                            .clone()
                            .unwrap_or_else(|| control.id.clone()),
                        curve: Curve::Linear,
                    },
                )
            })
            .collect();

        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), "controlmap".to_string());
        metadata.insert("mode".to_string(), map.metadata.name.clone());

        let entry = RegistryEntry {
            controller: ControllerRef {
                manufacturer: map.device.manufacturer.clone(),
                model: map.device.model.clone(),
            },
            plugin_name: plugin_or_mode.to_string(),
            plugin_manufacturer: map.plugin.as_ref().and_then(|p| p.manufacturer.clone()),
            mappings,
            metadata,
        };
        (key, entry)
    }
}

#[async_trait]
impl DawDeployer for LiveDeployer {
    fn daw_name(&self) -> &'static str {
        "live"
    }

    async fn deploy(
        &self,
        map: &CanonicalMidiMap,
        options: &DeployOptions,
    ) -> Result<DeploymentResult, DeployError> {
        let (key, entry) = Self::entry_for(map);

        if options.dry_run {
            info!(
                "Dry run: skipping registry update for '{key}' in {}.",
                self.store.path().display()
            );
            return Ok(DeploymentResult {
                success: true,
                daw_name: self.daw_name().to_string(),
                output_path: Some(self.store.path().to_path_buf()),
                installed: false,
                errors: Vec::new(),
                warnings: Vec::new(),
            });
        }

        self.store.upsert(&key, entry).await?;

        Ok(DeploymentResult {
            success: true,
            daw_name: self.daw_name().to_string(),
            output_path: Some(self.store.path().to_path_buf()),
            installed: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        })
    }
}
