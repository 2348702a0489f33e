use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::device::model::{
    ConfigurationSlot, ControllerAdapter, ControllerConfiguration, DeviceError, DeviceInfo,
    SlotIndex,
};

/// On-disk form of a device snapshot: the structured dump the transport layer
/// produces when it exports a controller's custom modes.
#[derive(Debug, Deserialize)]
pub struct DeviceSnapshot {
    pub device: DeviceInfo,
    pub slots: Vec<SnapshotSlot>,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotSlot {
    pub index: SlotIndex,
    #[serde(flatten)]
    pub configuration: ControllerConfiguration,
}

/// Adapter over an exported device snapshot file. This is the offline
/// workflow: the transport layer (external to this crate) dumps the device
/// once, and every subsequent deploy works from the dump.
pub struct SnapshotAdapter {
    device: DeviceInfo,
    slots: HashMap<SlotIndex, ControllerConfiguration>,
}

impl SnapshotAdapter {
    pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> anyhow::Result<SnapshotAdapter> {
        let snapshot_file = std::fs::File::open(path)?;
        let snapshot: DeviceSnapshot = serde_yaml::from_reader(snapshot_file)?;
        Ok(SnapshotAdapter {
            device: snapshot.device,
            slots: snapshot
                .slots
                .into_iter()
                .map(|slot| (slot.index, slot.configuration))
                .collect(),
        })
    }
}

#[async_trait]
impl ControllerAdapter for SnapshotAdapter {
    fn device(&self) -> DeviceInfo {
        self.device.clone()
    }

    async fn list_slots(&self) -> Result<Vec<ConfigurationSlot>, DeviceError> {
        Ok(SlotIndex::all()
            .map(|index| match self.slots.get(&index) {
                Some(config) => ConfigurationSlot {
                    index,
                    name: Some(config.name.clone()),
                    is_empty: false,
                },
                None => ConfigurationSlot {
                    index,
                    name: None,
                    is_empty: true,
                },
            })
            .collect())
    }

    async fn read_slot(&self, slot: SlotIndex) -> Result<ControllerConfiguration, DeviceError> {
        self.slots
            .get(&slot)
            .cloned()
            .ok_or(DeviceError::SlotEmpty(slot))
    }
}
