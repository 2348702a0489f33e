use async_trait::async_trait;
use std::collections::HashMap;

use crate::device::model::{
    ConfigurationSlot, ControllerAdapter, ControllerConfiguration, DeviceError, DeviceInfo,
    SlotIndex,
};

/// Adapter backed by a fixed set of in-memory configurations.
pub struct InMemoryAdapter {
    device: DeviceInfo,
    slots: HashMap<SlotIndex, ControllerConfiguration>,
}

impl InMemoryAdapter {
    pub fn new(device: DeviceInfo) -> InMemoryAdapter {
        InMemoryAdapter {
            device,
            slots: HashMap::new(),
        }
    }

    pub fn with_slot(mut self, slot: SlotIndex, config: ControllerConfiguration) -> InMemoryAdapter {
        self.slots.insert(slot, config);
        self
    }
}

#[async_trait]
impl ControllerAdapter for InMemoryAdapter {
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

/// Adapter that never reaches a device.
pub struct Disconnected;

#[async_trait]
impl ControllerAdapter for Disconnected {
    fn device(&self) -> DeviceInfo {
        DeviceInfo {
            manufacturer: "unknown".to_string(),
            model: "unknown".to_string(),
        }
    }

    async fn list_slots(&self) -> Result<Vec<ConfigurationSlot>, DeviceError> {
        Err(DeviceError::Connection("no controller attached".to_string()))
    }

    async fn read_slot(&self, slot: SlotIndex) -> Result<ControllerConfiguration, DeviceError> {
        let _ = slot;
        Err(DeviceError::Connection("no controller attached".to_string()))
    }
}
