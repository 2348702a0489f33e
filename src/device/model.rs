use crate::extensions::option::OptionExt;
use crate::midi::model::{Cc, Channel, ControlRange, ControlType};

use async_trait::async_trait;
use serde::de::{Error, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Formatter};

pub const SLOT_COUNT: u8 = 16;

/// Index of a stored custom-mode slot on the controller. Valid values are 0..=15.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SlotIndex(u8);

impl SlotIndex {
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    pub fn from_u8(slot: u8) -> Option<SlotIndex> {
        Option::when(slot < SLOT_COUNT, || SlotIndex(slot))
    }

    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (0..SLOT_COUNT).map(SlotIndex)
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

struct SlotIndexVisitor;

impl<'de> Visitor<'de> for SlotIndexVisitor {
    type Value = SlotIndex;

    fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
        formatter.write_str("Expecting slot index to be u8 between 0 and 15.")
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: Error,
    {
        let parse_res = u8::try_from(v).ok().and_then(SlotIndex::from_u8);

        match parse_res {
            None => Err(E::custom(format!(
                "Expecting slot index to be u8 between 0 and 15. Got: {}.",
                v
            ))),
            Some(slot) => Ok(slot),
        }
    }
}

impl<'de> Deserialize<'de> for SlotIndex {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_u8(SlotIndexVisitor)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub manufacturer: String,
    pub model: String,
}

/// One row of slot enumeration. Ephemeral, produced by [`ControllerAdapter::list_slots`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigurationSlot {
    pub index: SlotIndex,
    pub name: Option<String>,
    pub is_empty: bool,
}

/// A single control as stored in the device's custom mode.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControlMapping {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub control_type: ControlType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<Cc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ControlRange>,
}

/// A fully read custom-mode configuration. Immutable once returned by the adapter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControllerConfiguration {
    pub name: String,
    pub controls: Vec<ControlMapping>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Could not connect to controller. Reason: {0}.")]
    Connection(String),
    #[error("Slot {0} is empty.")]
    SlotEmpty(SlotIndex),
    #[error("Reading slot {slot} failed. Reason: {reason}.")]
    SlotRead { slot: SlotIndex, reason: String },
}

/// Port to the physical controller. Implementations wrap the device transport
/// and hand back fully structured configurations.
///
/// Slot reads are short blocking calls on one open connection; callers must
/// not issue them in parallel. An implementation either returns a complete
/// configuration (every control the device declares) or fails - it never
/// returns a partially populated one.
#[async_trait]
pub trait ControllerAdapter {
    fn device(&self) -> DeviceInfo;

    async fn list_slots(&self) -> Result<Vec<ConfigurationSlot>, DeviceError>;

    async fn read_slot(&self, slot: SlotIndex) -> Result<ControllerConfiguration, DeviceError>;
}
