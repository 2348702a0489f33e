use crate::extensions::option::OptionExt;

use serde::de::{Error, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{self, Formatter};

const U8_MSB_EXTRACTOR: u8 = 0x80;

/// A MIDI continuous-controller number. Valid values are 0..=127.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Cc(u8);

impl Cc {
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    pub fn from_u8(cc: u8) -> Option<Cc> {
        Option::when(cc & U8_MSB_EXTRACTOR == 0, || Cc(cc))
    }
}

impl fmt::Display for Cc {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

struct CcVisitor;

impl<'de> Visitor<'de> for CcVisitor {
    type Value = Cc;

    fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
        formatter.write_str("Expecting CC number to be u8 between 0 and 127.")
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: Error,
    {
        let parse_res = u8::try_from(v).ok().and_then(Cc::from_u8);

        match parse_res {
            None => Err(E::custom(format!(
                "Expecting CC number to be u8 between 0 and 127. Got: {}.",
                v
            ))),
            Some(cc) => Ok(cc),
        }
    }
}

impl<'de> Deserialize<'de> for Cc {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_u8(CcVisitor)
    }
}

/// A MIDI channel. Valid values are 0..=15.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Channel(u8);

const CHANNEL_MAX: u8 = 0x0F;

impl Channel {
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    pub fn from_u8(ch: u8) -> Option<Channel> {
        Option::when(ch <= CHANNEL_MAX, || Channel(ch))
    }
}

impl Default for Channel {
    fn default() -> Self {
        Channel(0)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

struct ChannelVisitor;

impl<'de> Visitor<'de> for ChannelVisitor {
    type Value = Channel;

    fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
        formatter.write_str("Expecting MIDI channel to be u8 between 0 and 15.")
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: Error,
    {
        let parse_res = u8::try_from(v).ok().and_then(Channel::from_u8);

        match parse_res {
            None => Err(E::custom(format!(
                "Expecting MIDI channel to be u8 between 0 and 15. Got: {}.",
                v
            ))),
            Some(ch) => Ok(ch),
        }
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_u8(ChannelVisitor)
    }
}

/// Physical control kind as reported by the controller's custom-mode dump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    Encoder,
    Slider,
    Button,
    ButtonGroup,
}

impl ControlType {
    pub fn is_button(&self) -> bool {
        matches!(self, ControlType::Button | ControlType::ButtonGroup)
    }
}

/// Value range of a control, serialized as `[min, max]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRange(pub i32, pub i32);

impl ControlRange {
    pub const FULL: ControlRange = ControlRange(0, 127);

    pub fn min(&self) -> i32 {
        self.0
    }

    pub fn max(&self) -> i32 {
        self.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cc_accepts_seven_bit_values_only() {
        assert_eq!(Cc::from_u8(0).map(|c| c.as_u8()), Some(0));
        assert_eq!(Cc::from_u8(127).map(|c| c.as_u8()), Some(127));
        assert!(Cc::from_u8(128).is_none());
        assert!(Cc::from_u8(255).is_none());
    }

    #[test]
    fn channel_accepts_four_bit_values_only() {
        assert_eq!(Channel::from_u8(0).map(|c| c.as_u8()), Some(0));
        assert_eq!(Channel::from_u8(15).map(|c| c.as_u8()), Some(15));
        assert!(Channel::from_u8(16).is_none());
    }

    #[test]
    fn cc_deserialization_rejects_out_of_range() {
        assert!(serde_yaml::from_str::<Cc>("13").is_ok());
        assert!(serde_yaml::from_str::<Cc>("128").is_err());
    }

    #[test]
    fn channel_deserialization_rejects_out_of_range() {
        assert!(serde_yaml::from_str::<Channel>("15").is_ok());
        assert!(serde_yaml::from_str::<Channel>("16").is_err());
    }

    #[test]
    fn control_range_round_trips_as_pair() {
        let yaml = serde_yaml::to_string(&ControlRange(0, 127)).unwrap();
        let parsed: ControlRange = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, ControlRange(0, 127));
    }
}
