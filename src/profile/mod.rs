use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// One row of a controller's device-id to canonical-id table. The table is
/// ordered and bijective so conversions can be reversed.
#[derive(Clone, Debug, Deserialize)]
pub struct ControlIdRow {
    pub device: String,
    pub canonical: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ControllerProfile {
    pub manufacturer: String,
    pub model: String,
    pub id_table: Vec<ControlIdRow>,
}

impl ControllerProfile {
    pub fn canonical_id(&self, device_id: &str) -> Option<&str> {
        self.id_table
            .iter()
            .find(|row| row.device == device_id)
            .map(|row| row.canonical.as_str())
    }

    pub fn device_id(&self, canonical_id: &str) -> Option<&str> {
        self.id_table
            .iter()
            .find(|row| row.canonical == canonical_id)
            .map(|row| row.device.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfileConfig {
    pub controllers: Vec<ControllerProfile>,
}

/// Read-only registry of controller profiles, keyed by model string.
/// Adding a controller means adding a profile to the data file - no code in
/// conversion or orchestration changes.
pub struct ProfileRegistry(HashMap<String, ControllerProfile>);

const EMBEDDED_PROFILES: &str = include_str!("../../data/controllers.yaml");

impl ProfileRegistry {
    pub fn new(config: ProfileConfig) -> ProfileRegistry {
        ProfileRegistry(
            config
                .controllers
                .into_iter()
                .map(|profile| (profile.model.clone(), profile))
                .collect(),
        )
    }

    /// The profiles shipped with the crate.
    pub fn embedded() -> anyhow::Result<ProfileRegistry> {
        Ok(ProfileRegistry::new(parse_yaml(EMBEDDED_PROFILES)?))
    }

    pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> anyhow::Result<ProfileRegistry> {
        let contents = std::fs::read_to_string(path)?;
        Ok(ProfileRegistry::new(parse_yaml(&contents)?))
    }

    pub fn get(&self, model: &str) -> Option<&ControllerProfile> {
        self.0.get(model)
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

fn parse_yaml(contents: &str) -> anyhow::Result<ProfileConfig> {
    // Workaround for merge anchors.
    // Useful for better file readability.
    // https://github.com/dtolnay/serde-yaml/issues/317
    let mut yaml_value: serde_yaml::Value = serde_yaml::from_str(contents)?;
    yaml_value.apply_merge()?;
    Ok(serde_yaml::from_value(yaml_value)?)
}

/// Canonical id for device ids absent from the profile table: the device id
/// lowercased with whitespace removed.
pub fn fallback_canonical_id(device_id: &str) -> String {
    device_id
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_profiles_load() {
        let registry = ProfileRegistry::embedded().unwrap();
        assert!(registry.get("Launch Control XL 3").is_some());
        assert!(registry.get("Launch Control XL").is_some());
        assert!(registry.get("Unknown Controller").is_none());
    }

    #[test]
    fn id_tables_round_trip() {
        let registry = ProfileRegistry::embedded().unwrap();
        for model in ["Launch Control XL 3", "Launch Control XL"] {
            let profile = registry.get(model).unwrap();
            for row in &profile.id_table {
                let canonical = profile.canonical_id(&row.device).unwrap();
                assert_eq!(profile.device_id(canonical), Some(row.device.as_str()));
            }
        }
    }

    #[test]
    fn merge_anchors_expand_shared_fields() {
        let registry = ProfileRegistry::embedded().unwrap();
        let profile = registry.get("Launch Control XL").unwrap();
        assert_eq!(profile.manufacturer, "Novation");
    }

    #[test]
    fn fallback_strips_whitespace_and_lowercases() {
        assert_eq!(fallback_canonical_id("Knob 25"), "knob25");
        assert_eq!(fallback_canonical_id("Custom Pad  3"), "custompad3");
    }
}
