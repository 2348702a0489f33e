use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::midi::model::Cc;

pub const REGISTRY_VERSION: &str = "1.0";

/// Normalized key fragment: lowercased, whitespace runs collapsed to `-`,
/// other punctuation dropped.
pub fn slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_separator = false;
    for c in input.chars() {
        if c.is_whitespace() {
            pending_separator = !out.is_empty();
        } else if c.is_ascii_alphanumeric() || c == '-' {
            if pending_separator {
                out.push('-');
                pending_separator = false;
            }
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Registry lookup key for a controller/plugin pair.
pub fn entry_key(controller_model: &str, plugin_name: &str) -> String {
    format!("{}_{}", slug(controller_model), slug(plugin_name))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerRef {
    pub manufacturer: String,
    pub model: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    #[default]
    Linear,
    Exponential,
    Logarithmic,
}

/// Binding of one CC to one plugin parameter. `parameter_index` is absent
/// when no trusted match existed and the fallback heuristic was disabled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CcMapping {
    pub device_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_index: Option<u32>,
    pub parameter_name: String,
    #[serde(default)]
    pub curve: Curve,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub controller: ControllerRef,
    pub plugin_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_manufacturer: Option<String>,
    pub mappings: BTreeMap<Cc, CcMapping>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// The runtime half of the dual-tier mapping store. Long-lived, rewritten
/// wholesale on every Live deployment.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRegistry {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    pub mappings: BTreeMap<String, RegistryEntry>,
}

impl MappingRegistry {
    pub fn empty() -> MappingRegistry {
        MappingRegistry {
            version: REGISTRY_VERSION.to_string(),
            last_updated: Utc::now(),
            mappings: BTreeMap::new(),
        }
    }

    /// Whole-entry upsert: the previous entry at `key`, if any, is discarded.
    pub fn upsert(&mut self, key: String, entry: RegistryEntry) {
        self.mappings.insert(key, entry);
        self.last_updated = Utc::now();
    }
}

/// Dual-tier merge: key-granular, whole-entry precedence. For a key present
/// in both tiers the runtime entry wins outright; keys unique to either tier
/// are kept. There is deliberately no per-CC union - a runtime deploy that
/// covers fewer CCs than the build-time map must shadow it completely.
pub fn merge(build_time: MappingRegistry, runtime: MappingRegistry) -> MappingRegistry {
    let mut mappings = build_time.mappings;
    mappings.extend(runtime.mappings);
    MappingRegistry {
        version: runtime.version,
        last_updated: build_time.last_updated.max(runtime.last_updated),
        mappings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_normalizes_case_whitespace_and_punctuation() {
        assert_eq!(slug("Launch Control XL 3"), "launch-control-xl-3");
        assert_eq!(slug("TAL-J-8"), "tal-j-8");
        assert_eq!(slug("Jup-8  V3"), "jup-8-v3");
        assert_eq!(slug("  padded  "), "padded");
        assert_eq!(slug("Plugin (Mono)"), "plugin-mono");
    }

    #[test]
    fn entry_key_joins_slugs_with_underscore() {
        assert_eq!(
            entry_key("Launch Control XL 3", "TAL-J-8"),
            "launch-control-xl-3_tal-j-8"
        );
    }

    fn entry(plugin: &str, ccs: &[u8]) -> RegistryEntry {
        RegistryEntry {
            controller: ControllerRef {
                manufacturer: "Novation".to_string(),
                model: "Launch Control XL 3".to_string(),
            },
            plugin_name: plugin.to_string(),
            plugin_manufacturer: None,
            mappings: ccs
                .iter()
                .map(|&cc| {
                    (
                        Cc::from_u8(cc).unwrap(),
                        CcMapping {
                            device_index: cc as u32,
                            parameter_index: Some(cc as u32),
                            parameter_name: format!("param {cc}"),
                            curve: Curve::Linear,
                        },
                    )
                })
                .collect(),
            metadata: BTreeMap::new(),
        }
    }

    fn registry(entries: Vec<(&str, RegistryEntry)>) -> MappingRegistry {
        let mut registry = MappingRegistry::empty();
        for (key, entry) in entries {
            registry.mappings.insert(key.to_string(), entry);
        }
        registry
    }

    #[test]
    fn merge_replaces_whole_entries_runtime_wins() {
        let build_time = registry(vec![
            ("a_x", entry("X", &[10, 11, 12])),
            ("a_y", entry("Y", &[20])),
        ]);
        let runtime = registry(vec![("a_x", entry("X", &[10]))]);

        let merged = merge(build_time, runtime);
        assert_eq!(merged.mappings.len(), 2);
        // Runtime's smaller entry shadows the build-time one entirely.
        assert_eq!(merged.mappings["a_x"].mappings.len(), 1);
        assert_eq!(merged.mappings["a_y"].mappings.len(), 1);
    }

    #[test]
    fn merge_keeps_entries_unique_to_either_tier() {
        let build_time = registry(vec![("a_x", entry("X", &[10]))]);
        let runtime = registry(vec![("a_z", entry("Z", &[30]))]);

        let merged = merge(build_time, runtime);
        assert_eq!(merged.mappings.len(), 2);
        assert!(merged.mappings.contains_key("a_x"));
        assert!(merged.mappings.contains_key("a_z"));
    }

    #[test]
    fn registry_json_uses_cc_numbers_as_keys() {
        let registry = registry(vec![("a_x", entry("X", &[13]))]);
        let json = serde_json::to_string_pretty(&registry).unwrap();
        assert!(json.contains("\"13\""));
        assert!(json.contains("\"deviceIndex\""));
        assert!(json.contains("\"parameterName\""));

        let parsed: MappingRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.mappings["a_x"].mappings.len(), 1);
    }
}
