//! Mapping registry persistence and dual-tier merge tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use controlmap::canonical::model::{
    CanonicalMidiMap, ControlDefinition, DeviceRef, MapMetadata, PluginRef, CANONICAL_VERSION,
};
use controlmap::deploy::live::LiveDeployer;
use controlmap::deploy::{DawDeployer, DeployOptions};
use controlmap::midi::model::{Cc, Channel, ControlRange, ControlType};
use controlmap::registry::model::{merge, MappingRegistry};
use controlmap::registry::store::RegistryStore;

fn map(plugin: &str, ccs: &[u8]) -> CanonicalMidiMap {
    CanonicalMidiMap {
        version: CANONICAL_VERSION.to_string(),
        device: DeviceRef {
            manufacturer: "Novation".to_string(),
            model: "Launch Control XL 3".to_string(),
        },
        plugin: Some(PluginRef {
            manufacturer: Some("TAL Software".to_string()),
            name: plugin.to_string(),
        }),
        metadata: MapMetadata {
            name: "Synth Mode".to_string(),
            description: "test".to_string(),
            date: DateTime::parse_from_rfc3339("2026-08-07T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        },
        midi_channel: None,
        controls: ccs
            .iter()
            .map(|&cc| ControlDefinition {
                id: format!("ctl_{cc}"),
                name: Some(format!("Label {cc}")),
                control_type: ControlType::Encoder,
                cc: Cc::from_u8(cc).unwrap(),
                channel: Channel::from_u8(0).unwrap(),
                range: ControlRange::FULL,
                plugin_parameter: Some(cc as u32),
            })
            .collect(),
    }
}

#[tokio::test]
async fn sequential_plugin_deploys_create_distinct_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RegistryStore::new(dir.path().join("registry.json")));
    let deployer = LiveDeployer::new(store.clone());

    deployer
        .deploy(&map("TAL-J-8", &[13, 14]), &DeployOptions::default())
        .await
        .unwrap();
    let after_first = std::fs::read_to_string(store.path()).unwrap();
    assert!(serde_json::from_str::<MappingRegistry>(&after_first).is_ok());

    deployer
        .deploy(&map("Jup-8 V3", &[13, 14]), &DeployOptions::default())
        .await
        .unwrap();
    let after_second = std::fs::read_to_string(store.path()).unwrap();
    let registry: MappingRegistry = serde_json::from_str(&after_second).unwrap();

    assert_eq!(registry.mappings.len(), 2);
    assert!(registry
        .mappings
        .contains_key("launch-control-xl-3_tal-j-8"));
    assert!(registry
        .mappings
        .contains_key("launch-control-xl-3_jup-8-v3"));
}

#[tokio::test]
async fn redeploying_fewer_controls_leaves_no_stale_ccs() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RegistryStore::new(dir.path().join("registry.json")));
    let deployer = LiveDeployer::new(store.clone());

    deployer
        .deploy(&map("TAL-J-8", &[10, 11, 12, 13]), &DeployOptions::default())
        .await
        .unwrap();
    deployer
        .deploy(&map("TAL-J-8", &[10, 11]), &DeployOptions::default())
        .await
        .unwrap();

    let registry = store.load();
    let entry = &registry.mappings["launch-control-xl-3_tal-j-8"];
    let ccs: Vec<u8> = entry.mappings.keys().map(|cc| cc.as_u8()).collect();
    assert_eq!(ccs, vec![10, 11]);
}

#[tokio::test]
async fn concurrent_live_deploys_serialize_through_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RegistryStore::new(dir.path().join("registry.json")));

    let mut handles = Vec::new();
    for (plugin, cc) in [("TAL-J-8", 10u8), ("Jup-8 V3", 20), ("OB-Xd", 30)] {
        let deployer = LiveDeployer::new(store.clone());
        let map = map(plugin, &[cc]);
        handles.push(tokio::spawn(async move {
            deployer.deploy(&map, &DeployOptions::default()).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().success);
    }

    // No write was lost to a racing writer.
    let registry = store.load();
    assert_eq!(registry.mappings.len(), 3);
}

#[tokio::test]
async fn runtime_registry_shadows_build_time_entries_wholesale() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RegistryStore::new(dir.path().join("registry.json")));
    let deployer = LiveDeployer::new(store.clone());

    // Build-time tier covers two plugins; runtime covers one with fewer CCs.
    let build_time_store = RegistryStore::new(dir.path().join("build-time.json"));
    let bt_deployer = LiveDeployer::new(Arc::new(build_time_store));
    bt_deployer
        .deploy(&map("TAL-J-8", &[10, 11, 12]), &DeployOptions::default())
        .await
        .unwrap();
    bt_deployer
        .deploy(&map("Jup-8 V3", &[20]), &DeployOptions::default())
        .await
        .unwrap();
    let build_time = RegistryStore::new(dir.path().join("build-time.json")).load();

    deployer
        .deploy(&map("TAL-J-8", &[10]), &DeployOptions::default())
        .await
        .unwrap();
    let runtime = store.load();

    let merged = merge(build_time, runtime);
    assert_eq!(merged.mappings.len(), 2);
    // Runtime entry replaced the build-time one entirely.
    assert_eq!(
        merged.mappings["launch-control-xl-3_tal-j-8"].mappings.len(),
        1
    );
    // Build-time-only entry survives.
    assert_eq!(
        merged.mappings["launch-control-xl-3_jup-8-v3"].mappings.len(),
        1
    );
}
