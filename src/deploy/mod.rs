pub mod ardour;
pub mod live;
pub mod stubs;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::canonical::model::CanonicalMidiMap;
use crate::registry::store::RegistryError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DawTarget {
    Ardour,
    Live,
}

impl DawTarget {
    pub fn name(&self) -> &'static str {
        match self {
            DawTarget::Ardour => "ardour",
            DawTarget::Live => "live",
        }
    }
}

impl fmt::Display for DawTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DawTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ardour" => Ok(DawTarget::Ardour),
            "live" => Ok(DawTarget::Live),
            other => Err(format!("Unknown DAW target '{other}'. Expected ardour or live.")),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DeployOptions {
    pub output_dir: Option<PathBuf>,
    pub auto_install: bool,
    pub dry_run: bool,
}

/// Per-target outcome. `errors` drives `success`; `warnings` (for example a
/// failed install copy) do not.
#[derive(Clone, Debug, Serialize)]
pub struct DeploymentResult {
    pub success: bool,
    pub daw_name: String,
    pub output_path: Option<PathBuf>,
    pub installed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl DeploymentResult {
    pub fn failed(daw_name: &str, error: String) -> DeploymentResult {
        DeploymentResult {
            success: false,
            daw_name: daw_name.to_string(),
            output_path: None,
            installed: false,
            errors: vec![error],
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Writing {path} failed. Reason: {source}.")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Port implemented once per supported DAW. A deployer maps the canonical
/// schema to its DAW-native artifact; it never sees the device or matcher.
#[async_trait]
pub trait DawDeployer {
    fn daw_name(&self) -> &'static str;

    async fn deploy(
        &self,
        map: &CanonicalMidiMap,
        options: &DeployOptions,
    ) -> Result<DeploymentResult, DeployError>;
}

pub type SharedDeployer = Arc<dyn DawDeployer + Send + Sync + 'static>;

/// Resolves platform-specific installation locations. The real resolution
/// lives outside this crate's core; deployers only consume the paths.
pub trait InstallLocator {
    fn ardour_midi_maps_dir(&self) -> Option<PathBuf>;

    fn live_registry_path(&self) -> Option<PathBuf>;
}

pub type SharedLocator = Arc<dyn InstallLocator + Send + Sync + 'static>;

/// Locator over the user's real home/config directories.
pub struct SystemLocator;

impl InstallLocator for SystemLocator {
    fn ardour_midi_maps_dir(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ardour8").join("midi_maps"))
    }

    fn live_registry_path(&self) -> Option<PathBuf> {
        dirs::home_dir().map(|dir| {
            dir.join("Music")
                .join("Ableton")
                .join("User Library")
                .join("Remote Scripts")
                .join("controlmap")
                .join("mapping-registry.json")
        })
    }
}
