//! controlmap
//!
//! Converts a hardware MIDI controller's stored custom modes into a
//! device-agnostic canonical mapping, optionally matches control labels to
//! plugin parameters, and deploys DAW-specific binding artifacts (Ardour
//! XML maps, the Ableton Live mapping registry) in one pass.

pub mod canonical;
pub mod deploy;
pub mod descriptor;
pub mod device;
pub mod extensions;
pub mod matcher;
pub mod midi;
pub mod orchestrator;
pub mod profile;
pub mod registry;

pub use canonical::convert::{CanonicalConverter, ConvertError, ConvertOptions};
pub use canonical::model::CanonicalMidiMap;
pub use deploy::{DawDeployer, DawTarget, DeployOptions, DeploymentResult};
pub use descriptor::{DescriptorCatalog, PluginDescriptor};
pub use device::model::{ControllerAdapter, ControllerConfiguration, DeviceError, SlotIndex};
pub use matcher::{MatchOptions, MatchOutcome, ParameterMatcher};
pub use orchestrator::{
    DeployRequest, DeploymentOrchestrator, DeploymentReport, Outcome, PipelineError,
};
pub use profile::ProfileRegistry;
pub use registry::model::MappingRegistry;
pub use registry::store::RegistryStore;
