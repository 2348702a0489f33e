use log::{info, warn};
use std::fmt;
use std::sync::Arc;

use crate::canonical::convert::{CanonicalConverter, ConvertError, ConvertOptions};
use crate::canonical::model::{CanonicalMidiMap, PluginRef};
use crate::deploy::{DawTarget, DeployOptions, DeploymentResult, SharedDeployer};
use crate::descriptor::DescriptorCatalog;
use crate::device::model::ControllerAdapter;
use crate::matcher::model::ControlName;
use crate::matcher::{MatchOptions, ParameterMatcher};

pub use crate::device::model::{ConfigurationSlot, DeviceError, SlotIndex};

/// Pipeline stages, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStep {
    Init,
    Read,
    Match,
    Convert,
    Deploy,
    Aggregate,
    Done,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStep::Init => "init",
            PipelineStep::Read => "read",
            PipelineStep::Match => "match",
            PipelineStep::Convert => "convert",
            PipelineStep::Deploy => "deploy",
            PipelineStep::Aggregate => "aggregate",
            PipelineStep::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug)]
pub struct ProgressEvent {
    pub step: PipelineStep,
    pub message: String,
}

/// Observer of pipeline progress. Purely observational: implementations must
/// not influence control flow, and emission never blocks the pipeline.
pub trait ProgressSink {
    fn emit(&self, event: ProgressEvent);
}

pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: ProgressEvent) {
        info!("[{}] {}", event.step, event.message);
    }
}

/// Forwards events into an async channel. Sends fire-and-forget.
pub struct ChannelSink(pub async_channel::Sender<ProgressEvent>);

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.0.try_send(event);
    }
}

// Thread safe type aliases
pub type OrchestratorAdapter = Arc<dyn ControllerAdapter + Send + Sync + 'static>;
pub type OrchestratorSink = Arc<dyn ProgressSink + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

#[derive(Clone, Debug)]
pub struct DeployRequest {
    pub slot: SlotIndex,
    pub targets: Vec<DawTarget>,
    pub plugin: Option<String>,
    pub deploy: DeployOptions,
    pub convert: ConvertOptions,
    pub matching: MatchOptions,
    /// Discard below-threshold matches instead of applying them with a
    /// warning.
    pub skip_low_confidence: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Every target succeeded, nothing was degraded.
    Success,
    /// Every target succeeded but something was skipped or recovered.
    Degraded,
    /// Some targets succeeded, some failed.
    Partial,
    /// No target succeeded.
    Failed,
}

#[derive(Debug)]
pub struct DeploymentReport {
    pub slot: SlotIndex,
    pub success: bool,
    pub results: Vec<DeploymentResult>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub map: CanonicalMidiMap,
}

impl DeploymentReport {
    pub fn outcome(&self) -> Outcome {
        if self.success {
            if self.warnings.is_empty() {
                Outcome::Success
            } else {
                Outcome::Degraded
            }
        } else if self.results.iter().any(|r| r.success) {
            Outcome::Partial
        } else {
            Outcome::Failed
        }
    }
}

/// Sequences read -> (match) -> convert -> deploy fan-out -> aggregate.
///
/// Failure policy: READ and CONVERT failures abort the run; everything inside
/// MATCH degrades to warnings; each target's DEPLOY failure is isolated into
/// its own result.
pub struct DeploymentOrchestrator {
    adapter: OrchestratorAdapter,
    converter: CanonicalConverter,
    matcher: ParameterMatcher,
    catalog: Option<DescriptorCatalog>,
    deployers: Vec<SharedDeployer>,
    sink: OrchestratorSink,
}

impl DeploymentOrchestrator {
    pub fn new(
        adapter: OrchestratorAdapter,
        converter: CanonicalConverter,
        matcher: ParameterMatcher,
        catalog: Option<DescriptorCatalog>,
        deployers: Vec<SharedDeployer>,
        sink: OrchestratorSink,
    ) -> DeploymentOrchestrator {
        DeploymentOrchestrator {
            adapter,
            converter,
            matcher,
            catalog,
            deployers,
            sink,
        }
    }

    pub async fn list_slots(&self) -> Result<Vec<ConfigurationSlot>, DeviceError> {
        self.adapter.list_slots().await
    }

    pub async fn deploy_slot(
        &self,
        request: &DeployRequest,
    ) -> Result<DeploymentReport, PipelineError> {
        let mut warnings: Vec<String> = Vec::new();

        self.emit(PipelineStep::Init, format!("Starting deployment for slot {}.", request.slot));

        self.emit(PipelineStep::Read, format!("Reading slot {}.", request.slot));
        let config = self.adapter.read_slot(request.slot).await?;

        let device = self.adapter.device();

        // MATCH runs only when a plugin was requested; nothing in it is fatal.
        let mut accepted = Vec::new();
        let mut plugin_ref = None;
        if let Some(plugin_name) = &request.plugin {
            self.emit(
                PipelineStep::Match,
                format!(
                    "Matching {} controls against plugin '{}'.",
                    config.controls.len(),
                    plugin_name
                ),
            );
            match self.find_descriptor(plugin_name) {
                Err(reason) => {
                    warn!("{reason}");
                    warnings.push(reason);
                    plugin_ref = Some(PluginRef {
                        manufacturer: None,
                        name: plugin_name.clone(),
                    });
                }
                Ok(descriptor) => {
                    let controls: Vec<ControlName> = config
                        .controls
                        .iter()
                        .filter_map(|control| {
                            control.cc.map(|cc| ControlName {
                                name: control
                                    .name
                                    .clone()
                                    .unwrap_or_else(|| format!("Control {}", cc.as_u8())),
                                cc,
                            })
                        })
                        .collect();
                    let outcome = self
                        .matcher
                        .match_parameters(&controls, &descriptor, &request.matching)
                        .await;
                    warnings.extend(outcome.warnings);
                    if outcome.skipped {
                        warnings.push(format!(
                            "Parameter matching skipped for '{plugin_name}': controls carry no user-assigned labels."
                        ));
                    }
                    accepted = outcome.matches;
                    plugin_ref = Some(PluginRef {
                        manufacturer: Some(descriptor.plugin.manufacturer.clone()),
                        name: descriptor.plugin.name.clone(),
                    });
                }
            }
        }

        self.emit(
            PipelineStep::Convert,
            format!(
                "Converting '{}' ({} controls) to the canonical schema.",
                config.name,
                config.controls.len()
            ),
        );
        let mut convert_options = request.convert.clone();
        convert_options.plugin = plugin_ref;
        let mut map = self.converter.convert(&device, &config, &convert_options)?;

        for m in &accepted {
            if m.below_threshold {
                if request.skip_low_confidence {
                    warnings.push(format!(
                        "Discarded low-confidence match '{}' -> '{}' ({:.2}).",
                        m.control_name, m.parameter_name, m.confidence
                    ));
                    continue;
                }
                warnings.push(format!(
                    "Applied unverified match '{}' -> '{}' ({:.2}, {:?}).",
                    m.control_name, m.parameter_name, m.confidence, m.match_type
                ));
            }
            map.set_plugin_parameter(m.cc, m.parameter_index);
        }

        let target_names: Vec<&str> = request.targets.iter().map(|t| t.name()).collect();
        self.emit(
            PipelineStep::Deploy,
            format!("Deploying to [{}].", target_names.join(", ")),
        );
        let results = self.fan_out(request, &map).await;

        self.emit(
            PipelineStep::Aggregate,
            format!("Collecting results from {} targets.", results.len()),
        );
        let errors: Vec<String> = results.iter().flat_map(|r| r.errors.clone()).collect();
        let success = results.iter().all(|r| r.success) && errors.is_empty();

        self.emit(
            PipelineStep::Done,
            format!("Deployment for slot {} finished.", request.slot),
        );

        Ok(DeploymentReport {
            slot: request.slot,
            success,
            results,
            errors,
            warnings,
            map,
        })
    }

    /// Walks every non-empty slot in order, isolating per-slot read failures.
    /// Device reads stay strictly sequential.
    pub async fn deploy_all_slots(
        &self,
        base: &DeployRequest,
    ) -> Result<Vec<(SlotIndex, Result<DeploymentReport, PipelineError>)>, DeviceError> {
        let slots = self.adapter.list_slots().await?;
        let mut reports = Vec::new();
        for slot in slots.into_iter().filter(|s| !s.is_empty) {
            let mut request = base.clone();
            request.slot = slot.index;
            let report = self.deploy_slot(&request).await;
            if let Err(error) = &report {
                warn!("Skipping slot {}: {error}", slot.index);
            }
            reports.push((slot.index, report));
        }
        Ok(reports)
    }

    fn find_descriptor(
        &self,
        plugin_name: &str,
    ) -> Result<crate::descriptor::PluginDescriptor, String> {
        let catalog = self.catalog.as_ref().ok_or_else(|| {
            format!("No descriptor catalog configured; matching skipped for '{plugin_name}'.")
        })?;
        catalog
            .find(plugin_name)
            .map_err(|e| format!("Matching skipped: {e}"))
    }

    async fn fan_out(
        &self,
        request: &DeployRequest,
        map: &CanonicalMidiMap,
    ) -> Vec<DeploymentResult> {
        let mut handles = Vec::with_capacity(request.targets.len());
        let mut results = Vec::with_capacity(request.targets.len());

        for target in &request.targets {
            let deployer = self
                .deployers
                .iter()
                .find(|d| d.daw_name() == target.name())
                .cloned();
            match deployer {
                None => results.push(DeploymentResult::failed(
                    target.name(),
                    format!("No deployer registered for '{}'.", target),
                )),
                Some(deployer) => {
                    let map = map.clone();
                    let options = request.deploy.clone();
                    let name = target.name();
                    handles.push((
                        name,
                        tokio::spawn(async move { deployer.deploy(&map, &options).await }),
                    ));
                }
            }
        }

        for (name, handle) in handles {
            let result = match handle.await {
                Ok(Ok(result)) => result,
                Ok(Err(error)) => DeploymentResult::failed(name, error.to_string()),
                Err(join_error) => {
                    DeploymentResult::failed(name, format!("Deployer crashed: {join_error}."))
                }
            };
            results.push(result);
        }

        results
    }

    fn emit(&self, step: PipelineStep, message: String) {
        self.sink.emit(ProgressEvent { step, message });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::convert::ConvertOptions;
    use crate::deploy::ardour::ArdourDeployer;
    use crate::deploy::stubs::NowhereLocator;
    use crate::deploy::{DawDeployer, DeployError, DeploymentResult};
    use crate::device::model::{
        ConfigurationSlot, ControlMapping, ControllerConfiguration, DeviceInfo,
    };
    use crate::device::stubs::InMemoryAdapter;
    use crate::matcher::stubs::Scripted;
    use crate::midi::model::{Cc, ControlType};
    use crate::profile::ProfileRegistry;
    use async_trait::async_trait;

    fn device() -> DeviceInfo {
        DeviceInfo {
            manufacturer: "Novation".to_string(),
            model: "Launch Control XL 3".to_string(),
        }
    }

    fn config() -> ControllerConfiguration {
        ControllerConfiguration {
            name: "Synth Mode".to_string(),
            controls: vec![ControlMapping {
                id: "Knob 1".to_string(),
                name: Some("Cutoff".to_string()),
                control_type: ControlType::Encoder,
                cc: Cc::from_u8(13),
                channel: None,
                range: None,
            }],
            metadata: Default::default(),
        }
    }

    struct FailingDeployer;

    #[async_trait]
    impl DawDeployer for FailingDeployer {
        fn daw_name(&self) -> &'static str {
            "live"
        }

        async fn deploy(
            &self,
            _map: &CanonicalMidiMap,
            _options: &DeployOptions,
        ) -> Result<DeploymentResult, DeployError> {
            Err(DeployError::Io {
                path: "/nowhere/registry.json".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        }
    }

    fn orchestrator(
        deployers: Vec<SharedDeployer>,
        sink: OrchestratorSink,
    ) -> DeploymentOrchestrator {
        let adapter = InMemoryAdapter::new(device())
            .with_slot(SlotIndex::from_u8(0).unwrap(), config());
        let profiles = Arc::new(ProfileRegistry::embedded().unwrap());
        DeploymentOrchestrator::new(
            Arc::new(adapter),
            CanonicalConverter::new(profiles),
            ParameterMatcher::new(Arc::new(Scripted::new(vec![]))),
            None,
            deployers,
            sink,
        )
    }

    fn request(slot: u8, targets: Vec<DawTarget>, plugin: Option<&str>, dir: &std::path::Path) -> DeployRequest {
        DeployRequest {
            slot: SlotIndex::from_u8(slot).unwrap(),
            targets,
            plugin: plugin.map(str::to_string),
            deploy: DeployOptions {
                output_dir: Some(dir.to_path_buf()),
                ..Default::default()
            },
            convert: ConvertOptions::default(),
            matching: MatchOptions::default(),
            skip_low_confidence: false,
        }
    }

    #[tokio::test]
    async fn progress_events_follow_pipeline_order() {
        let dir = tempfile::tempdir().unwrap();
        let (sender, receiver) = async_channel::unbounded();
        let orchestrator = orchestrator(
            vec![Arc::new(ArdourDeployer::new(Arc::new(NowhereLocator)))],
            Arc::new(ChannelSink(sender)),
        );

        let report = orchestrator
            .deploy_slot(&request(0, vec![DawTarget::Ardour], Some("TAL-J-8"), dir.path()))
            .await
            .unwrap();
        assert!(report.success);

        let mut steps = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            steps.push(event.step);
        }
        assert_eq!(
            steps,
            vec![
                PipelineStep::Init,
                PipelineStep::Read,
                PipelineStep::Match,
                PipelineStep::Convert,
                PipelineStep::Deploy,
                PipelineStep::Aggregate,
                PipelineStep::Done,
            ]
        );
    }

    #[tokio::test]
    async fn match_step_is_skipped_without_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let (sender, receiver) = async_channel::unbounded();
        let orchestrator = orchestrator(
            vec![Arc::new(ArdourDeployer::new(Arc::new(NowhereLocator)))],
            Arc::new(ChannelSink(sender)),
        );

        orchestrator
            .deploy_slot(&request(0, vec![DawTarget::Ardour], None, dir.path()))
            .await
            .unwrap();

        let mut steps = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            steps.push(event.step);
        }
        assert!(!steps.contains(&PipelineStep::Match));
    }

    #[tokio::test]
    async fn empty_slot_read_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(
            vec![Arc::new(ArdourDeployer::new(Arc::new(NowhereLocator)))],
            Arc::new(LogSink),
        );
        let err = orchestrator
            .deploy_slot(&request(3, vec![DawTarget::Ardour], None, dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Device(DeviceError::SlotEmpty(_))));
    }

    #[tokio::test]
    async fn target_failure_is_isolated_from_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(
            vec![
                Arc::new(ArdourDeployer::new(Arc::new(NowhereLocator))),
                Arc::new(FailingDeployer),
            ],
            Arc::new(LogSink),
        );
        let report = orchestrator
            .deploy_slot(&request(
                0,
                vec![DawTarget::Ardour, DawTarget::Live],
                None,
                dir.path(),
            ))
            .await
            .unwrap();

        assert!(!report.success);
        assert_eq!(report.outcome(), Outcome::Partial);
        let ardour = report.results.iter().find(|r| r.daw_name == "ardour").unwrap();
        assert!(ardour.success);
        assert!(ardour.output_path.as_ref().unwrap().exists());
        let live = report.results.iter().find(|r| r.daw_name == "live").unwrap();
        assert!(!live.success);
        assert_eq!(report.errors.len(), 1);
    }

    #[tokio::test]
    async fn missing_descriptor_degrades_instead_of_failing() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(
            vec![Arc::new(ArdourDeployer::new(Arc::new(NowhereLocator)))],
            Arc::new(LogSink),
        );
        let report = orchestrator
            .deploy_slot(&request(0, vec![DawTarget::Ardour], Some("TAL-J-8"), dir.path()))
            .await
            .unwrap();
        assert!(report.success);
        assert_eq!(report.outcome(), Outcome::Degraded);
        assert!(report.map.controls.iter().all(|c| c.plugin_parameter.is_none()));
    }

    struct UnreadableFirstSlot;

    #[async_trait]
    impl ControllerAdapter for UnreadableFirstSlot {
        fn device(&self) -> DeviceInfo {
            device()
        }

        async fn list_slots(&self) -> Result<Vec<ConfigurationSlot>, DeviceError> {
            Ok(vec![
                ConfigurationSlot {
                    index: SlotIndex::from_u8(0).unwrap(),
                    name: Some("Broken".to_string()),
                    is_empty: false,
                },
                ConfigurationSlot {
                    index: SlotIndex::from_u8(1).unwrap(),
                    name: Some("Synth Mode".to_string()),
                    is_empty: false,
                },
            ])
        }

        async fn read_slot(
            &self,
            slot: SlotIndex,
        ) -> Result<ControllerConfiguration, DeviceError> {
            if slot.as_u8() == 0 {
                Err(DeviceError::SlotRead {
                    slot,
                    reason: "checksum mismatch".to_string(),
                })
            } else {
                Ok(config())
            }
        }
    }

    #[tokio::test]
    async fn deploy_all_slots_isolates_per_slot_read_failures() {
        let dir = tempfile::tempdir().unwrap();
        let profiles = Arc::new(ProfileRegistry::embedded().unwrap());
        let orchestrator = DeploymentOrchestrator::new(
            Arc::new(UnreadableFirstSlot),
            CanonicalConverter::new(profiles),
            ParameterMatcher::new(Arc::new(Scripted::new(vec![]))),
            None,
            vec![Arc::new(ArdourDeployer::new(Arc::new(NowhereLocator)))],
            Arc::new(LogSink),
        );

        let reports = orchestrator
            .deploy_all_slots(&request(0, vec![DawTarget::Ardour], None, dir.path()))
            .await
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports[0].1.is_err());
        assert!(reports[1].1.as_ref().unwrap().success);
    }
}
