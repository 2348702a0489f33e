use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use controlmap::canonical::convert::{CanonicalConverter, ConvertOptions};
use controlmap::deploy::ardour::ArdourDeployer;
use controlmap::deploy::live::LiveDeployer;
use controlmap::deploy::{DawTarget, DeployOptions, InstallLocator, SharedDeployer, SystemLocator};
use controlmap::descriptor::DescriptorCatalog;
use controlmap::device::snapshot::SnapshotAdapter;
use controlmap::extensions::option::OptionExt;
use controlmap::matcher::subprocess::{Config as MatcherConfig, SubprocessMatcher};
use controlmap::matcher::{stubs as matcher_stubs, MatchOptions, ParameterMatcher};
use controlmap::midi::model::Channel;
use controlmap::orchestrator::{
    DeployRequest, DeploymentOrchestrator, DeploymentReport, LogSink, Outcome, SlotIndex,
};
use controlmap::profile::ProfileRegistry;
use controlmap::registry::store::RegistryStore;

/// Deploy MIDI controller custom modes to multiple DAWs.
#[derive(Parser)]
#[command(name = "controlmap")]
#[command(about = "Convert controller custom modes into DAW binding files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Device snapshot exported by the controller transport
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Controller profile file overriding the embedded profiles
    #[arg(long, global = true)]
    profiles: Option<PathBuf>,

    /// Directory of plugin descriptor JSON files
    #[arg(long, global = true)]
    descriptors: Option<PathBuf>,

    /// External matching command (receives the batched request as JSON)
    #[arg(long, global = true)]
    matcher_cmd: Option<String>,

    /// Mapping registry file (defaults to the platform location)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct DeployArgs {
    /// Deployment targets, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    daw: Vec<DawTarget>,

    /// Plugin to match control labels against
    #[arg(long)]
    plugin: Option<String>,

    /// Output directory for generated binding files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Install generated files into DAW directories
    #[arg(long)]
    install: bool,

    /// Default MIDI channel (0-15) for controls without one
    #[arg(long)]
    midi_channel: Option<u8>,

    /// Keep control labels from the device instead of canonical names
    #[arg(long)]
    preserve_labels: bool,

    /// Resolve everything but write nothing
    #[arg(long)]
    dry_run: bool,

    /// Also write the canonical map as YAML into this directory
    #[arg(long)]
    save_canonical: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the controller's custom mode slots
    List,
    /// Deploy one slot to the requested DAWs
    Deploy {
        /// Slot to deploy (0-15)
        #[arg(long)]
        slot: u8,

        #[command(flatten)]
        args: DeployArgs,
    },
    /// Deploy with confidence controls; without --slot, walks every
    /// non-empty slot
    AutoDeploy {
        /// Slot to deploy (0-15)
        #[arg(long)]
        slot: Option<u8>,

        #[command(flatten)]
        args: DeployArgs,

        /// Minimum confidence for a match to count as verified
        #[arg(long, default_value_t = controlmap::matcher::DEFAULT_MIN_CONFIDENCE)]
        min_confidence: f64,

        /// Drop below-threshold matches instead of applying them with a
        /// warning
        #[arg(long)]
        skip_low_confidence: bool,

        /// Derive parameter indices from trailing label numbers when nothing
        /// matched (unverified)
        #[arg(long)]
        numeric_suffix_fallback: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let profiles = Arc::new(match &cli.profiles {
        Some(path) => ProfileRegistry::load_from_yaml(path)?,
        None => ProfileRegistry::embedded()?,
    });

    let snapshot = cli.snapshot.as_ref().ok_or_else(|| {
        anyhow::anyhow!("No device snapshot given. Export one and pass it with --snapshot.")
    })?;
    let adapter = Arc::new(SnapshotAdapter::load_from_yaml(snapshot)?);

    let locator = Arc::new(SystemLocator);
    let catalog = cli.descriptors.clone().map(DescriptorCatalog::new);

    let matcher = match &cli.matcher_cmd {
        Some(command) => ParameterMatcher::new(Arc::new(SubprocessMatcher::new(
            MatcherConfig::command(command.clone()),
        ))),
        // Without a matching command the pipeline degrades gracefully.
        None => ParameterMatcher::new(Arc::new(matcher_stubs::AlwaysUnavailable)),
    };

    match cli.command {
        Commands::List => {
            let orchestrator = DeploymentOrchestrator::new(
                adapter,
                CanonicalConverter::new(profiles),
                matcher,
                catalog,
                vec![],
                Arc::new(LogSink),
            );
            let slots = orchestrator.list_slots().await?;
            for slot in slots {
                match (slot.is_empty, slot.name) {
                    (true, _) => println!("{:>2}  (empty)", slot.index),
                    (false, name) => {
                        println!("{:>2}  {}", slot.index, name.as_deref().unwrap_or("(unnamed)"))
                    }
                }
            }
            Ok(())
        }
        Commands::Deploy { slot, args } => {
            let orchestrator = build_orchestrator(
                adapter, profiles, matcher, catalog, &args, &cli.registry, locator,
            )?;
            let request = build_request(slot, &args, MatchOptions::default(), false)?;
            let report = orchestrator.deploy_slot(&request).await?;
            print_report(&report);
            save_canonical(&args, &report)?;
            exit_for(&[&report])
        }
        Commands::AutoDeploy {
            slot,
            args,
            min_confidence,
            skip_low_confidence,
            numeric_suffix_fallback,
        } => {
            anyhow::ensure!(
                (0.0..=1.0).contains(&min_confidence),
                "--min-confidence must be within 0..1"
            );
            let matching = MatchOptions {
                min_confidence,
                numeric_suffix_fallback,
                ..Default::default()
            };
            let orchestrator = build_orchestrator(
                adapter, profiles, matcher, catalog, &args, &cli.registry, locator,
            )?;
            match slot {
                Some(slot) => {
                    let request = build_request(slot, &args, matching, skip_low_confidence)?;
                    let report = orchestrator.deploy_slot(&request).await?;
                    print_report(&report);
                    save_canonical(&args, &report)?;
                    exit_for(&[&report])
                }
                None => {
                    let request = build_request(0, &args, matching, skip_low_confidence)?;
                    let reports = orchestrator.deploy_all_slots(&request).await?;
                    let mut succeeded = Vec::new();
                    for (slot, report) in &reports {
                        match report {
                            Err(error) => println!("slot {slot}: skipped ({error})"),
                            Ok(report) => {
                                print_report(report);
                                save_canonical(&args, report)?;
                                succeeded.push(report);
                            }
                        }
                    }
                    anyhow::ensure!(
                        succeeded.iter().any(|r| r.results.iter().any(|t| t.success)),
                        "No slot deployed successfully."
                    );
                    Ok(())
                }
            }
        }
    }
}

fn build_orchestrator(
    adapter: Arc<SnapshotAdapter>,
    profiles: Arc<ProfileRegistry>,
    matcher: ParameterMatcher,
    catalog: Option<DescriptorCatalog>,
    args: &DeployArgs,
    registry_override: &Option<PathBuf>,
    locator: Arc<SystemLocator>,
) -> anyhow::Result<DeploymentOrchestrator> {
    let mut deployers: Vec<SharedDeployer> = Vec::new();
    for target in &args.daw {
        match target {
            DawTarget::Ardour => {
                deployers.push(Arc::new(ArdourDeployer::new(locator.clone())));
            }
            DawTarget::Live => {
                let path = registry_override
                    .clone()
                    .or_else(|| locator.live_registry_path())
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "No mapping registry location on this platform. Pass --registry."
                        )
                    })?;
                let store = Arc::new(RegistryStore::new(path));
                deployers.push(Arc::new(LiveDeployer::new(store)));
            }
        }
    }

    Ok(DeploymentOrchestrator::new(
        adapter,
        CanonicalConverter::new(profiles),
        matcher,
        catalog,
        deployers,
        Arc::new(LogSink),
    ))
}

fn build_request(
    slot: u8,
    args: &DeployArgs,
    matching: MatchOptions,
    skip_low_confidence: bool,
) -> anyhow::Result<DeployRequest> {
    let slot =
        SlotIndex::from_u8(slot).to_result(|| anyhow::anyhow!("Slot must be between 0 and 15."))?;
    let midi_channel = match args.midi_channel {
        None => None,
        Some(raw) => Some(
            Channel::from_u8(raw)
                .to_result(|| anyhow::anyhow!("MIDI channel must be between 0 and 15."))?,
        ),
    };

    Ok(DeployRequest {
        slot,
        targets: args.daw.clone(),
        plugin: args.plugin.clone(),
        deploy: DeployOptions {
            output_dir: args.output.clone(),
            auto_install: args.install,
            dry_run: args.dry_run,
        },
        convert: ConvertOptions {
            midi_channel,
            preserve_labels: args.preserve_labels,
            ..Default::default()
        },
        matching,
        skip_low_confidence,
    })
}

fn print_report(report: &DeploymentReport) {
    let label = match report.outcome() {
        Outcome::Success => "ok",
        Outcome::Degraded => "ok (degraded)",
        Outcome::Partial => "partial",
        Outcome::Failed => "failed",
    };
    println!(
        "slot {}: {} ({} controls, {} matched)",
        report.slot,
        label,
        report.map.controls.len(),
        report.map.matched_controls()
    );
    for result in &report.results {
        let status = if result.success { "ok" } else { "failed" };
        let path = result
            .output_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!("  {:>8}  {}  {}", result.daw_name, status, path);
        for warning in &result.warnings {
            println!("            warning: {warning}");
        }
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
    for error in &report.errors {
        println!("  error: {error}");
    }
}

fn save_canonical(args: &DeployArgs, report: &DeploymentReport) -> anyhow::Result<()> {
    if let Some(dir) = &args.save_canonical {
        std::fs::create_dir_all(dir)?;
        let file = format!(
            "{}-{}.yaml",
            controlmap::registry::model::slug(&report.map.device.model),
            controlmap::registry::model::slug(&report.map.metadata.name)
        );
        report.map.write_yaml(dir.join(file))?;
    }
    Ok(())
}

/// Exit zero when at least one target succeeded and nothing fatal happened.
fn exit_for(reports: &[&DeploymentReport]) -> anyhow::Result<()> {
    let any_success = reports
        .iter()
        .any(|r| r.results.iter().any(|t| t.success));
    anyhow::ensure!(any_success, "No deployment target succeeded.");
    Ok(())
}
