use async_trait::async_trait;
use log::info;
use std::path::PathBuf;

use crate::canonical::model::CanonicalMidiMap;
use crate::deploy::{DawDeployer, DeployError, DeployOptions, DeploymentResult, SharedLocator};
use crate::registry::model::slug;

/// Emits an Ardour MIDI binding map (`.map` XML file) from a canonical map.
/// Output is deterministic: controls are sorted by ascending CC, so two
/// deploys of the same map are byte-identical.
pub struct ArdourDeployer {
    locator: SharedLocator,
}

impl ArdourDeployer {
    pub fn new(locator: SharedLocator) -> ArdourDeployer {
        ArdourDeployer { locator }
    }

    fn file_name(map: &CanonicalMidiMap) -> String {
        let plugin_or_mode = map
            .plugin
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or(map.metadata.name.as_str());
        format!("{}-{}.map", slug(&map.device.model), slug(plugin_or_mode))
    }

    fn render(map: &CanonicalMidiMap) -> String {
        let mut controls: Vec<_> = map.controls.iter().collect();
        controls.sort_by_key(|c| c.cc);

        let map_name = format!(
            "{} {} - {}",
            map.device.manufacturer, map.device.model, map.metadata.name
        );

        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!(
            "<ArdourMIDIBindings version=\"{}\" name=\"{}\">\n",
            map.version,
            xml_escape(&map_name)
        ));
        xml.push_str(&format!(
            "  <DeviceInfo bank-size=\"{}\"/>\n",
            controls.len()
        ));

        for control in controls {
            let channel = control.channel.as_u8();
            let address = if control.control_type.is_button() {
                format!("note=\"{}\"", control.cc)
            } else {
                format!("ctl=\"{}\"", control.cc)
            };
            match (&map.plugin, control.plugin_parameter) {
                (Some(plugin), Some(parameter)) => {
                    xml.push_str(&format!(
                        "  <Binding channel=\"{}\" {} uri=\"{}/param/{}\"/>\n",
                        channel,
                        address,
                        xml_escape(&plugin.name),
                        parameter
                    ));
                }
                _ => {
                    xml.push_str(&format!(
                        "  <Binding channel=\"{}\" {} function=\"{}\"/>\n",
                        channel,
                        address,
                        xml_escape(&control.id)
                    ));
                }
            }
        }

        xml.push_str("</ArdourMIDIBindings>\n");
        xml
    }
}

#[async_trait]
impl DawDeployer for ArdourDeployer {
    fn daw_name(&self) -> &'static str {
        "ardour"
    }

    async fn deploy(
        &self,
        map: &CanonicalMidiMap,
        options: &DeployOptions,
    ) -> Result<DeploymentResult, DeployError> {
        let out_dir = options
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let out_path = out_dir.join(Self::file_name(map));
        let contents = Self::render(map);

        let mut warnings = Vec::new();
        let mut installed = false;

        if options.dry_run {
            info!("Dry run: skipping write of {}.", out_path.display());
        } else {
            std::fs::create_dir_all(&out_dir).map_err(|source| DeployError::Io {
                path: out_dir.clone(),
                source,
            })?;
            std::fs::write(&out_path, &contents).map_err(|source| DeployError::Io {
                path: out_path.clone(),
                source,
            })?;

            if options.auto_install {
                match self.install(&out_path) {
                    Ok(target) => {
                        info!("Installed Ardour map to {}.", target.display());
                        installed = true;
                    }
                    // The generated file still counts as deployed.
                    Err(reason) => warnings.push(format!("Install skipped: {reason}")),
                }
            }
        }

        Ok(DeploymentResult {
            success: true,
            daw_name: self.daw_name().to_string(),
            output_path: Some(out_path),
            installed,
            errors: Vec::new(),
            warnings,
        })
    }
}

impl ArdourDeployer {
    fn install(&self, out_path: &std::path::Path) -> Result<PathBuf, String> {
        let dir = self
            .locator
            .ardour_midi_maps_dir()
            .ok_or_else(|| "no Ardour midi_maps directory on this platform".to_string())?;
        std::fs::create_dir_all(&dir).map_err(|e| e.to_string())?;
        let target = dir.join(out_path.file_name().unwrap_or_default());
        std::fs::copy(out_path, &target).map_err(|e| e.to_string())?;
        Ok(target)
    }
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
