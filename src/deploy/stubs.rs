use std::path::PathBuf;

use crate::deploy::InstallLocator;

/// Locator rooted at a fixed directory, for tests and sandboxed runs.
pub struct FixedLocator {
    pub root: PathBuf,
}

impl InstallLocator for FixedLocator {
    fn ardour_midi_maps_dir(&self) -> Option<PathBuf> {
        Some(self.root.join("midi_maps"))
    }

    fn live_registry_path(&self) -> Option<PathBuf> {
        Some(self.root.join("mapping-registry.json"))
    }
}

/// Locator that resolves nothing, for exercising install-failure paths.
pub struct NowhereLocator;

impl InstallLocator for NowhereLocator {
    fn ardour_midi_maps_dir(&self) -> Option<PathBuf> {
        None
    }

    fn live_registry_path(&self) -> Option<PathBuf> {
        None
    }
}
