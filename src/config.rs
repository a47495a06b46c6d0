//! Persistent settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::util::Result;

/// Lookup-table resolution bounds for transfer functions.
pub const TRANSFER_FUNCTION_SAMPLES_RANGE: (usize, usize) = (2, 4096);

/// Per-axis bounds of the empty-space skipping grid.
pub const UNIFORM_GRID_DIM_RANGE: (u32, u32) = (1, 128);

/// Context-wide settings, loaded once when a context is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Volumes
    pub transfer_function_samples: usize,
    pub uniform_grid_dims: [u32; 3],

    // Device
    /// Bytes the reference device may hand out; `None` is unlimited.
    pub device_memory_budget: Option<usize>,

    // Logging
    pub log_filter: String,

    // Commit engine
    pub max_commit_passes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            transfer_function_samples: 256,
            uniform_grid_dims: [16, 16, 16],
            device_memory_budget: None,
            log_filter: "info".to_string(),
            max_commit_passes: 64,
        }
    }
}

impl Settings {
    /// Default settings file: `<config_dir>/scene-gpu/settings.json`.
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("scene-gpu");
            p.push("settings.json");
            p
        })
    }

    /// Load from the default location, falling back to defaults.
    pub fn load() -> Self {
        Self::path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default()
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(text)?;
        Ok(settings.validated())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Save to the default location, if one exists on this platform.
    pub fn save(&self) -> Result<()> {
        match Self::path() {
            Some(p) => self.save_to(p),
            None => Ok(()),
        }
    }

    /// Clamp every field into its supported range.
    pub fn validated(mut self) -> Self {
        let (lo, hi) = TRANSFER_FUNCTION_SAMPLES_RANGE;
        self.transfer_function_samples = self.transfer_function_samples.clamp(lo, hi);
        let (lo, hi) = UNIFORM_GRID_DIM_RANGE;
        for d in &mut self.uniform_grid_dims {
            *d = (*d).clamp(lo, hi);
        }
        self.max_commit_passes = self.max_commit_passes.max(1);
        self
    }
}
