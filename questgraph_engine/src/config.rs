//! Analysis settings and their TOML loader.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use questgraph_script::PLAYER;

/// Knobs for one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// How many `StartScript` levels are followed when inlining.
    pub inline_depth: usize,
    /// Object id that stands for the player in scoped conditions.
    pub player_id: String,
    /// Whether dialogue result text is analysed for journal updates.
    pub dialogue_results: bool,
    /// Extra globally started script ids, on top of the records' own list.
    pub start_scripts: Vec<String>,
    /// Known global variable names.
    pub globals: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            inline_depth: 3,
            player_id: PLAYER.to_string(),
            dialogue_results: true,
            start_scripts: Vec::new(),
            globals: Vec::new(),
        }
    }
}

/// Load the analysis configuration, falling back to defaults on error.
///
/// Never fails: read or parse errors are logged at `warn!` and the default
/// configuration is returned.
pub fn load_config(toml_path: &Path) -> AnalysisConfig {
    match try_load_config(toml_path) {
        Ok(config) => {
            info!("analysis config loaded from '{}'", toml_path.display());
            config
        },
        Err(e) => {
            warn!(
                "Could not load analysis config from '{}': {:#}. Using defaults.",
                toml_path.display(),
                e
            );
            AnalysisConfig::default()
        },
    }
}

/// Load the analysis configuration from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn try_load_config(toml_path: &Path) -> Result<AnalysisConfig> {
    let text = fs::read_to_string(toml_path)
        .with_context(|| format!("reading analysis config from '{}'", toml_path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing analysis config from '{}'", toml_path.display()))
}
