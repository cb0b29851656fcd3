//! Reading records and writing analysis results.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ron::ser::PrettyConfig;

use questgraph_data::GameRecords;

use crate::analysis::AnalysisOutput;

/// Load decoded game records from a RON file.
pub fn load_records(path: &Path) -> Result<GameRecords> {
    let text = fs::read_to_string(path).with_context(|| format!("reading records from '{}'", path.display()))?;
    ron::from_str(&text).with_context(|| format!("parsing records RON from '{}'", path.display()))
}

/// Write the analysis output as pretty-printed RON.
pub fn save_output(output: &AnalysisOutput, path: &Path) -> Result<()> {
    let text = ron::ser::to_string_pretty(output, PrettyConfig::default()).context("serializing analysis output")?;
    fs::write(path, text).with_context(|| format!("writing analysis output to '{}'", path.display()))
}
