//! JSON report export

use crate::error::Result;
use crate::models::ScanResultSet;
use std::path::Path;
use tracing::info;

/// Writes the full result set as 2-space indented JSON
pub fn export(results: &ScanResultSet, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(output_path, json)?;
    info!("JSON report generated: {}", output_path.display());
    Ok(())
}

/// Loads a result set saved by [`export`] or produced by another tool.
/// The severity summary is recomputed from the loaded findings.
pub fn load(input_path: &Path) -> Result<ScanResultSet> {
    let content = std::fs::read_to_string(input_path)?;
    let mut results: ScanResultSet = serde_json::from_str(&content)?;
    results.recount();
    Ok(results)
}
