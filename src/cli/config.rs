//! Config display command handler.

use anyhow::Result;

use replayfetch::Config;

/// Print the effective configuration as JSON.
pub(crate) fn cmd_config(config: &Config) -> Result<()> {
    println!("# {}", Config::path().display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
