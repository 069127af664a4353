use std::path::Path;

use anyhow::Context;
use ripper::RipperConfig;

pub fn load(path: Option<&Path>) -> anyhow::Result<RipperConfig> {
    let Some(path) = path else {
        return Ok(RipperConfig::default());
    };

    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = toml::from_str(&data)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(config)
}
