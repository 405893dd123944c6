use super::{config_path, load_config};
use ghscout::core::{ScoutError, ScoutResult};
use std::path::Path;

pub fn run(config: Option<&Path>, path_only: bool) -> ScoutResult<()> {
    let path = config_path(config)?;
    if path_only {
        println!("{}", path.display());
        return Ok(());
    }

    let settings = load_config(config)?;
    let yaml = serde_yaml::to_string(&settings)
        .map_err(|e| ScoutError::Config(format!("Failed to serialize config: {}", e)))?;

    println!("# {}", path.display());
    print!("{}", yaml);
    Ok(())
}
