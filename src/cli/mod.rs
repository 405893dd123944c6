pub mod config;
pub mod login;
pub mod probe;
pub mod scan;
pub mod token;

use ghscout::config::Config;
use ghscout::core::path::config_file;
use ghscout::core::ScoutResult;
use std::path::{Path, PathBuf};

/// Config file in effect: `--config` or the platform default
pub fn config_path(config: Option<&Path>) -> ScoutResult<PathBuf> {
    match config {
        Some(path) => Ok(path.to_path_buf()),
        None => config_file(),
    }
}

pub fn load_config(config: Option<&Path>) -> ScoutResult<Config> {
    Config::load_from(&config_path(config)?)
}
