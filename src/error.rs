use std::path::PathBuf;
use thiserror::Error;

use crate::types::Flavor;

#[derive(Debug, Error)]
pub enum BootError {
    #[error(
        "Failed to locate the settings file ({strategy}). Set {env_var} to the settings file path to skip the search"
    )]
    SettingsNotFound { strategy: String, env_var: String },

    #[error("Could not find a supported platform root above {search_dir}")]
    PlatformNotFound { search_dir: PathBuf },

    #[error("Found a {flavor} root at {root}, but its entry file {entry} is missing")]
    PlatformBootstrapMissing {
        flavor: Flavor,
        root: PathBuf,
        entry: PathBuf,
    },

    #[error("Unrecognized platform flavor '{0}'")]
    UnrecognizedFlavor(String),

    #[error("No application detected in the {flavor} root at {root}")]
    NoApplicationDetected { flavor: Flavor, root: PathBuf },

    #[error(
        "The standalone root at {root} does not bundle the application; boot it through its settings file instead"
    )]
    StandaloneApplication { root: PathBuf },

    #[error("Failed to establish user '{principal}': {reason}")]
    UserSyncFailure { principal: String, reason: String },

    #[error("Invalid platform spec '{spec}': {reason}")]
    InvalidPlatformSpec { spec: String, reason: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Cannot {action} while {state}")]
    InvalidState { action: &'static str, state: String },

    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Unknown key '{key}' in {path} (line {line})")]
    UnknownKey {
        key: String,
        path: PathBuf,
        line: usize,
    },

    #[error("Unknown keys in config file")]
    UnknownKeys(Vec<BootError>),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] confique::Error),
}
