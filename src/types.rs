use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BootError;

/// The kind of host platform an installation is integrated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    Backdrop,
    Drupal8,
    Drupal,
    Joomla,
    WordPress,
    /// Self-hosting mode with no CMS around the application.
    Standalone,
}

impl Flavor {
    pub const ALL: [Flavor; 6] = [
        Flavor::Backdrop,
        Flavor::Drupal8,
        Flavor::Drupal,
        Flavor::Joomla,
        Flavor::WordPress,
        Flavor::Standalone,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Flavor::Backdrop => "backdrop",
            Flavor::Drupal8 => "drupal8",
            Flavor::Drupal => "drupal",
            Flavor::Joomla => "joomla",
            Flavor::WordPress => "wordpress",
            Flavor::Standalone => "standalone",
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Flavor {
    type Err = BootError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "wp" => return Ok(Flavor::WordPress),
            "drupal7" => return Ok(Flavor::Drupal),
            _ => {}
        }
        Flavor::ALL
            .into_iter()
            .find(|flavor| flavor.name() == lower)
            .ok_or_else(|| BootError::UnrecognizedFlavor(s.to_string()))
    }
}

/// A detected platform: which flavor, and where its root lives.
///
/// `root_path` may be `{dir}/web` or `{dir}/srv` when the markers were found
/// under one of those sub-roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlavorDescriptor {
    pub flavor: Flavor,
    pub root_path: PathBuf,
}

/// Inputs for one settings resolution attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Directory the heuristic search starts from (defaults to the working directory).
    pub search_dir: Option<PathBuf>,
    /// A settings file path supplied directly by the caller.
    pub explicit_settings_file: Option<PathBuf>,
    /// Environment variable that may name the settings file.
    pub env_var_name: Option<String>,
    /// Only consider this flavor during detection.
    pub pinned_flavor: Option<Flavor>,
    /// A configuration directory that is already known.
    pub conf_dir_override: Option<PathBuf>,
    /// Target hostname, used to pick a tenant on multisite platforms.
    pub http_host: Option<String>,
    /// Whether the heuristic upward search may run at all.
    pub search: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            search_dir: None,
            explicit_settings_file: None,
            env_var_name: None,
            pinned_flavor: None,
            conf_dir_override: None,
            http_host: None,
            search: true,
        }
    }
}

/// Which precedence step produced a settings path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsSource {
    ConfDir,
    EnvVar,
    Explicit,
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsLocation {
    pub path: PathBuf,
    pub source: SettingsSource,
}

/// A multisite alias that pointed at a directory which does not exist.
///
/// Not fatal: the literal domain label is probed instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteWarning {
    pub alias: String,
    pub target: String,
    pub missing_dir: PathBuf,
}

impl fmt::Display for SiteWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Site alias '{}' points to '{}', but {} does not exist",
            self.alias,
            self.target,
            self.missing_dir.display()
        )
    }
}

/// Outcome of [`resolve`](crate::resolve): the settings file and, when it
/// could be determined, the platform around it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub platform: Option<FlavorDescriptor>,
    pub settings: SettingsLocation,
    pub warnings: Vec<SiteWarning>,
}

/// How far a [`BootRequest`] should take the boot sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootLevel {
    None,
    Settings,
    Platform,
    #[default]
    Full,
}

impl FromStr for BootLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(BootLevel::None),
            "settings" => Ok(BootLevel::Settings),
            "platform" | "cms" => Ok(BootLevel::Platform),
            "full" => Ok(BootLevel::Full),
            other => Err(format!(
                "unknown boot level '{other}' (expected none, settings, platform, full)"
            )),
        }
    }
}

/// A boot request, independent of any CLI framework.
/// The CLI layer converts parsed clap args into this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BootRequest {
    pub level: BootLevel,
    pub search_dir: Option<PathBuf>,
    pub url: Option<String>,
    pub user: Option<String>,
    pub hostname: Option<String>,
    pub settings_file: Option<PathBuf>,
    /// Raw `flavor://path?user=..&host=..` spec; overrides the env var.
    pub platform: Option<String>,
    pub flavor: Option<Flavor>,
}
