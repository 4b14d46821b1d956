//! Settings file location.
//!
//! [`SettingsLocator::resolve`] walks a fixed precedence list and stops at the
//! first step that yields an existing file:
//!
//! 1. Configuration directory: an explicit `conf_dir_override`, or one set by
//!    the [`DiscoveryHook`]. Used when `{dir}/{settings name}` exists.
//! 2. The named environment variable, unless it is the sentinel `Auto`.
//! 3. An explicit settings file path.
//! 4. Heuristic search: find the platform root above the search directory,
//!    then apply the flavor's [`SettingsLayout`].
//!
//! Exhausting every step is [`BootError::SettingsNotFound`]. A search that
//! finds no platform at all is [`BootError::PlatformNotFound`] instead.
//!
//! Note that a configuration directory (step 1) outranks the environment
//! variable (step 2).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::env::EnvSnapshot;
use crate::error::BootError;
use crate::flavors::{self, SettingsLayout};
use crate::matcher::{self, FlavorTable};
use crate::multisite;
use crate::types::{
    FlavorDescriptor, Resolution, SearchOptions, SettingsLocation, SettingsSource, SiteWarning,
};

/// Env var value that means "not set, keep searching".
pub const AUTO_SENTINEL: &str = "Auto";

pub const DEFAULT_SETTINGS_FILE: &str = "civicrm.settings.php";

/// A hook that may name the configuration directory.
pub trait DiscoveryHook {
    /// Return the configuration directory, or `None` to skip this step.
    fn discover(&self, search_dir: &Path) -> Result<Option<PathBuf>, BootError>;
}

impl<H: DiscoveryHook + ?Sized> DiscoveryHook for Box<H> {
    fn discover(&self, search_dir: &Path) -> Result<Option<PathBuf>, BootError> {
        (**self).discover(search_dir)
    }
}

/// Reads `conf_dir = "..."` from a TOML file.
///
/// Relative directories are resolved against the file's own directory. A
/// missing file means the hook has nothing to say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiscoveryHook {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DiscoveryFile {
    conf_dir: Option<PathBuf>,
}

impl FileDiscoveryHook {
    pub const FILE_NAME: &'static str = "discovery.toml";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `discovery.toml` in the platform config directory, if one exists for this OS.
    pub fn platform_default() -> Option<Self> {
        let dirs = directories::ProjectDirs::from("", "", "platboot")?;
        Some(Self::new(dirs.config_dir().join(Self::FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DiscoveryHook for FileDiscoveryHook {
    fn discover(&self, _search_dir: &Path) -> Result<Option<PathBuf>, BootError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BootError::IoError {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };
        let parsed: DiscoveryFile =
            toml::from_str(&content).map_err(|e| BootError::ParseError {
                path: self.path.clone(),
                source: e,
            })?;
        let base = self.path.parent().unwrap_or(Path::new(""));
        Ok(parsed.conf_dir.map(|dir| base.join(dir)))
    }
}

/// Finds the application settings file.
pub struct SettingsLocator {
    table: FlavorTable,
    hook: Option<Box<dyn DiscoveryHook>>,
    settings_file_name: String,
}

impl Default for SettingsLocator {
    fn default() -> Self {
        Self::new(DEFAULT_SETTINGS_FILE)
    }
}

impl SettingsLocator {
    pub fn new(settings_file_name: &str) -> Self {
        Self {
            table: FlavorTable::standard(),
            hook: None,
            settings_file_name: settings_file_name.to_string(),
        }
    }

    pub fn with_table(mut self, table: FlavorTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_hook(mut self, hook: impl DiscoveryHook + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn table(&self) -> &FlavorTable {
        &self.table
    }

    pub fn settings_file_name(&self) -> &str {
        &self.settings_file_name
    }

    /// Locate the settings file. See the module docs for precedence.
    pub fn locate(
        &self,
        options: &SearchOptions,
        env: &EnvSnapshot,
        cwd: &Path,
    ) -> Result<SettingsLocation, BootError> {
        self.resolve(options, env, cwd).map(|r| r.settings)
    }

    /// Locate the settings file and report the platform around it.
    ///
    /// `cwd` anchors relative paths and is the default search directory.
    pub fn resolve(
        &self,
        options: &SearchOptions,
        env: &EnvSnapshot,
        cwd: &Path,
    ) -> Result<Resolution, BootError> {
        let search_dir = cwd.join(options.search_dir.as_deref().unwrap_or(cwd));

        if let Some(settings) = self.direct_settings(options, env, cwd, &search_dir)? {
            let platform = options
                .search
                .then(|| matcher::find_platform_root(&search_dir, &self.table, options.pinned_flavor))
                .flatten();
            return Ok(self.finish(platform, settings, Vec::new()));
        }

        if !options.search {
            return Err(BootError::SettingsNotFound {
                strategy: "search disabled and no explicit location was usable".into(),
                env_var: self.env_hint(options),
            });
        }

        let platform =
            matcher::find_platform_root(&search_dir, &self.table, options.pinned_flavor)
                .ok_or_else(|| BootError::PlatformNotFound {
                    search_dir: search_dir.clone(),
                })?;

        let (found, warnings) = self.search_platform(&platform, options, &search_dir)?;
        match found {
            Some(path) => Ok(self.finish(
                Some(platform),
                SettingsLocation {
                    path,
                    source: SettingsSource::Search,
                },
                warnings,
            )),
            None => Err(BootError::SettingsNotFound {
                strategy: format!(
                    "searched the {} root at {}",
                    platform.flavor,
                    platform.root_path.display()
                ),
                env_var: self.env_hint(options),
            }),
        }
    }

    fn finish(
        &self,
        platform: Option<FlavorDescriptor>,
        settings: SettingsLocation,
        warnings: Vec<SiteWarning>,
    ) -> Resolution {
        tracing::info!(
            settings = %settings.path.display(),
            source = ?settings.source,
            flavor = ?platform.as_ref().map(|p| p.flavor),
            "resolved settings file"
        );
        Resolution {
            platform,
            settings,
            warnings,
        }
    }

    fn env_hint(&self, options: &SearchOptions) -> String {
        options
            .env_var_name
            .clone()
            .unwrap_or_else(|| "CIVICRM_SETTINGS".to_string())
    }

    /// Steps 1-3: locations that need no search.
    fn direct_settings(
        &self,
        options: &SearchOptions,
        env: &EnvSnapshot,
        cwd: &Path,
        search_dir: &Path,
    ) -> Result<Option<SettingsLocation>, BootError> {
        let conf_dir = match &options.conf_dir_override {
            Some(dir) => Some(cwd.join(dir)),
            None => match &self.hook {
                Some(hook) => hook.discover(search_dir)?,
                None => None,
            },
        };
        if let Some(dir) = conf_dir {
            let candidate = dir.join(&self.settings_file_name);
            tracing::debug!(path = %candidate.display(), "probing configuration directory");
            if candidate.is_file() {
                return Ok(Some(SettingsLocation {
                    path: candidate,
                    source: SettingsSource::ConfDir,
                }));
            }
        }

        if let Some(name) = &options.env_var_name
            && let Some(value) = env.get(name)
            && value != AUTO_SENTINEL
        {
            let candidate = cwd.join(value);
            tracing::debug!(var = %name, path = %candidate.display(), "probing settings env var");
            if candidate.is_file() {
                return Ok(Some(SettingsLocation {
                    path: candidate,
                    source: SettingsSource::EnvVar,
                }));
            }
        }

        if let Some(explicit) = &options.explicit_settings_file {
            let candidate = cwd.join(explicit);
            tracing::debug!(path = %candidate.display(), "probing explicit settings file");
            if candidate.is_file() {
                return Ok(Some(SettingsLocation {
                    path: candidate,
                    source: SettingsSource::Explicit,
                }));
            }
        }

        Ok(None)
    }

    /// Step 4: apply the flavor's settings layout under a found root.
    fn search_platform(
        &self,
        platform: &FlavorDescriptor,
        options: &SearchOptions,
        search_dir: &Path,
    ) -> Result<(Option<PathBuf>, Vec<SiteWarning>), BootError> {
        let root = &platform.root_path;
        let name = self.settings_file_name.as_str();
        let layout = flavors::booter(platform.flavor).settings_layout();

        let found = match layout {
            SettingsLayout::Multisite => {
                let candidates =
                    multisite::site_dirs(root, options.http_host.as_deref(), search_dir)?;
                let hit = first_existing(candidates.dirs.iter().map(|d| d.join(name)));
                return Ok((hit, candidates.warnings));
            }
            SettingsLayout::AdminCopy { admin, site } => {
                first_existing([root.join(admin).join(name), root.join(site).join(name)])
            }
            SettingsLayout::Globs(patterns) => {
                let base = crate::search::normalize_slashes(root);
                patterns
                    .iter()
                    .find_map(|pattern| matcher::first_glob_match(&base, &format!("{pattern}/{name}")))
            }
            SettingsLayout::Standalone {
                dirs,
                alternate_names,
            } => {
                let names: Vec<&str> = std::iter::once(name)
                    .chain(alternate_names.iter().copied())
                    .collect();
                first_existing(dirs.iter().flat_map(|dir| {
                    let base = root.join(dir);
                    names.iter().map(move |n| base.join(n)).collect::<Vec<_>>()
                }))
            }
        };
        Ok((found, Vec::new()))
    }
}

fn first_existing(candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|path| {
        let hit = path.is_file();
        tracing::debug!(path = %path.display(), hit, "probing settings candidate");
        hit
    })
}
