//! Tool configuration.
//!
//! [`BootConfig`] is resolved from layers, lowest priority first:
//!
//! 1. Compiled defaults (`#[config(default = ...)]`)
//! 2. `platboot.toml` in the platform config directory
//! 3. Explicit config files, in the order they were added
//! 4. `PLATBOOT__*` environment variables (`__` separates nesting levels)
//! 5. Programmatic overrides, as dotted keys
//!
//! [`resolve_config`] does the merging on pre-loaded data, so the whole
//! pipeline can be tested without touching the disk or the process
//! environment. [`ConfigLoader`] gathers that data.

use std::path::{Path, PathBuf};

use confique::Config;
use serde::{Deserialize, Serialize};
use toml::{Table, Value};

use crate::env::{self, EnvSnapshot};
use crate::error::BootError;

pub const CONFIG_FILE_NAME: &str = "platboot.toml";
pub const ENV_PREFIX: &str = "PLATBOOT";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BootConfig {
    /// File name of the application settings file.
    #[config(default = "civicrm.settings.php")]
    pub settings_file_name: String,

    /// Environment variable that may name the settings file directly.
    /// The value `Auto` means "search instead".
    #[config(default = "CIVICRM_SETTINGS")]
    pub settings_env: String,

    /// Environment variable holding a platform spec such as
    /// `wordpress:///var/www/site?user=admin`.
    #[config(default = "CIVICRM_BOOT")]
    pub platform_env: String,

    /// Base URL of the site, used when no URL is given or inherited.
    pub base_url: Option<String>,

    /// TOML file that may name a configuration directory (`conf_dir = "..."`).
    pub discovery_file: Option<PathBuf>,

    /// Simulated web request.
    #[config(nested)]
    pub web: WebConfig,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WebConfig {
    /// Build a synthetic request context before booting the platform.
    #[config(default = true)]
    pub simulate: bool,

    /// Value of `SERVER_SOFTWARE`. An empty string is still set.
    #[config(default = "")]
    pub server_software: String,
}

impl BootConfig {
    /// Compiled defaults only.
    pub fn defaults() -> Result<Self, BootError> {
        resolve_config(ConfigInput::default())
    }
}

/// A commented TOML template generated from the doc comments above.
pub fn template() -> String {
    confique::toml::template::<BootConfig>(confique::toml::FormatOptions::default())
}

/// Pre-loaded configuration layers. No I/O happens while resolving these.
#[derive(Debug, Clone, Default)]
pub struct ConfigInput {
    /// File contents, lowest priority first.
    pub files: Vec<(PathBuf, String)>,
    pub env: EnvSnapshot,
    /// `None` disables the environment layer.
    pub env_prefix: Option<String>,
    /// `(dotted.key, value)` pairs; later entries win.
    pub overrides: Vec<(String, Value)>,
    /// Reject keys the config does not know.
    pub strict: bool,
}

/// Merge every layer and let confique fill in defaults.
pub fn resolve_config(input: ConfigInput) -> Result<BootConfig, BootError> {
    let mut merged = Table::new();
    for (path, content) in &input.files {
        if input.strict {
            reject_unknown_keys(content, path)?;
        }
        let table: Table = toml::from_str(content).map_err(|e| BootError::ParseError {
            path: path.clone(),
            source: e,
        })?;
        merged = deep_merge(merged, table);
    }

    if let Some(prefix) = &input.env_prefix {
        merged = deep_merge(merged, env::config_layer(prefix, &input.env));
    }

    if !input.overrides.is_empty() {
        merged = deep_merge(merged, overrides_table(&input.overrides));
    }

    let layer: <BootConfig as Config>::Layer =
        Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| BootError::ParseError {
                path: PathBuf::from("<merged>"),
                source: e,
            })?;

    Ok(BootConfig::builder().preloaded(layer).load()?)
}

/// Overlay `top` on `base`, recursing where both sides hold a table.
fn deep_merge(mut base: Table, top: Table) -> Table {
    for (key, value) in top {
        let merged = match (base.remove(&key), value) {
            (Some(Value::Table(lower)), Value::Table(upper)) => Value::Table(deep_merge(lower, upper)),
            (_, upper) => upper,
        };
        base.insert(key, merged);
    }
    base
}

fn overrides_table(entries: &[(String, Value)]) -> Table {
    let mut table = Table::new();
    for (key, value) in entries {
        let segments: Vec<&str> = key.split('.').collect();
        insert_dotted(&mut table, &segments, value.clone());
    }
    table
}

/// A scalar in the way of a deeper key is replaced by a table.
fn insert_dotted(table: &mut Table, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [leaf] => {
            table.insert(leaf.to_string(), value);
        }
        [head, rest @ ..] => {
            let slot = table
                .entry(head.to_string())
                .or_insert_with(|| Value::Table(Table::new()));
            if !slot.is_table() {
                *slot = Value::Table(Table::new());
            }
            if let Value::Table(sub) = slot {
                insert_dotted(sub, rest, value);
            }
        }
    }
}

/// Strict mode: fail on keys that [`BootConfig`] does not consume.
fn reject_unknown_keys(content: &str, path: &Path) -> Result<(), BootError> {
    let mut unknown = Vec::new();
    let deserializer = toml::Deserializer::new(content);
    let _: <BootConfig as Config>::Layer =
        serde_ignored::deserialize(deserializer, |ignored| unknown.push(ignored.to_string()))
            .map_err(|e| BootError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;

    if unknown.is_empty() {
        return Ok(());
    }
    Err(BootError::UnknownKeys(
        unknown
            .into_iter()
            .map(|key| BootError::UnknownKey {
                line: key_line(content, &key),
                key,
                path: path.to_path_buf(),
            })
            .collect(),
    ))
}

/// 1-based line of `dotted_key` in `content`, or 0 when it cannot be found.
///
/// Only understands `[section]` headers and bare `key = value` lines.
fn key_line(content: &str, dotted_key: &str) -> usize {
    let (section, leaf) = match dotted_key.rsplit_once('.') {
        Some((section, leaf)) => (section, leaf),
        None => ("", dotted_key),
    };
    let mut current = String::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if let Some(header) = line.strip_prefix('[')
            && !header.starts_with('[')
        {
            current = header
                .trim_end_matches(']')
                .split('.')
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(".");
            continue;
        }
        if current == section
            && let Some(rest) = line.strip_prefix(leaf)
            && rest.trim_start().starts_with('=')
        {
            return idx + 1;
        }
    }
    0
}

/// `platboot.toml` in the platform config directory.
pub fn platform_config_path() -> Option<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "platboot")?;
    Some(dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Collects config layers from disk and resolves them.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    platform_file: bool,
    files: Vec<PathBuf>,
    env_prefix: Option<String>,
    strict: bool,
    overrides: Vec<(String, Value)>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            platform_file: true,
            files: Vec::new(),
            env_prefix: Some(ENV_PREFIX.to_string()),
            strict: true,
            overrides: Vec::new(),
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an explicit config file. Unlike the platform file, it must exist.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    /// Skip `platboot.toml` in the platform config directory.
    pub fn no_platform_file(mut self) -> Self {
        self.platform_file = false;
        self
    }

    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self
    }

    pub fn no_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Enable or disable strict mode (default: `true`).
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Add an override. `None` is ignored, which suits optional CLI flags.
    pub fn set<V: Into<Value>>(mut self, key: &str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.overrides.push((key.to_string(), v.into()));
        }
        self
    }

    fn read_files(&self) -> Result<Vec<(PathBuf, String)>, BootError> {
        let mut out = Vec::new();
        if self.platform_file
            && let Some(path) = platform_config_path()
        {
            match std::fs::read_to_string(&path) {
                Ok(content) => out.push((path, content)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(BootError::IoError { path, source: e }),
            }
        }
        for path in &self.files {
            let content = std::fs::read_to_string(path).map_err(|e| BootError::IoError {
                path: path.clone(),
                source: e,
            })?;
            out.push((path.clone(), content));
        }
        Ok(out)
    }

    /// Read the files and resolve every layer against `env`.
    pub fn load(&self, env: &EnvSnapshot) -> Result<BootConfig, BootError> {
        let files = self.read_files()?;
        tracing::debug!(files = files.len(), "loading configuration");
        resolve_config(ConfigInput {
            files,
            env: env.clone(),
            env_prefix: self.env_prefix.clone(),
            overrides: self.overrides.clone(),
            strict: self.strict,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::SiteTree;

    fn input() -> ConfigInput {
        ConfigInput {
            strict: true,
            env_prefix: Some(ENV_PREFIX.into()),
            ..ConfigInput::default()
        }
    }

    fn file(content: &str) -> (PathBuf, String) {
        (PathBuf::from("/etc/platboot.toml"), content.to_string())
    }

    #[test]
    fn defaults_only() {
        let config = BootConfig::defaults().unwrap();
        assert_eq!(config.settings_file_name, "civicrm.settings.php");
        assert_eq!(config.settings_env, "CIVICRM_SETTINGS");
        assert_eq!(config.platform_env, "CIVICRM_BOOT");
        assert_eq!(config.base_url, None);
        assert!(config.web.simulate);
        assert_eq!(config.web.server_software, "");
    }

    #[test]
    fn later_file_wins() {
        let config = resolve_config(ConfigInput {
            files: vec![
                file("base_url = \"http://one.test\"\n"),
                file("base_url = \"http://two.test\"\n[web]\nsimulate = false\n"),
            ],
            ..input()
        })
        .unwrap();
        assert_eq!(config.base_url.as_deref(), Some("http://two.test"));
        assert!(!config.web.simulate);
    }

    #[test]
    fn env_beats_file_and_override_beats_env() {
        let env: EnvSnapshot = [
            ("PLATBOOT__BASE_URL", "http://env.test"),
            ("PLATBOOT__WEB__SERVER_SOFTWARE", "nginx"),
        ]
        .into_iter()
        .collect();
        let config = resolve_config(ConfigInput {
            files: vec![file("base_url = \"http://file.test\"\n")],
            env: env.clone(),
            ..input()
        })
        .unwrap();
        assert_eq!(config.base_url.as_deref(), Some("http://env.test"));
        assert_eq!(config.web.server_software, "nginx");

        let config = resolve_config(ConfigInput {
            env,
            overrides: vec![("web.server_software".into(), Value::from("Apache"))],
            ..input()
        })
        .unwrap();
        assert_eq!(config.web.server_software, "Apache");
    }

    #[test]
    fn env_disabled_ignores_prefix() {
        let config = resolve_config(ConfigInput {
            env: [("PLATBOOT__BASE_URL", "http://env.test")].into_iter().collect(),
            env_prefix: None,
            ..input()
        })
        .unwrap();
        assert_eq!(config.base_url, None);
    }

    #[test]
    fn strict_reports_unknown_key_with_line() {
        let err = resolve_config(ConfigInput {
            files: vec![file("base_url = \"http://x.test\"\n\n[web]\nsimulat = true\n")],
            ..input()
        })
        .unwrap_err();
        let BootError::UnknownKeys(errors) = err else {
            panic!("expected UnknownKeys, got {err}");
        };
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            BootError::UnknownKey { key, line, .. } => {
                assert_eq!(key, "web.simulat");
                assert_eq!(*line, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lenient_mode_ignores_unknown_keys() {
        let config = resolve_config(ConfigInput {
            files: vec![file("typo = 1\n")],
            strict: false,
            ..input()
        })
        .unwrap();
        assert_eq!(config.settings_file_name, "civicrm.settings.php");
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let err = resolve_config(ConfigInput {
            files: vec![file("base_url = \n")],
            ..input()
        })
        .unwrap_err();
        assert!(matches!(err, BootError::ParseError { .. }));
    }

    #[test]
    fn loader_reads_explicit_file() {
        let tree = SiteTree::new();
        let path = tree.file_with("conf/platboot.toml", "settings_env = \"MY_SETTINGS\"\n");
        let config = ConfigLoader::new()
            .no_platform_file()
            .file(&path)
            .set("base_url", Some("https://cli.test"))
            .load(&EnvSnapshot::default())
            .unwrap();
        assert_eq!(config.settings_env, "MY_SETTINGS");
        assert_eq!(config.base_url.as_deref(), Some("https://cli.test"));
    }

    #[test]
    fn loader_missing_explicit_file_is_io_error() {
        let tree = SiteTree::new();
        let err = ConfigLoader::new()
            .no_platform_file()
            .file(tree.path("absent.toml"))
            .load(&EnvSnapshot::default())
            .unwrap_err();
        assert!(matches!(err, BootError::IoError { .. }));
    }

    #[test]
    fn none_override_is_skipped() {
        let loader = ConfigLoader::new().set::<String>("base_url", None);
        assert!(loader.overrides.is_empty());
    }

    #[test]
    fn template_lists_fields() {
        let t = template();
        assert!(t.contains("settings_file_name"));
        assert!(t.contains("server_software"));
        assert!(t.contains("File name of the application settings file"));
    }

    #[test]
    fn override_replaces_scalar_in_the_way() {
        let table = overrides_table(&[
            ("web".into(), Value::from(1)),
            ("web.simulate".into(), Value::from(false)),
        ]);
        assert_eq!(table["web"]["simulate"].as_bool(), Some(false));
    }

    #[test]
    fn key_line_top_level_and_section() {
        let content = "a = 1\n[web]\nsimulate = true\n";
        assert_eq!(key_line(content, "a"), 1);
        assert_eq!(key_line(content, "web.simulate"), 3);
        assert_eq!(key_line(content, "web.missing"), 0);
    }
}
