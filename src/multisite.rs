//! Tenant (site) directory resolution for multisite platforms.
//!
//! Given a platform root, an optional target hostname, and the directory the
//! search started from, [`resolve_sites`] lists the `sites/*` directories to
//! probe, most specific first, always ending with `sites/default`.
//!
//! Hostname handling follows the multisite convention: `host:port` becomes
//! `port.host`, the name is split into labels, and every suffix from the full
//! name down to the last label is tried (`a.b.example.com`, `b.example.com`,
//! `example.com`, `com`). Each suffix may be redirected through the alias map
//! in `sites/sites.php`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::BootError;
use crate::search::normalize_slashes;
use crate::types::SiteWarning;

pub const SITES_DIR: &str = "sites";
pub const DEFAULT_SITE: &str = "default";
pub const ALIAS_FILE: &str = "sites.php";

static ALIAS_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\$sites\s*\[\s*['"]([^'"]*)['"]\s*\]\s*=\s*['"]([^'"]*)['"]\s*;"#)
        .expect("alias assignment pattern is valid")
});

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment pattern is valid"));

/// Hostname to site directory aliases, read from `sites/sites.php`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    aliases: HashMap<String, String>,
}

impl AliasMap {
    /// Extract `$sites['host'] = 'dir';` assignments. Later assignments win.
    pub fn parse(content: &str) -> Self {
        let without_blocks = BLOCK_COMMENT.replace_all(content, "");
        let mut aliases = HashMap::new();
        for line in without_blocks.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("//") || trimmed.starts_with('#') {
                continue;
            }
            for caps in ALIAS_ASSIGNMENT.captures_iter(line) {
                aliases.insert(caps[1].to_string(), caps[2].to_string());
            }
        }
        Self { aliases }
    }

    /// Read the alias file. A missing file is an empty map.
    pub fn load(path: &Path) -> Result<Self, BootError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(BootError::IoError {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    pub fn get(&self, host: &str) -> Option<&str> {
        self.aliases.get(host).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Ordered site directories to probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteCandidates {
    pub dirs: Vec<PathBuf>,
    pub warnings: Vec<SiteWarning>,
}

/// Domain suffixes for `host`, longest first.
///
/// `example.com:8080` yields `8080.example.com`, `example.com`, `com`.
pub fn domain_suffixes(host: &str) -> Vec<String> {
    let host = host.trim().trim_end_matches('.');
    if host.is_empty() {
        return Vec::new();
    }
    let joined = match split_port(host) {
        (name, Some(port)) => format!("{port}.{name}"),
        (name, None) => name.to_string(),
    };
    let labels: Vec<&str> = joined.split('.').filter(|l| !l.is_empty()).collect();
    (1..=labels.len())
        .rev()
        .map(|j| labels[labels.len() - j..].join("."))
        .collect()
}

/// Split a trailing `:port` off `host`. A bracketed IPv6 literal keeps its
/// inner colons; a bare one has no port.
fn split_port(host: &str) -> (&str, Option<&str>) {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => {
                let port = host[end + 1..].strip_prefix(':').filter(|p| !p.is_empty());
                (&host[..=end], port)
            }
            None => (host, None),
        };
    }
    match host.split_once(':') {
        Some((name, port)) if !port.contains(':') => (name, Some(port).filter(|p| !p.is_empty())),
        _ => (host, None),
    }
}

/// Name of the site directory when `search_dir` sits inside `{root}/sites/<name>`
/// (other than `sites/all`).
fn enclosing_site(root: &Path, search_dir: &Path) -> Option<String> {
    let sites_prefix = format!(
        "{}/{SITES_DIR}/",
        normalize_slashes(root).trim_end_matches('/')
    );
    let search = normalize_slashes(search_dir);
    let rest = format!("{search}/");
    let rest = rest.strip_prefix(&sites_prefix)?;
    let name = rest.split('/').next().filter(|n| !n.is_empty())?;
    (name != "all").then(|| name.to_string())
}

/// Compute the site directories to probe, most specific first.
///
/// With no `target_host`, a `search_dir` inside `{root}/sites/<name>` wins
/// outright and is the only candidate.
pub fn resolve_sites(
    root: &Path,
    target_host: Option<&str>,
    search_dir: &Path,
    aliases: &AliasMap,
) -> SiteCandidates {
    let sites = root.join(SITES_DIR);

    if target_host.is_none()
        && let Some(name) = enclosing_site(root, search_dir)
    {
        tracing::debug!(site = %name, "working directory selects site");
        return SiteCandidates {
            dirs: vec![sites.join(name)],
            warnings: Vec::new(),
        };
    }

    let mut out = SiteCandidates::default();
    for suffix in target_host.map(domain_suffixes).unwrap_or_default() {
        let candidate = match aliases.get(&suffix) {
            Some(target) if sites.join(target).is_dir() => target.to_string(),
            Some(target) => {
                let warning = SiteWarning {
                    alias: suffix.clone(),
                    target: target.to_string(),
                    missing_dir: sites.join(target),
                };
                tracing::warn!("{warning}");
                out.warnings.push(warning);
                suffix
            }
            None => suffix,
        };
        out.dirs.push(sites.join(candidate));
    }
    out.dirs.push(sites.join(DEFAULT_SITE));
    out
}

/// Load `{root}/sites/sites.php` and resolve candidates against it.
pub fn site_dirs(
    root: &Path,
    target_host: Option<&str>,
    search_dir: &Path,
) -> Result<SiteCandidates, BootError> {
    let aliases = AliasMap::load(&root.join(SITES_DIR).join(ALIAS_FILE))?;
    Ok(resolve_sites(root, target_host, search_dir, &aliases))
}
