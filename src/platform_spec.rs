//! Parser for platform specs such as `wordpress:///var/www/site?user=admin`.
//!
//! Accepted forms:
//!
//! - `Auto`: detect flavor and root by searching from the working directory.
//! - `{flavor}://{path}?{query}`: `flavor` is a flavor name or `Auto`; `path`
//!   is the platform root, or empty / `Auto` to search. The query may carry
//!   `user` and `host`, form-encoded.
//!
//! With a flavor and a path, the path is the root itself. With `Auto` as the
//! flavor and a path, the path is where the search starts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::BootError;
use crate::settings::AUTO_SENTINEL;
use crate::types::Flavor;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RootSpec {
    #[default]
    Auto,
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlatformSpec {
    pub flavor: Option<Flavor>,
    pub root: RootSpec,
    pub user: Option<String>,
    pub host: Option<String>,
}

impl PlatformSpec {
    /// `Auto` with no extras.
    pub fn auto() -> Self {
        Self::default()
    }

    pub fn is_auto(&self) -> bool {
        self.flavor.is_none() && self.root == RootSpec::Auto
    }

    /// Make a relative root absolute against `cwd`.
    pub fn anchored(mut self, cwd: &Path) -> Self {
        if let RootSpec::Path(path) = &self.root
            && path.is_relative()
        {
            self.root = RootSpec::Path(cwd.join(path));
        }
        self
    }
}

fn invalid(spec: &str, reason: impl Into<String>) -> BootError {
    BootError::InvalidPlatformSpec {
        spec: spec.to_string(),
        reason: reason.into(),
    }
}

impl FromStr for PlatformSpec {
    type Err = BootError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let trimmed = spec.trim();
        if trimmed == AUTO_SENTINEL {
            return Ok(Self::auto());
        }

        let (flavor, rest) = trimmed
            .split_once("://")
            .ok_or_else(|| invalid(spec, "expected 'Auto' or '<flavor>://<path>'"))?;

        let flavor = if flavor == AUTO_SENTINEL {
            None
        } else {
            Some(
                flavor
                    .parse::<Flavor>()
                    .map_err(|_| invalid(spec, format!("unknown flavor '{flavor}'")))?,
            )
        };

        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let root = if path.is_empty() || path == AUTO_SENTINEL {
            RootSpec::Auto
        } else {
            RootSpec::Path(PathBuf::from(path))
        };

        let mut parsed = Self {
            flavor,
            root,
            user: None,
            host: None,
        };
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match &*key {
                "user" => &mut parsed.user,
                "host" => &mut parsed.host,
                other => return Err(invalid(spec, format!("unknown parameter '{other}'"))),
            };
            if slot.is_some() {
                return Err(invalid(spec, format!("parameter '{key}' given twice")));
            }
            *slot = Some(value.into_owned());
        }
        Ok(parsed)
    }
}

impl fmt::Display for PlatformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_auto() && self.user.is_none() && self.host.is_none() {
            return f.write_str(AUTO_SENTINEL);
        }
        let flavor = self.flavor.map_or(AUTO_SENTINEL, Flavor::name);
        let path = match &self.root {
            RootSpec::Auto => AUTO_SENTINEL.to_string(),
            RootSpec::Path(p) => p.display().to_string(),
        };
        write!(f, "{flavor}://{path}")?;

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(user) = &self.user {
            query.append_pair("user", user);
        }
        if let Some(host) = &self.host {
            query.append_pair("host", host);
        }
        let query = query.finish();
        if !query.is_empty() {
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}
