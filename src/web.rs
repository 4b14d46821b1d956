//! Web request simulation.
//!
//! Platform code reads `$_SERVER`-style variables and misbehaves when they are
//! missing. [`simulate`] builds a [`WebContext`] describing a plain `GET`
//! request for a URL, so the platform sees a consistent request.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::env::EnvSnapshot;
use crate::error::BootError;

pub const SERVER_NAME: &str = "SERVER_NAME";
pub const HTTP_HOST: &str = "HTTP_HOST";
pub const SERVER_PORT: &str = "SERVER_PORT";
pub const HTTPS: &str = "HTTPS";
pub const SCRIPT_FILENAME: &str = "SCRIPT_FILENAME";
pub const SCRIPT_NAME: &str = "SCRIPT_NAME";
pub const REMOTE_ADDR: &str = "REMOTE_ADDR";
pub const SERVER_SOFTWARE: &str = "SERVER_SOFTWARE";
pub const REQUEST_METHOD: &str = "REQUEST_METHOD";

/// Every variable a simulated request may carry.
pub const KNOWN_VARS: [&str; 9] = [
    SERVER_NAME,
    HTTP_HOST,
    SERVER_PORT,
    HTTPS,
    SCRIPT_FILENAME,
    SCRIPT_NAME,
    REMOTE_ADDR,
    SERVER_SOFTWARE,
    REQUEST_METHOD,
];

pub const DEFAULT_URL: &str = "http://localhost";

/// Synthetic request variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WebContext {
    vars: BTreeMap<String, String>,
}

impl WebContext {
    /// Host, port and scheme variables for `url`.
    pub fn from_url(url: &str) -> Result<Self, BootError> {
        let parsed = url::Url::parse(url).map_err(|e| BootError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let host = parsed.host_str().ok_or_else(|| BootError::InvalidUrl {
            url: url.to_string(),
            reason: "no host".into(),
        })?;
        let https = parsed.scheme() == "https";

        let mut ctx = Self::default();
        ctx.set(SERVER_NAME, host);
        match parsed.port() {
            Some(port) => {
                ctx.set(HTTP_HOST, format!("{host}:{port}"));
                ctx.set(SERVER_PORT, port.to_string());
            }
            None => {
                ctx.set(HTTP_HOST, host);
                ctx.set(SERVER_PORT, if https { "443" } else { "80" });
            }
        }
        if https {
            ctx.set(HTTPS, "on");
        }
        Ok(ctx)
    }

    /// The request variables already present in `env`.
    pub fn inherit(env: &EnvSnapshot) -> Self {
        let mut ctx = Self::default();
        for name in KNOWN_VARS {
            if let Some(value) = env.get_raw(name) {
                ctx.set(name, value);
            }
        }
        ctx
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    fn set(&mut self, name: &str, value: impl Into<String>) {
        self.vars.insert(name.to_string(), value.into());
    }

    /// Fill in `HTTP_HOST` when nothing set it. Returns whether it changed.
    pub fn backfill_host(&mut self, host: &str) -> bool {
        if self.get(HTTP_HOST).is_some_and(|h| !h.is_empty()) {
            return false;
        }
        self.set(HTTP_HOST, host);
        true
    }
}

/// URL implied by an inherited `HTTP_HOST`, if it is a bare host.
pub fn detect_default_url(env: &EnvSnapshot) -> Option<String> {
    env.get(HTTP_HOST)
        .filter(|host| !host.contains("://"))
        .map(|host| format!("http://{host}"))
}

/// The URL to simulate: explicit, then inherited, then configured, then localhost.
pub fn effective_url(explicit: Option<&str>, env: &EnvSnapshot, base_url: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| detect_default_url(env))
        .or_else(|| base_url.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_URL.to_string())
}

/// Build the full simulated request context.
///
/// `server_software` is copied as given; an empty string is a real value and
/// is not the same as leaving the variable out. `SCRIPT_NAME` comes from the
/// inherited environment when set, otherwise from the script's file name, and
/// always starts with `/`.
pub fn simulate(
    url: Option<&str>,
    script_file: &Path,
    server_software: &str,
    inherited: &EnvSnapshot,
) -> Result<WebContext, BootError> {
    let mut ctx = match url {
        Some(url) => WebContext::from_url(url)?,
        None => WebContext::default(),
    };
    ctx.set(REMOTE_ADDR, "127.0.0.1");
    ctx.set(REQUEST_METHOD, "GET");
    ctx.set(SCRIPT_FILENAME, script_file.to_string_lossy());
    ctx.set(SERVER_SOFTWARE, server_software);

    let script_name = inherited
        .get(SCRIPT_NAME)
        .map(str::to_string)
        .or_else(|| {
            script_file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_default();
    let script_name = if script_name.starts_with('/') {
        script_name
    } else {
        format!("/{script_name}")
    };
    ctx.set(SCRIPT_NAME, script_name);

    tracing::debug!(vars = ?ctx.vars, "simulated web request");
    Ok(ctx)
}
