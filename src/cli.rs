//! Clap adapter.
//!
//! Compiled only with the `clap` feature (on by default). [`BootArgs`] can be
//! flattened into any `#[derive(Parser)]` struct; [`BootArgs::into_request`]
//! turns it into a [`BootRequest`](crate::BootRequest), and everything after
//! that runs through the clap-free
//! [`BootOrchestrator::run`](crate::BootOrchestrator::run).

use std::path::PathBuf;

use clap::Args;

use crate::types::{BootLevel, BootRequest, Flavor};

/// Boot options shared by every command.
///
/// ```ignore
/// #[derive(Parser)]
/// struct Cli {
///     #[command(flatten)]
///     boot: BootArgs,
/// }
/// ```
#[derive(Debug, Args)]
pub struct BootArgs {
    /// Start the search from this directory instead of the working directory.
    #[arg(long = "cwd", value_name = "DIR")]
    pub search_dir: Option<PathBuf>,

    /// How far to boot: none, settings, platform (alias cms), or full.
    #[arg(long, default_value = "full")]
    pub level: BootLevel,

    /// URL of the simulated web request.
    #[arg(long)]
    pub url: Option<String>,

    /// Log in as this user.
    #[arg(short = 'U', long)]
    pub user: Option<String>,

    /// Hostname used to pick a tenant on multisite platforms.
    #[arg(long)]
    pub hostname: Option<String>,

    /// Path of the application settings file.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Platform spec such as `wordpress:///var/www/site?user=admin`.
    #[arg(long, value_name = "SPEC")]
    pub platform: Option<String>,

    /// Only consider this platform flavor.
    #[arg(long, value_parser = parse_flavor)]
    pub flavor: Option<Flavor>,
}

fn parse_flavor(s: &str) -> Result<Flavor, String> {
    s.parse::<Flavor>().map_err(|e| e.to_string())
}

impl BootArgs {
    pub fn into_request(self) -> BootRequest {
        BootRequest {
            level: self.level,
            search_dir: self.search_dir,
            url: self.url,
            user: self.user,
            hostname: self.hostname,
            settings_file: self.settings,
            platform: self.platform,
            flavor: self.flavor,
        }
    }
}
