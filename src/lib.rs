//! Find and boot an installed CMS-hosted application from the command line.
//!
//! A command-line tool for a web application has to answer several questions
//! before it can run anything: where is the settings file, which host platform
//! (CMS flavor) is the application installed in, which tenant of a multisite
//! install is meant, and what would the request look like if this were a web
//! hit. Platboot answers them and sequences the boot.
//!
//! ```ignore
//! let resolution = platboot::resolve(&SearchOptions {
//!     env_var_name: Some("CIVICRM_SETTINGS".into()),
//!     ..SearchOptions::default()
//! })?;
//! println!("{}", resolution.settings.path.display());
//! ```
//!
//! # Resolution
//!
//! [`SettingsLocator`] finds the settings file. Explicit locations come first
//! (a configuration directory, the settings environment variable, an explicit
//! path). When none of them names an existing file, it walks upward from the
//! search directory, deepest directory first, until a directory matches a
//! flavor's marker files. The flavor then says where its settings live:
//!
//! - **Multisite** flavors keep one settings file per tenant under
//!   `sites/<name>/`. The tenant comes from the working directory or from the
//!   target hostname, with `sites/sites.php` aliases applied.
//! - **Joomla** keeps an administrative and a public copy; the administrative
//!   one wins.
//! - **WordPress** installs vary, so a short list of directory globs is tried.
//! - **Standalone** installs have no CMS; the root and `data/` are tried.
//!
//! The flavor table is ordered data ([`FlavorTable`]). Earlier flavors win
//! ties at the same directory.
//!
//! # Boot
//!
//! [`BootOrchestrator`] runs two stages and owns the resulting state:
//!
//! 1. [`boot_platform`](BootOrchestrator::boot_platform) locates the root,
//!    checks the flavor's entry file, builds a simulated web request
//!    ([`WebContext`]), changes into the root and runs the flavor's boot steps.
//! 2. [`boot_application`](BootOrchestrator::boot_application) finds the
//!    application core, bundled in the platform tree or named by the settings
//!    file, and establishes the requested user.
//!
//! Process effects (working directory, environment) go through the [`Host`]
//! trait and user accounts through [`IdentityProvider`], so both can be
//! replaced in tests.
//!
//! # Configuration
//!
//! The tool's own settings live in [`BootConfig`], layered from compiled
//! defaults, `platboot.toml` files and `PLATBOOT__*` environment variables.
//! See the [`config`] module.
//!
//! # CLI
//!
//! With the `clap` feature (on by default), [`BootArgs`] provides the common
//! flags and converts into a framework-agnostic [`BootRequest`].
//!
//! # Logging
//!
//! The library logs through `tracing` and never installs a subscriber.
//! Each probe is logged at `debug`, resolutions and state changes at `info`,
//! and multisite alias misses at `warn`.

pub mod config;
pub mod error;
pub mod types;

mod boot;
#[cfg(feature = "clap")]
mod cli;
mod env;
mod flavors;
mod host;
mod identity;
mod matcher;
mod multisite;
mod platform_spec;
mod search;
mod settings;
mod web;

#[cfg(test)]
mod fixtures;

pub use boot::{
    AppEntry, ApplicationRuntime, BootOrchestrator, BootOrchestratorBuilder, BootReport,
    BootState, Runtime,
};
#[cfg(feature = "clap")]
pub use cli::BootArgs;
pub use config::{BootConfig, ConfigLoader, WebConfig};
pub use env::EnvSnapshot;
pub use error::BootError;
pub use flavors::{PlatformBooter, SettingsLayout, UserSyncRoutine, booter};
pub use host::{Host, SystemHost};
pub use identity::{
    IdentityProvider, StaticIdentityProvider, UnavailableIdentity, UserContact, UserIdentity,
};
pub use matcher::{FlavorRule, FlavorTable, find_platform_root, match_dir};
pub use multisite::{AliasMap, SiteCandidates, resolve_sites, site_dirs};
pub use platform_spec::{PlatformSpec, RootSpec};
pub use search::{ancestors, normalize_slashes};
pub use settings::{DiscoveryHook, FileDiscoveryHook, SettingsLocator};
pub use types::{
    BootLevel, BootRequest, Flavor, FlavorDescriptor, Resolution, SearchOptions,
    SettingsLocation, SettingsSource, SiteWarning,
};
pub use web::{WebContext, detect_default_url, effective_url, simulate};

/// Locate the settings file for the current process.
///
/// Uses the working directory and environment of the running process and the
/// discovery file in the platform config directory, if there is one.
pub fn resolve(options: &SearchOptions) -> Result<Resolution, BootError> {
    let host = SystemHost;
    let mut locator = SettingsLocator::default();
    if let Some(hook) = FileDiscoveryHook::platform_default() {
        locator = locator.with_hook(hook);
    }
    locator.resolve(options, &host.vars(), &host.current_dir()?)
}
