//! Per-flavor knowledge: markers, entry files, settings layout, and boot steps.
//!
//! Every supported [`Flavor`] has one [`PlatformBooter`] implementation. The
//! orchestrator never branches on flavor names itself; it asks the booter.
//! [`booter`] is an exhaustive `match`, so adding a flavor without a booter
//! does not compile.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::BootError;
use crate::multisite;
use crate::types::{Flavor, SiteWarning};

/// Sub-roots tested under each candidate directory, in order.
pub const CMS_SUB_ROOTS: &[&str] = &["", "web"];
pub const STANDALONE_SUB_ROOTS: &[&str] = &["", "web", "srv"];

/// File whose presence marks a directory as holding the application core.
pub const APP_CORE_MARKER: &str = "CRM/Core/Config.php";

/// Where a flavor keeps the application settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsLayout {
    /// One settings file per tenant under `sites/<name>/`.
    Multisite,
    /// Two copies exist; the administrative one is authoritative.
    AdminCopy {
        admin: &'static str,
        site: &'static str,
    },
    /// Install layout varies; probe these directory globs in order.
    Globs(&'static [&'static str]),
    /// Probe each directory for the settings name, then each alternate name.
    Standalone {
        dirs: &'static [&'static str],
        alternate_names: &'static [&'static str],
    },
}

/// Identity synchronization routine a flavor uses to map a platform account
/// to an application contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSyncRoutine {
    DrupalAccount,
    BackdropAccount,
    WordPressUser,
    JoomlaUser,
}

/// Mutable state a booter fills in while booting its platform.
#[derive(Debug)]
pub struct PlatformBoot<'a> {
    pub root: &'a Path,
    /// Directory the caller started from; picks the tenant when no host is known.
    pub search_dir: &'a Path,
    /// Hostname the caller asked for, if any.
    pub http_host: Option<&'a str>,
    pub constants: BTreeMap<String, String>,
    pub loaded: Vec<PathBuf>,
    pub site_dir: Option<PathBuf>,
    pub warnings: Vec<SiteWarning>,
}

impl<'a> PlatformBoot<'a> {
    pub fn new(root: &'a Path, search_dir: &'a Path, http_host: Option<&'a str>) -> Self {
        Self {
            root,
            search_dir,
            http_host,
            constants: BTreeMap::new(),
            loaded: Vec::new(),
            site_dir: None,
            warnings: Vec::new(),
        }
    }

    fn define(&mut self, name: &str, value: impl Into<String>) {
        self.constants.entry(name.to_string()).or_insert(value.into());
    }

    fn load(&mut self, relative: &str) {
        self.loaded.push(self.root.join(relative));
    }

    /// Pick the tenant directory holding the platform's own `settings.php`.
    fn select_site(&mut self) -> Result<(), BootError> {
        let candidates = multisite::site_dirs(self.root, self.http_host, self.search_dir)?;
        self.warnings.extend(candidates.warnings);
        self.site_dir = candidates
            .dirs
            .into_iter()
            .find(|dir| dir.join("settings.php").is_file());
        tracing::debug!(site_dir = ?self.site_dir, "selected platform site directory");
        Ok(())
    }
}

/// Boot capability of one platform flavor.
pub trait PlatformBooter: Sync {
    fn flavor(&self) -> Flavor;

    /// Marker globs, relative to a candidate root, in priority order.
    fn markers(&self) -> &'static [&'static str];

    /// Sub-roots tried under each directory (`""` is the directory itself).
    fn sub_roots(&self) -> &'static [&'static str] {
        CMS_SUB_ROOTS
    }

    /// The platform's own bootstrap file, relative to the root.
    fn entry_file(&self) -> &'static str;

    /// Script a simulated web request claims to run.
    fn web_entry(&self) -> &'static str {
        "index.php"
    }

    fn root_constant(&self) -> &'static str;

    fn settings_layout(&self) -> SettingsLayout;

    /// Directories, relative to the root, where the application core may be bundled.
    fn app_dirs(&self) -> &'static [&'static str];

    fn user_sync(&self) -> Option<UserSyncRoutine>;

    /// The application hosts itself and owns its identity store.
    fn self_hosting(&self) -> bool {
        false
    }

    /// Test whether `dir` is a root of this flavor.
    fn detect(&self, dir: &Path) -> Option<PathBuf> {
        crate::matcher::match_markers(dir, self.markers(), self.sub_roots())
    }

    /// Run the flavor-specific boot steps.
    fn boot(&self, platform: &mut PlatformBoot<'_>) -> Result<(), BootError>;
}

/// The booter for `flavor`.
pub fn booter(flavor: Flavor) -> &'static dyn PlatformBooter {
    match flavor {
        Flavor::Backdrop => &Backdrop,
        Flavor::Drupal8 => &Drupal8,
        Flavor::Drupal => &Drupal,
        Flavor::Joomla => &Joomla,
        Flavor::WordPress => &WordPress,
        Flavor::Standalone => &Standalone,
    }
}

fn root_string(root: &Path) -> String {
    crate::search::normalize_slashes(root)
}

pub struct Backdrop;

impl PlatformBooter for Backdrop {
    fn flavor(&self) -> Flavor {
        Flavor::Backdrop
    }

    fn markers(&self) -> &'static [&'static str] {
        &["core/modules/layout/layout.module"]
    }

    fn entry_file(&self) -> &'static str {
        "core/includes/bootstrap.inc"
    }

    fn root_constant(&self) -> &'static str {
        "BACKDROP_ROOT"
    }

    fn settings_layout(&self) -> SettingsLayout {
        SettingsLayout::Multisite
    }

    fn app_dirs(&self) -> &'static [&'static str] {
        &["modules/civicrm", "modules/contrib/civicrm"]
    }

    fn user_sync(&self) -> Option<UserSyncRoutine> {
        Some(UserSyncRoutine::BackdropAccount)
    }

    fn boot(&self, platform: &mut PlatformBoot<'_>) -> Result<(), BootError> {
        platform.define(self.root_constant(), root_string(platform.root));
        platform.select_site()?;
        platform.load(self.entry_file());
        Ok(())
    }
}

pub struct Drupal8;

impl PlatformBooter for Drupal8 {
    fn flavor(&self) -> Flavor {
        Flavor::Drupal8
    }

    fn markers(&self) -> &'static [&'static str] {
        &["core/lib/Drupal.php"]
    }

    fn entry_file(&self) -> &'static str {
        "autoload.php"
    }

    fn root_constant(&self) -> &'static str {
        "DRUPAL_ROOT"
    }

    fn settings_layout(&self) -> SettingsLayout {
        SettingsLayout::Multisite
    }

    fn app_dirs(&self) -> &'static [&'static str] {
        &["../vendor/civicrm/civicrm-core", "vendor/civicrm/civicrm-core"]
    }

    fn user_sync(&self) -> Option<UserSyncRoutine> {
        Some(UserSyncRoutine::DrupalAccount)
    }

    fn boot(&self, platform: &mut PlatformBoot<'_>) -> Result<(), BootError> {
        platform.define(self.root_constant(), root_string(platform.root));
        platform.select_site()?;
        platform.load(self.entry_file());
        platform.load("core/includes/bootstrap.inc");
        Ok(())
    }
}

pub struct Drupal;

impl PlatformBooter for Drupal {
    fn flavor(&self) -> Flavor {
        Flavor::Drupal
    }

    fn markers(&self) -> &'static [&'static str] {
        &["modules/system/system.module"]
    }

    fn entry_file(&self) -> &'static str {
        "includes/bootstrap.inc"
    }

    fn root_constant(&self) -> &'static str {
        "DRUPAL_ROOT"
    }

    fn settings_layout(&self) -> SettingsLayout {
        SettingsLayout::Multisite
    }

    fn app_dirs(&self) -> &'static [&'static str] {
        &[
            "sites/all/modules/civicrm",
            "sites/all/modules/contrib/civicrm",
        ]
    }

    fn user_sync(&self) -> Option<UserSyncRoutine> {
        Some(UserSyncRoutine::DrupalAccount)
    }

    fn boot(&self, platform: &mut PlatformBoot<'_>) -> Result<(), BootError> {
        platform.define(self.root_constant(), root_string(platform.root));
        platform.select_site()?;
        platform.load(self.entry_file());
        Ok(())
    }
}

pub struct Joomla;

impl PlatformBooter for Joomla {
    fn flavor(&self) -> Flavor {
        Flavor::Joomla
    }

    fn markers(&self) -> &'static [&'static str] {
        &["administrator/components/com_*/*.php"]
    }

    fn entry_file(&self) -> &'static str {
        "administrator/includes/framework.php"
    }

    fn web_entry(&self) -> &'static str {
        "administrator/index.php"
    }

    fn root_constant(&self) -> &'static str {
        "JPATH_BASE"
    }

    fn settings_layout(&self) -> SettingsLayout {
        SettingsLayout::AdminCopy {
            admin: "administrator/components/com_civicrm",
            site: "components/com_civicrm",
        }
    }

    fn app_dirs(&self) -> &'static [&'static str] {
        &["administrator/components/com_civicrm/civicrm"]
    }

    fn user_sync(&self) -> Option<UserSyncRoutine> {
        Some(UserSyncRoutine::JoomlaUser)
    }

    fn boot(&self, platform: &mut PlatformBoot<'_>) -> Result<(), BootError> {
        platform.define("_JEXEC", "1");
        let admin = platform.root.join("administrator");
        platform.define(self.root_constant(), root_string(&admin));
        platform.load("administrator/includes/defines.php");
        platform.load(self.entry_file());
        Ok(())
    }
}

pub struct WordPress;

impl PlatformBooter for WordPress {
    fn flavor(&self) -> Flavor {
        Flavor::WordPress
    }

    fn markers(&self) -> &'static [&'static str] {
        &["wp-includes/version.php", "wp-load.php"]
    }

    fn entry_file(&self) -> &'static str {
        "wp-load.php"
    }

    fn root_constant(&self) -> &'static str {
        "ABSPATH"
    }

    fn settings_layout(&self) -> SettingsLayout {
        SettingsLayout::Globs(&[
            "wp-content/uploads/civicrm",
            "wp-content/plugins/civicrm",
            "wp-content/plugins/*/civicrm",
        ])
    }

    fn app_dirs(&self) -> &'static [&'static str] {
        &["wp-content/plugins/civicrm/civicrm"]
    }

    fn user_sync(&self) -> Option<UserSyncRoutine> {
        Some(UserSyncRoutine::WordPressUser)
    }

    fn boot(&self, platform: &mut PlatformBoot<'_>) -> Result<(), BootError> {
        // ABSPATH carries a trailing slash.
        let abspath = format!("{}/", root_string(platform.root).trim_end_matches('/'));
        platform.define(self.root_constant(), abspath);
        platform.define("WP_USE_THEMES", "false");
        platform.load(self.entry_file());
        Ok(())
    }
}

pub struct Standalone;

impl PlatformBooter for Standalone {
    fn flavor(&self) -> Flavor {
        Flavor::Standalone
    }

    fn markers(&self) -> &'static [&'static str] {
        &["civicrm.standalone.php"]
    }

    fn sub_roots(&self) -> &'static [&'static str] {
        STANDALONE_SUB_ROOTS
    }

    fn entry_file(&self) -> &'static str {
        "vendor/autoload.php"
    }

    fn root_constant(&self) -> &'static str {
        "CIVICRM_STANDALONE_ROOT"
    }

    fn settings_layout(&self) -> SettingsLayout {
        SettingsLayout::Standalone {
            dirs: &["", "data"],
            alternate_names: &["settings.php"],
        }
    }

    fn app_dirs(&self) -> &'static [&'static str] {
        &["vendor/civicrm/civicrm-core", "core"]
    }

    fn user_sync(&self) -> Option<UserSyncRoutine> {
        None
    }

    fn self_hosting(&self) -> bool {
        true
    }

    fn boot(&self, platform: &mut PlatformBoot<'_>) -> Result<(), BootError> {
        platform.define(self.root_constant(), root_string(platform.root));
        platform.load(self.entry_file());
        Ok(())
    }
}
