//! The two-stage boot state machine.
//!
//! ```text
//! Unbooted --boot_platform--> PlatformBooted --boot_application--> ApplicationBooted
//!     \                            \
//!      `------------------------> Failed(reason) <--------------------'
//! ```
//!
//! A [`BootOrchestrator`] owns its state; there is no process-wide flag.
//! Booting a stage that already completed is a no-op that hands back the
//! existing [`Runtime`]. `Failed` is terminal.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::config::BootConfig;
use crate::error::BootError;
use crate::flavors::{self, APP_CORE_MARKER, PlatformBoot, PlatformBooter};
use crate::host::{Host, SystemHost};
use crate::identity::{IdentityProvider, UnavailableIdentity, UserContact, UserIdentity};
use crate::matcher::{self, FlavorTable};
use crate::platform_spec::{PlatformSpec, RootSpec};
use crate::settings::{DiscoveryHook, FileDiscoveryHook, SettingsLocator};
use crate::types::{
    BootLevel, BootRequest, Flavor, FlavorDescriptor, Resolution, SearchOptions,
    SettingsLocation, SiteWarning,
};
use crate::web::{self, WebContext};

static CORE_ROOT_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\$civicrm_root\s*=\s*['"]([^'"]+)['"]\s*;"#)
        .expect("core root pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootState {
    Unbooted,
    PlatformBooted,
    ApplicationBooted,
    Failed(String),
}

impl fmt::Display for BootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootState::Unbooted => f.write_str("unbooted"),
            BootState::PlatformBooted => f.write_str("platform booted"),
            BootState::ApplicationBooted => f.write_str("application booted"),
            BootState::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// How the application core was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppEntry {
    /// The core ships inside the platform tree.
    Integrated,
    /// The core lives elsewhere; its location came from the settings file.
    Glue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationRuntime {
    pub entry: AppEntry,
    pub core_root: PathBuf,
    pub settings: Option<PathBuf>,
}

/// Everything a booted process knows about its platform and application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Runtime {
    pub platform: FlavorDescriptor,
    pub site_dir: Option<PathBuf>,
    pub web: WebContext,
    /// Constants defined before the platform's own bootstrap ran.
    pub constants: BTreeMap<String, String>,
    /// Bootstrap files, in load order.
    pub loaded: Vec<PathBuf>,
    pub warnings: Vec<SiteWarning>,
    pub user: Option<UserIdentity>,
    pub contact: Option<UserContact>,
    pub application: Option<ApplicationRuntime>,
}

/// What [`BootOrchestrator::boot_to`] reached.
#[derive(Debug, Clone, Serialize)]
pub struct BootReport {
    pub level: BootLevel,
    pub state: BootState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<Runtime>,
}

#[derive(Default)]
pub struct BootOrchestratorBuilder {
    config: Option<BootConfig>,
    host: Option<Box<dyn Host>>,
    identity: Option<Box<dyn IdentityProvider>>,
    table: Option<FlavorTable>,
    hook: Option<Box<dyn DiscoveryHook>>,
    no_discovery: bool,
}

impl BootOrchestratorBuilder {
    pub fn config(mut self, config: BootConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn host(mut self, host: impl Host + 'static) -> Self {
        self.host = Some(Box::new(host));
        self
    }

    pub fn identity(mut self, identity: impl IdentityProvider + 'static) -> Self {
        self.identity = Some(Box::new(identity));
        self
    }

    pub fn table(mut self, table: FlavorTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Replace the file-based discovery hook.
    pub fn hook(mut self, hook: impl DiscoveryHook + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Skip the discovery step entirely.
    pub fn no_discovery(mut self) -> Self {
        self.no_discovery = true;
        self
    }

    pub fn build(self) -> Result<BootOrchestrator, BootError> {
        let config = match self.config {
            Some(config) => config,
            None => BootConfig::defaults()?,
        };

        let hook: Option<Box<dyn DiscoveryHook>> = if self.no_discovery {
            None
        } else if let Some(hook) = self.hook {
            Some(hook)
        } else if let Some(path) = &config.discovery_file {
            Some(Box::new(FileDiscoveryHook::new(path)))
        } else {
            FileDiscoveryHook::platform_default().map(|h| Box::new(h) as Box<dyn DiscoveryHook>)
        };

        let mut locator = SettingsLocator::new(&config.settings_file_name)
            .with_table(self.table.unwrap_or_default());
        if let Some(hook) = hook {
            locator = locator.with_hook(hook);
        }

        Ok(BootOrchestrator {
            host: self.host.unwrap_or_else(|| Box::new(SystemHost)),
            identity: self
                .identity
                .unwrap_or_else(|| Box::new(UnavailableIdentity)),
            locator,
            config,
            state: BootState::Unbooted,
            runtime: None,
            search_dir: None,
            url: None,
            settings_file: None,
            user: None,
            invoked_from: None,
            target_host: None,
        })
    }
}

pub struct BootOrchestrator {
    config: BootConfig,
    host: Box<dyn Host>,
    identity: Box<dyn IdentityProvider>,
    locator: SettingsLocator,
    state: BootState,
    runtime: Option<Runtime>,
    search_dir: Option<PathBuf>,
    url: Option<String>,
    settings_file: Option<PathBuf>,
    user: Option<String>,
    /// Working directory at the start of the platform boot.
    invoked_from: Option<PathBuf>,
    /// Hostname the caller asked for; never the simulated default.
    target_host: Option<String>,
}

impl BootOrchestrator {
    pub fn builder() -> BootOrchestratorBuilder {
        BootOrchestratorBuilder::default()
    }

    pub fn state(&self) -> &BootState {
        &self.state
    }

    pub fn runtime(&self) -> Option<&Runtime> {
        self.runtime.as_ref()
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    pub fn host(&self) -> &dyn Host {
        self.host.as_ref()
    }

    /// Read the platform spec from the configured environment variable.
    /// Unset means `Auto`.
    pub fn platform_spec_from_env(&self) -> Result<PlatformSpec, BootError> {
        match self.host.vars().get(&self.config.platform_env) {
            Some(raw) => raw.parse(),
            None => Ok(PlatformSpec::auto()),
        }
    }

    /// Carry out a [`BootRequest`] produced by the CLI layer.
    pub fn run(&mut self, request: &BootRequest) -> Result<BootReport, BootError> {
        self.search_dir = request.search_dir.clone();
        self.url = request.url.clone();
        self.settings_file = request.settings_file.clone();

        let mut spec = match &request.platform {
            Some(raw) => raw.parse()?,
            None => self.platform_spec_from_env()?,
        };
        if spec.flavor.is_none() {
            spec.flavor = request.flavor;
        }
        if request.user.is_some() {
            spec.user = request.user.clone();
        }
        if request.hostname.is_some() {
            spec.host = request.hostname.clone();
        }
        self.reach(request.level, spec)
    }

    /// Boot as far as `level`, taking the platform spec from the environment.
    pub fn boot_to(&mut self, level: BootLevel) -> Result<BootReport, BootError> {
        let spec = self.platform_spec_from_env()?;
        self.reach(level, spec)
    }

    fn reach(&mut self, level: BootLevel, spec: PlatformSpec) -> Result<BootReport, BootError> {
        let mut resolution = None;
        match level {
            BootLevel::None => {}
            BootLevel::Settings => resolution = Some(self.resolve_settings(spec)?),
            BootLevel::Platform => {
                self.boot_platform(spec)?;
            }
            BootLevel::Full => {
                self.boot_platform(spec)?;
                self.boot_application()?;
            }
        }
        Ok(BootReport {
            level,
            state: self.state.clone(),
            resolution,
            runtime: self.runtime.clone(),
        })
    }

    /// Locate the settings file without booting anything.
    pub fn resolve_settings(&self, spec: PlatformSpec) -> Result<Resolution, BootError> {
        let cwd = self.invocation_dir()?;
        let spec = spec.anchored(&cwd);
        let http_host = self.requested_host(&spec);
        let search_dir = match spec.root {
            RootSpec::Path(path) => Some(path),
            RootSpec::Auto => self.search_dir.clone(),
        };
        let options = self.search_options(search_dir, spec.flavor, http_host);
        self.locator.resolve(&options, &self.host.vars(), &cwd)
    }

    /// The directory relative paths are anchored on. Once a platform boot has
    /// started this stays the directory it started from.
    fn invocation_dir(&self) -> Result<PathBuf, BootError> {
        match &self.invoked_from {
            Some(dir) => Ok(dir.clone()),
            None => self.host.current_dir(),
        }
    }

    fn start_dir(&self, cwd: &Path) -> PathBuf {
        cwd.join(self.search_dir.as_deref().unwrap_or(cwd))
    }

    /// Hostname from the spec, else from an explicit URL.
    fn requested_host(&self, spec: &PlatformSpec) -> Option<String> {
        spec.host.clone().or_else(|| {
            let context = WebContext::from_url(self.url.as_deref()?).ok()?;
            context.get(web::HTTP_HOST).map(str::to_string)
        })
    }

    fn search_options(
        &self,
        search_dir: Option<PathBuf>,
        pinned_flavor: Option<Flavor>,
        http_host: Option<String>,
    ) -> SearchOptions {
        SearchOptions {
            search_dir,
            explicit_settings_file: self.settings_file.clone(),
            env_var_name: Some(self.config.settings_env.clone()),
            pinned_flavor,
            http_host,
            ..SearchOptions::default()
        }
    }

    fn invalid_state(&self, action: &'static str) -> BootError {
        BootError::InvalidState {
            action,
            state: self.state.to_string(),
        }
    }

    fn current_runtime(&self, action: &'static str) -> Result<&Runtime, BootError> {
        self.runtime
            .as_ref()
            .ok_or_else(|| self.invalid_state(action))
    }

    fn fail(&mut self, err: BootError) -> BootError {
        tracing::warn!(error = %err, "boot failed");
        self.state = BootState::Failed(err.to_string());
        err
    }

    /// Stage one: find and boot the host platform.
    pub fn boot_platform(&mut self, spec: PlatformSpec) -> Result<&Runtime, BootError> {
        const ACTION: &str = "boot the platform";
        match self.state {
            BootState::Unbooted => {}
            BootState::PlatformBooted | BootState::ApplicationBooted => {
                tracing::debug!(state = %self.state, "platform already booted");
                return self.current_runtime(ACTION);
            }
            BootState::Failed(_) => return Err(self.invalid_state(ACTION)),
        }

        match self.start_platform(spec) {
            Ok(runtime) => {
                tracing::info!(
                    flavor = %runtime.platform.flavor,
                    root = %runtime.platform.root_path.display(),
                    "platform booted"
                );
                self.runtime = Some(runtime);
                self.state = BootState::PlatformBooted;
            }
            Err(e) => return Err(self.fail(e)),
        }
        self.current_runtime(ACTION)
    }

    fn locate_platform(&self, spec: &PlatformSpec, cwd: &Path) -> Result<FlavorDescriptor, BootError> {
        if let (Some(flavor), RootSpec::Path(root)) = (spec.flavor, &spec.root) {
            if !root.is_dir() {
                return Err(BootError::PlatformNotFound {
                    search_dir: root.clone(),
                });
            }
            return Ok(FlavorDescriptor {
                flavor,
                root_path: root.clone(),
            });
        }

        let start = match &spec.root {
            RootSpec::Path(path) => path.clone(),
            RootSpec::Auto => self.start_dir(cwd),
        };
        let found = matcher::find_platform_root(&start, self.locator.table(), spec.flavor);
        found.ok_or(BootError::PlatformNotFound { search_dir: start })
    }

    fn start_platform(&mut self, spec: PlatformSpec) -> Result<Runtime, BootError> {
        let cwd = self.host.current_dir()?;
        self.invoked_from = Some(cwd.clone());
        let env = self.host.vars();
        let spec = spec.anchored(&cwd);
        if spec.user.is_some() {
            self.user = spec.user.clone();
        }
        self.target_host = self.requested_host(&spec);
        let search_dir = self.start_dir(&cwd);

        let platform = self.locate_platform(&spec, &cwd)?;
        let booter = flavors::booter(platform.flavor);
        let entry = platform.root_path.join(booter.entry_file());
        if !entry.is_file() {
            return Err(BootError::PlatformBootstrapMissing {
                flavor: platform.flavor,
                root: platform.root_path,
                entry,
            });
        }

        // The request context must exist before the platform's bootstrap runs.
        let web = if self.config.web.simulate {
            let explicit = self
                .url
                .clone()
                .or_else(|| spec.host.as_ref().map(|h| format!("http://{h}")));
            let url = web::effective_url(explicit.as_deref(), &env, self.config.base_url.as_deref());
            web::simulate(
                Some(&url),
                &platform.root_path.join(booter.web_entry()),
                &self.config.web.server_software,
                &env,
            )?
        } else {
            WebContext::inherit(&env)
        };

        self.host.set_current_dir(&platform.root_path)?;
        let mut boot = PlatformBoot::new(
            &platform.root_path,
            &search_dir,
            self.target_host.as_deref(),
        );
        booter.boot(&mut boot)?;
        let PlatformBoot {
            constants,
            loaded,
            site_dir,
            warnings,
            ..
        } = boot;

        let mut runtime = Runtime {
            platform,
            site_dir,
            web,
            constants,
            loaded,
            warnings,
            user: None,
            contact: None,
            application: None,
        };

        // Self-hosting flavors keep accounts inside the application, which is
        // not up yet.
        if let Some(principal) = &self.user
            && !booter.self_hosting()
        {
            runtime.user = Some(self.identity.login(runtime.platform.flavor, principal)?);
        }
        Ok(runtime)
    }

    /// Stage two: boot the application on top of the booted platform.
    pub fn boot_application(&mut self) -> Result<&Runtime, BootError> {
        const ACTION: &str = "boot the application";
        match self.state {
            BootState::PlatformBooted => {}
            BootState::ApplicationBooted => return self.current_runtime(ACTION),
            _ => return Err(self.invalid_state(ACTION)),
        }

        let Some(mut runtime) = self.runtime.take() else {
            return Err(self.invalid_state(ACTION));
        };
        let result = self.start_application(&mut runtime);
        self.runtime = Some(runtime);
        if let Err(e) = result {
            return Err(self.fail(e));
        }

        self.state = BootState::ApplicationBooted;
        tracing::info!("application booted");
        self.current_runtime(ACTION)
    }

    fn start_application(&self, runtime: &mut Runtime) -> Result<(), BootError> {
        let flavor = runtime.platform.flavor;
        let booter = flavors::booter(flavor);
        runtime.application = Some(self.detect_application(runtime, booter)?);

        if let Some(base) = &self.config.base_url {
            let from_base = WebContext::from_url(base)?;
            if let Some(host) = from_base.get(web::HTTP_HOST)
                && runtime.web.backfill_host(host)
            {
                tracing::debug!(host, "backfilled HTTP_HOST from base URL");
            }
        }

        if let Some(principal) = &self.user {
            if booter.self_hosting() {
                runtime.user = Some(self.identity.login(flavor, principal)?);
            } else {
                sync_contact(self.identity.as_ref(), runtime, principal)?;
            }
        }
        Ok(())
    }

    fn detect_application(
        &self,
        runtime: &Runtime,
        booter: &dyn PlatformBooter,
    ) -> Result<ApplicationRuntime, BootError> {
        let root = &runtime.platform.root_path;

        let bundled = booter
            .app_dirs()
            .iter()
            .map(|dir| root.join(dir))
            .find(|dir| dir.join(APP_CORE_MARKER).is_file());
        if let Some(core_root) = bundled {
            tracing::debug!(core = %core_root.display(), "application core is bundled");
            return Ok(ApplicationRuntime {
                entry: AppEntry::Integrated,
                core_root,
                settings: self.optional_settings(runtime)?.map(|l| l.path),
            });
        }

        if booter.self_hosting() {
            return Err(BootError::StandaloneApplication { root: root.clone() });
        }

        if let Some(location) = self.optional_settings(runtime)?
            && let Some(core_root) = core_root_from_settings(&location.path, root)?
            && core_root.join(APP_CORE_MARKER).is_file()
        {
            tracing::debug!(core = %core_root.display(), "application core found through settings");
            return Ok(ApplicationRuntime {
                entry: AppEntry::Glue,
                core_root,
                settings: Some(location.path),
            });
        }

        Err(BootError::NoApplicationDetected {
            flavor: runtime.platform.flavor,
            root: root.clone(),
        })
    }

    /// The settings file for a booted platform, or `None` when there is none.
    fn optional_settings(&self, runtime: &Runtime) -> Result<Option<SettingsLocation>, BootError> {
        let cwd = self.invocation_dir()?;
        let root = &runtime.platform.root_path;
        let start = self.start_dir(&cwd);
        let search_dir = if start.starts_with(root) {
            start
        } else {
            root.clone()
        };
        let options = self.search_options(
            Some(search_dir),
            Some(runtime.platform.flavor),
            self.target_host.clone(),
        );
        match self.locator.locate(&options, &self.host.vars(), &cwd) {
            Ok(location) => Ok(Some(location)),
            Err(BootError::SettingsNotFound { .. } | BootError::PlatformNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Link `principal` to its application contact. Requires a booted application.
    pub fn ensure_user_contact(&mut self, principal: &str) -> Result<UserContact, BootError> {
        const ACTION: &str = "establish a user contact";
        if self.state != BootState::ApplicationBooted {
            return Err(self.invalid_state(ACTION));
        }
        let Some(runtime) = self.runtime.as_mut() else {
            return Err(BootError::InvalidState {
                action: ACTION,
                state: self.state.to_string(),
            });
        };
        sync_contact(self.identity.as_ref(), runtime, principal)
    }
}

fn sync_contact(
    identity: &dyn IdentityProvider,
    runtime: &mut Runtime,
    principal: &str,
) -> Result<UserContact, BootError> {
    if let Some(contact) = &runtime.contact
        && contact.principal == principal
    {
        return Ok(contact.clone());
    }

    let flavor = runtime.platform.flavor;
    let routine = flavors::booter(flavor)
        .user_sync()
        .ok_or_else(|| BootError::UnrecognizedFlavor(flavor.name().to_string()))?;

    let user = match &runtime.user {
        Some(user) if user.principal == principal => user.clone(),
        _ => identity.login(flavor, principal)?,
    };
    let contact = identity.synchronize(routine, &user)?;
    tracing::info!(
        principal,
        contact_id = contact.contact_id,
        "user linked to contact"
    );
    runtime.user = Some(user);
    runtime.contact = Some(contact.clone());
    Ok(contact)
}

/// Read the `$civicrm_root` assignment from a settings file.
fn core_root_from_settings(settings: &Path, root: &Path) -> Result<Option<PathBuf>, BootError> {
    let content = std::fs::read_to_string(settings).map_err(|e| BootError::IoError {
        path: settings.to_path_buf(),
        source: e,
    })?;
    Ok(CORE_ROOT_ASSIGNMENT
        .captures(&content)
        .map(|caps| root.join(&caps[1])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{MemoryHost, SiteTree};
    use crate::identity::StaticIdentityProvider;

    fn orchestrator(host: MemoryHost) -> BootOrchestrator {
        BootOrchestrator::builder()
            .host(host)
            .no_discovery()
            .build()
            .unwrap()
    }

    fn with_identity(host: MemoryHost) -> BootOrchestrator {
        BootOrchestrator::builder()
            .host(host)
            .identity(StaticIdentityProvider::new().account("admin", 1, Some(101)))
            .no_discovery()
            .build()
            .unwrap()
    }

    #[test]
    fn marker_without_entry_file_is_bootstrap_missing() {
        let tree = SiteTree::new();
        tree.file("wp-includes/version.php");
        let mut boot = orchestrator(MemoryHost::new(tree.root()));

        let err = boot.boot_platform(PlatformSpec::auto()).unwrap_err();
        assert!(
            matches!(err, BootError::PlatformBootstrapMissing { flavor: Flavor::WordPress, .. }),
            "got {err}"
        );
        assert!(matches!(boot.state(), BootState::Failed(_)));

        let again = boot.boot_platform(PlatformSpec::auto()).unwrap_err();
        assert!(matches!(again, BootError::InvalidState { .. }));
    }

    #[test]
    fn auto_boot_from_plugin_dir_finds_wordpress_root() {
        let tree = SiteTree::wordpress();
        let start = tree.dir("wp-content/plugins/x");
        let mut boot = orchestrator(MemoryHost::new(&start));

        let runtime = boot.boot_platform(PlatformSpec::auto()).unwrap();
        assert_eq!(runtime.platform.flavor, Flavor::WordPress);
        assert_eq!(runtime.platform.root_path, tree.root());
        assert!(runtime.constants["ABSPATH"].ends_with('/'));
        assert_eq!(runtime.web.get(web::HTTP_HOST), Some("localhost"));
        assert_eq!(
            runtime.web.get(web::SCRIPT_FILENAME),
            Some(tree.path("index.php").to_str().unwrap())
        );
        assert_eq!(boot.host().current_dir().unwrap(), tree.root());
        assert_eq!(boot.state(), &BootState::PlatformBooted);
    }

    #[test]
    fn second_platform_boot_is_a_no_op() {
        let tree = SiteTree::wordpress();
        let mut boot = orchestrator(MemoryHost::new(tree.root()));
        let first = boot.boot_platform(PlatformSpec::auto()).unwrap().clone();

        let spec: PlatformSpec = "drupal:///elsewhere".parse().unwrap();
        let second = boot.boot_platform(spec).unwrap();
        assert_eq!(&first, second);
    }

    #[test]
    fn no_platform_anywhere_is_platform_not_found() {
        let tree = SiteTree::new();
        let spec: PlatformSpec = format!("drupal://{}", tree.path("missing").display())
            .parse()
            .unwrap();
        let mut boot = orchestrator(MemoryHost::new(tree.root()));
        assert!(matches!(
            boot.boot_platform(spec),
            Err(BootError::PlatformNotFound { .. })
        ));
    }

    #[test]
    fn explicit_spec_skips_detection() {
        let tree = SiteTree::drupal();
        let spec: PlatformSpec = format!("drupal://{}?host=example.com", tree.root().display())
            .parse()
            .unwrap();
        tree.file("sites/example.com/settings.php");
        let mut boot = orchestrator(MemoryHost::new("/"));

        let runtime = boot.boot_platform(spec).unwrap();
        assert_eq!(runtime.platform.flavor, Flavor::Drupal);
        assert_eq!(runtime.site_dir, Some(tree.path("sites/example.com")));
        assert_eq!(runtime.web.get(web::HTTP_HOST), Some("example.com"));
        assert_eq!(runtime.loaded, vec![tree.path("includes/bootstrap.inc")]);
    }

    #[test]
    fn application_before_platform_is_invalid() {
        let mut boot = orchestrator(MemoryHost::new("/"));
        assert!(matches!(
            boot.boot_application(),
            Err(BootError::InvalidState { .. })
        ));
    }

    #[test]
    fn bundled_core_boots_integrated() {
        let tree = SiteTree::wordpress();
        let core = tree.app_core("wp-content/plugins/civicrm/civicrm");
        let settings = tree.file("wp-content/uploads/civicrm/civicrm.settings.php");
        let mut boot = orchestrator(MemoryHost::new(tree.root()));

        boot.boot_platform(PlatformSpec::auto()).unwrap();
        let runtime = boot.boot_application().unwrap();
        let app = runtime.application.as_ref().unwrap();
        assert_eq!(app.entry, AppEntry::Integrated);
        assert_eq!(app.core_root, core);
        assert_eq!(app.settings.as_ref(), Some(&settings));
        assert_eq!(boot.state(), &BootState::ApplicationBooted);
    }

    #[test]
    fn glue_path_reads_core_root_from_settings() {
        let tree = SiteTree::drupal();
        let core = tree.app_core("vendor/civicrm-core");
        let settings = tree.file_with(
            "sites/default/civicrm.settings.php",
            &format!("<?php\n$civicrm_root = '{}';\n", core.display()),
        );
        let mut boot = orchestrator(MemoryHost::new(tree.root()));

        boot.boot_platform(PlatformSpec::auto()).unwrap();
        let runtime = boot.boot_application().unwrap();
        let app = runtime.application.as_ref().unwrap();
        assert_eq!(app.entry, AppEntry::Glue);
        assert_eq!(app.core_root, core);
        assert_eq!(app.settings.as_ref(), Some(&settings));
    }

    #[test]
    fn missing_core_is_no_application_detected() {
        let tree = SiteTree::wordpress();
        let mut boot = orchestrator(MemoryHost::new(tree.root()));
        boot.boot_platform(PlatformSpec::auto()).unwrap();
        assert!(matches!(
            boot.boot_application(),
            Err(BootError::NoApplicationDetected { flavor: Flavor::WordPress, .. })
        ));
        assert!(matches!(boot.state(), BootState::Failed(_)));
    }

    #[test]
    fn standalone_without_core_is_standalone_error() {
        let tree = SiteTree::standalone();
        let mut boot = orchestrator(MemoryHost::new(tree.root()));
        boot.boot_platform(PlatformSpec::auto()).unwrap();
        assert!(matches!(
            boot.boot_application(),
            Err(BootError::StandaloneApplication { .. })
        ));
    }

    #[test]
    fn standalone_user_login_waits_for_application() {
        let tree = SiteTree::standalone();
        tree.app_core("core");
        let mut boot = with_identity(MemoryHost::new(tree.root()));
        let spec: PlatformSpec = "Auto://Auto?user=admin".parse().unwrap();

        let runtime = boot.boot_platform(spec).unwrap();
        assert_eq!(runtime.user, None);

        let runtime = boot.boot_application().unwrap();
        assert_eq!(runtime.user.as_ref().unwrap().principal, "admin");
        assert_eq!(runtime.contact, None);

        assert!(matches!(
            boot.ensure_user_contact("admin"),
            Err(BootError::UnrecognizedFlavor(name)) if name == "standalone"
        ));
    }

    #[test]
    fn cms_user_logs_in_with_platform_and_links_after_application() {
        let tree = SiteTree::wordpress();
        tree.app_core("wp-content/plugins/civicrm/civicrm");
        let mut boot = with_identity(MemoryHost::new(tree.root()));
        let spec: PlatformSpec = "wordpress://Auto?user=admin".parse().unwrap();

        let runtime = boot.boot_platform(spec).unwrap();
        assert_eq!(runtime.user.as_ref().unwrap().account_id, 1);
        assert_eq!(runtime.contact, None);

        let runtime = boot.boot_application().unwrap();
        assert_eq!(runtime.contact.as_ref().unwrap().contact_id, 101);

        let again = boot.ensure_user_contact("admin").unwrap();
        assert_eq!(again.contact_id, 101);
    }

    #[test]
    fn unknown_user_fails_platform_boot() {
        let tree = SiteTree::wordpress();
        let mut boot = with_identity(MemoryHost::new(tree.root()));
        let spec: PlatformSpec = "Auto://Auto?user=ghost".parse().unwrap();
        assert!(matches!(
            boot.boot_platform(spec),
            Err(BootError::UserSyncFailure { .. })
        ));
    }

    #[test]
    fn contact_requires_booted_application() {
        let tree = SiteTree::wordpress();
        let mut boot = with_identity(MemoryHost::new(tree.root()));
        boot.boot_platform(PlatformSpec::auto()).unwrap();
        assert!(matches!(
            boot.ensure_user_contact("admin"),
            Err(BootError::InvalidState { .. })
        ));
    }

    #[test]
    fn base_url_backfills_missing_http_host() {
        let tree = SiteTree::wordpress();
        tree.app_core("wp-content/plugins/civicrm/civicrm");
        let mut config = BootConfig::defaults().unwrap();
        config.web.simulate = false;
        config.base_url = Some("https://example.org:8443".into());
        let mut boot = BootOrchestrator::builder()
            .config(config)
            .host(MemoryHost::new(tree.root()))
            .no_discovery()
            .build()
            .unwrap();

        let runtime = boot.boot_platform(PlatformSpec::auto()).unwrap();
        assert_eq!(runtime.web.get(web::HTTP_HOST), None);
        let runtime = boot.boot_application().unwrap();
        assert_eq!(runtime.web.get(web::HTTP_HOST), Some("example.org:8443"));
    }

    #[test]
    fn platform_spec_comes_from_env() {
        let tree = SiteTree::wordpress();
        let spec = format!("wordpress://{}", tree.root().display());
        let host = MemoryHost::new("/").with_env(&[("CIVICRM_BOOT", spec.as_str())]);
        let mut boot = orchestrator(host);

        let report = boot.boot_to(BootLevel::Platform).unwrap();
        assert_eq!(report.state, BootState::PlatformBooted);
        assert_eq!(report.runtime.unwrap().platform.root_path, tree.root());
    }

    #[test]
    fn run_settings_level_only_resolves() {
        let tree = SiteTree::wordpress();
        let settings = tree.file("wp-content/uploads/civicrm/civicrm.settings.php");
        let mut boot = orchestrator(MemoryHost::new(tree.root()));

        let report = boot
            .run(&BootRequest {
                level: BootLevel::Settings,
                ..BootRequest::default()
            })
            .unwrap();
        assert_eq!(report.resolution.unwrap().settings.path, settings);
        assert_eq!(report.state, BootState::Unbooted);
        assert!(report.runtime.is_none());
    }

    #[test]
    fn run_hostname_picks_multisite_tenant() {
        let tree = SiteTree::drupal();
        tree.file("sites/shop.example.com/settings.php");
        tree.file("sites/default/settings.php");
        let mut boot = orchestrator(MemoryHost::new(tree.root()));

        let report = boot
            .run(&BootRequest {
                level: BootLevel::Platform,
                hostname: Some("shop.example.com".into()),
                ..BootRequest::default()
            })
            .unwrap();
        let runtime = report.runtime.unwrap();
        assert_eq!(runtime.site_dir, Some(tree.path("sites/shop.example.com")));
    }

    #[test]
    fn full_boot_keeps_tenant_chosen_by_working_directory() {
        let tree = SiteTree::drupal();
        tree.app_core("sites/all/modules/civicrm");
        for site in ["default", "foo"] {
            tree.file(&format!("sites/{site}/settings.php"));
            tree.file(&format!("sites/{site}/civicrm.settings.php"));
        }
        let start = tree.dir("sites/foo/modules");
        let mut boot = orchestrator(MemoryHost::new(&start));

        let resolved = boot.resolve_settings(PlatformSpec::auto()).unwrap();
        assert_eq!(
            resolved.settings.path,
            tree.path("sites/foo/civicrm.settings.php")
        );

        let runtime = boot.boot_to(BootLevel::Full).unwrap().runtime.unwrap();
        assert_eq!(runtime.site_dir, Some(tree.path("sites/foo")));
        assert_eq!(
            runtime.application.unwrap().settings,
            Some(resolved.settings.path)
        );
    }

    #[test]
    fn relative_settings_env_stays_anchored_where_boot_started() {
        let tree = SiteTree::wordpress();
        tree.app_core("wp-content/plugins/civicrm/civicrm");
        tree.file("wp-content/uploads/civicrm/civicrm.settings.php");
        let local = tree.file("wp-content/plugins/x/local/civicrm.settings.php");
        let host = MemoryHost::new(tree.path("wp-content/plugins/x"))
            .with_env(&[("CIVICRM_SETTINGS", "local/civicrm.settings.php")]);
        let mut boot = orchestrator(host);

        boot.boot_to(BootLevel::Full).unwrap();
        assert_eq!(boot.host().current_dir().unwrap(), tree.root());
        let app = boot.runtime().unwrap().application.as_ref().unwrap();
        assert_eq!(app.entry, AppEntry::Integrated);
        assert_eq!(app.settings.as_ref(), Some(&local));

        let resolved = boot.resolve_settings(PlatformSpec::auto()).unwrap();
        assert_eq!(resolved.settings.path, local);
    }

    #[test]
    fn explicit_url_host_picks_tenant() {
        let tree = SiteTree::drupal();
        tree.file("sites/shop.example.com/settings.php");
        tree.file("sites/default/settings.php");
        let mut boot = orchestrator(MemoryHost::new(tree.root()));

        let report = boot
            .run(&BootRequest {
                level: BootLevel::Platform,
                url: Some("https://shop.example.com/".into()),
                ..BootRequest::default()
            })
            .unwrap();
        let runtime = report.runtime.unwrap();
        assert_eq!(runtime.site_dir, Some(tree.path("sites/shop.example.com")));
    }

    #[test]
    fn malformed_env_spec_is_rejected() {
        let host = MemoryHost::new("/").with_env(&[("CIVICRM_BOOT", "not-a-spec")]);
        let mut boot = orchestrator(host);
        assert!(matches!(
            boot.boot_to(BootLevel::Full),
            Err(BootError::InvalidPlatformSpec { .. })
        ));
    }

    #[test]
    fn report_serializes() {
        let tree = SiteTree::wordpress();
        let mut boot = orchestrator(MemoryHost::new(tree.root()));
        let report = boot.boot_to(BootLevel::Platform).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["level"], "platform");
        assert_eq!(json["runtime"]["platform"]["flavor"], "wordpress");
        assert!(json.get("resolution").is_none());
    }
}
