#[cfg(test)]
pub mod test {
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;

    use crate::env::EnvSnapshot;
    use crate::error::BootError;
    use crate::host::Host;

    /// A throwaway directory tree shaped like an installation.
    pub struct SiteTree {
        dir: TempDir,
    }

    impl SiteTree {
        pub fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
            }
        }

        pub fn root(&self) -> &Path {
            self.dir.path()
        }

        pub fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }

        /// Create an empty file (and its parents).
        pub fn file(&self, rel: &str) -> PathBuf {
            self.file_with(rel, "")
        }

        pub fn file_with(&self, rel: &str, content: &str) -> PathBuf {
            let path = self.path(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, content).unwrap();
            path
        }

        pub fn dir(&self, rel: &str) -> PathBuf {
            let path = self.path(rel);
            fs::create_dir_all(&path).unwrap();
            path
        }

        fn with_files(files: &[&str]) -> Self {
            let tree = Self::new();
            for f in files {
                tree.file(f);
            }
            tree
        }

        pub fn wordpress() -> Self {
            Self::with_files(&["wp-includes/version.php", "wp-load.php"])
        }

        pub fn drupal() -> Self {
            Self::with_files(&["modules/system/system.module", "includes/bootstrap.inc"])
        }

        pub fn joomla() -> Self {
            Self::with_files(&[
                "administrator/components/com_users/users.php",
                "administrator/includes/framework.php",
            ])
        }

        pub fn standalone() -> Self {
            Self::with_files(&["civicrm.standalone.php", "vendor/autoload.php"])
        }

        /// Put the application core at `rel`.
        pub fn app_core(&self, rel: &str) -> PathBuf {
            let dir = self.dir(rel);
            self.file(&format!("{rel}/CRM/Core/Config.php"));
            dir
        }
    }

    /// In-memory [`Host`]. Changing directory only records the new value.
    #[derive(Debug, Clone)]
    pub struct MemoryHost {
        pub cwd: PathBuf,
        pub env: EnvSnapshot,
        pub chdirs: Vec<PathBuf>,
    }

    impl MemoryHost {
        pub fn new(cwd: impl Into<PathBuf>) -> Self {
            Self {
                cwd: cwd.into(),
                env: EnvSnapshot::default(),
                chdirs: Vec::new(),
            }
        }

        pub fn with_env(mut self, pairs: &[(&str, &str)]) -> Self {
            self.env = pairs.iter().copied().collect();
            self
        }
    }

    impl Host for MemoryHost {
        fn current_dir(&self) -> Result<PathBuf, BootError> {
            Ok(self.cwd.clone())
        }

        fn set_current_dir(&mut self, dir: &Path) -> Result<(), BootError> {
            self.cwd = dir.to_path_buf();
            self.chdirs.push(dir.to_path_buf());
            Ok(())
        }

        fn vars(&self) -> EnvSnapshot {
            self.env.clone()
        }
    }

    #[test]
    fn presets_are_detected() {
        use crate::matcher::{FlavorTable, match_dir};
        use crate::types::Flavor;

        let cases = [
            (SiteTree::wordpress(), Flavor::WordPress),
            (SiteTree::drupal(), Flavor::Drupal),
            (SiteTree::joomla(), Flavor::Joomla),
            (SiteTree::standalone(), Flavor::Standalone),
        ];
        for (tree, flavor) in cases {
            let desc = match_dir(tree.root(), &FlavorTable::standard(), None).unwrap();
            assert_eq!(desc.flavor, flavor);
        }
    }
}
