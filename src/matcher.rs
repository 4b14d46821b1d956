//! Platform root detection.
//!
//! A [`FlavorTable`] is an ordered list of `{flavor -> marker globs}` rules.
//! [`match_dir`] tests one directory against the table; [`find_platform_root`]
//! drives it over [`search::ancestors`](crate::search::ancestors) so the
//! deepest enclosing root wins.
//!
//! Within one directory the order is: flavor (table order), then marker, then
//! sub-root (`{dir}`, `{dir}/web`, and for standalone `{dir}/srv`).

use std::path::{Path, PathBuf};

use crate::flavors;
use crate::search;
use crate::types::{Flavor, FlavorDescriptor};

/// One detection rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlavorRule {
    pub flavor: Flavor,
    pub markers: Vec<String>,
    pub sub_roots: Vec<&'static str>,
}

/// Ordered detection rules. Earlier rules win ties at the same directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlavorTable {
    rules: Vec<FlavorRule>,
}

impl FlavorTable {
    /// All supported flavors, in [`Flavor::ALL`] order.
    pub fn standard() -> Self {
        let rules = Flavor::ALL
            .into_iter()
            .map(|flavor| {
                let booter = flavors::booter(flavor);
                FlavorRule {
                    flavor,
                    markers: booter.markers().iter().map(|m| m.to_string()).collect(),
                    sub_roots: booter.sub_roots().to_vec(),
                }
            })
            .collect();
        Self { rules }
    }

    pub fn from_rules(rules: Vec<FlavorRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[FlavorRule] {
        &self.rules
    }
}

impl Default for FlavorTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Test whether any of `markers` exists under `dir` or one of its sub-roots.
///
/// Returns the matching root (`dir`, or `dir` plus the sub-root).
pub fn match_markers<S: AsRef<str>>(
    dir: &Path,
    markers: &[S],
    sub_roots: &[&str],
) -> Option<PathBuf> {
    let base = search::normalize_slashes(dir);
    for marker in markers {
        for sub in sub_roots {
            let root = if sub.is_empty() {
                base.clone()
            } else {
                format!("{}/{sub}", base.trim_end_matches('/'))
            };
            if glob_hit(&root, marker.as_ref()) {
                return Some(PathBuf::from(root));
            }
        }
    }
    None
}

/// `true` when `{base}/{pattern}` matches at least one existing path.
pub(crate) fn glob_hit(base: &str, pattern: &str) -> bool {
    first_glob_match(base, pattern).is_some()
}

/// First existing path (in glob order) matching `{base}/{pattern}`.
pub(crate) fn first_glob_match(base: &str, pattern: &str) -> Option<PathBuf> {
    let full = format!(
        "{}/{pattern}",
        glob::Pattern::escape(base.trim_end_matches('/'))
    );
    match glob::glob(&full) {
        Ok(paths) => paths.flatten().next(),
        Err(e) => {
            tracing::warn!(pattern = %full, error = %e, "skipping invalid glob pattern");
            None
        }
    }
}

/// Test one directory against the table.
pub fn match_dir(
    dir: &Path,
    table: &FlavorTable,
    pinned: Option<Flavor>,
) -> Option<FlavorDescriptor> {
    table
        .rules
        .iter()
        .filter(|rule| pinned.is_none_or(|p| p == rule.flavor))
        .find_map(|rule| {
            match_markers(dir, &rule.markers, &rule.sub_roots).map(|root_path| FlavorDescriptor {
                flavor: rule.flavor,
                root_path,
            })
        })
}

/// Walk upward from `start` and return the first (deepest) platform root.
pub fn find_platform_root(
    start: &Path,
    table: &FlavorTable,
    pinned: Option<Flavor>,
) -> Option<FlavorDescriptor> {
    let found = search::ancestors(start).find_map(|dir| {
        tracing::debug!(dir = %dir.display(), "probing for platform markers");
        match_dir(&dir, table, pinned)
    });
    if let Some(desc) = &found {
        tracing::debug!(
            flavor = %desc.flavor,
            root = %desc.root_path.display(),
            "found platform root"
        );
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::SiteTree;

    #[test]
    fn wordpress_found_from_plugin_dir() {
        let tree = SiteTree::new();
        tree.file("wp-load.php");
        let start = tree.dir("wp-content/plugins/x");

        let desc = find_platform_root(&start, &FlavorTable::standard(), None).unwrap();
        assert_eq!(desc.flavor, Flavor::WordPress);
        assert_eq!(desc.root_path, tree.root());
    }

    #[test]
    fn nested_root_beats_outer_root() {
        let tree = SiteTree::new();
        tree.file("modules/system/system.module");
        tree.file("sites/all/projects/blog/wp-includes/version.php");
        let start = tree.dir("sites/all/projects/blog/wp-content");

        let desc = find_platform_root(&start, &FlavorTable::standard(), None).unwrap();
        assert_eq!(desc.flavor, Flavor::WordPress);
        assert_eq!(desc.root_path, tree.path("sites/all/projects/blog"));
    }

    #[test]
    fn web_sub_root_is_appended() {
        let tree = SiteTree::new();
        tree.file("web/core/lib/Drupal.php");

        let desc = match_dir(tree.root(), &FlavorTable::standard(), None).unwrap();
        assert_eq!(desc.flavor, Flavor::Drupal8);
        assert_eq!(desc.root_path, tree.path("web"));
    }

    #[test]
    fn srv_sub_root_only_for_standalone() {
        let tree = SiteTree::new();
        tree.file("srv/civicrm.standalone.php");
        tree.file("srv/wp-load.php");

        let desc = match_dir(tree.root(), &FlavorTable::standard(), None).unwrap();
        assert_eq!(desc.flavor, Flavor::Standalone);
        assert_eq!(desc.root_path, tree.path("srv"));
    }

    #[test]
    fn table_order_breaks_ties() {
        let tree = SiteTree::new();
        tree.file("modules/system/system.module");
        tree.file("wp-load.php");

        let desc = match_dir(tree.root(), &FlavorTable::standard(), None).unwrap();
        assert_eq!(desc.flavor, Flavor::Drupal);

        let reversed = FlavorTable::from_rules(
            FlavorTable::standard().rules().iter().rev().cloned().collect(),
        );
        let desc = match_dir(tree.root(), &reversed, None).unwrap();
        assert_eq!(desc.flavor, Flavor::WordPress);
    }

    #[test]
    fn pinned_flavor_skips_others() {
        let tree = SiteTree::new();
        tree.file("modules/system/system.module");
        tree.file("wp-load.php");

        let desc = match_dir(tree.root(), &FlavorTable::standard(), Some(Flavor::WordPress));
        assert_eq!(desc.unwrap().flavor, Flavor::WordPress);
    }

    #[test]
    fn glob_markers_match() {
        let tree = SiteTree::new();
        tree.file("administrator/components/com_users/users.php");

        let desc = match_dir(tree.root(), &FlavorTable::standard(), None).unwrap();
        assert_eq!(desc.flavor, Flavor::Joomla);
    }

    #[test]
    fn no_markers_means_none() {
        let tree = SiteTree::new();
        let start = tree.dir("just/some/dir");
        // The temp dir may live under a real platform root on a dev box, so
        // only test the directory itself.
        assert!(match_dir(&start, &FlavorTable::standard(), None).is_none());
    }
}
