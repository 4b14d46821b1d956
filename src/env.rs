//! Environment variable snapshots.
//!
//! Nothing in the resolution pipeline calls `std::env::var` directly. The
//! caller collects the variables once (see [`Host::vars`](crate::Host::vars))
//! and passes an [`EnvSnapshot`] down, so tests can feed synthetic data.

use std::collections::BTreeMap;

use toml::{Table, Value};

/// Immutable view of environment variables taken at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    pub fn new(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            vars: vars.into_iter().collect(),
        }
    }

    /// Snapshot of the current process environment.
    pub fn from_process() -> Self {
        Self::new(std::env::vars())
    }

    /// The value of `name`, treating empty values as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// The raw value of `name`, including empty strings.
    pub fn get_raw(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())))
    }
}

/// Build a config layer from variables named `{PREFIX}__SECTION__KEY`.
///
/// `__` separates nesting levels; segments are lowercased. Values are typed
/// as bool, then integer, then string. Paths and URLs stay strings.
pub fn config_layer(prefix: &str, env: &EnvSnapshot) -> Table {
    let needle = format!("{prefix}__");
    let mut layer = Table::new();

    for (name, raw) in env.iter() {
        let Some(rest) = name.strip_prefix(&needle) else {
            continue;
        };
        let segments: Vec<String> = rest.split("__").map(str::to_lowercase).collect();
        if segments.iter().any(String::is_empty) {
            continue;
        }
        insert_path(&mut layer, &segments, typed_value(raw));
    }

    layer
}

fn insert_path(table: &mut Table, segments: &[String], value: Value) {
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };
    let mut current = table;
    for segment in parents {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Table(Table::new()));
        match entry {
            Value::Table(sub) => current = sub,
            // A scalar already sits where a section is wanted; the scalar wins.
            _ => return,
        }
    }
    current.insert(leaf.clone(), value);
}

fn typed_value(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("true") {
        Value::Boolean(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Value::Boolean(false)
    } else if let Ok(i) = raw.parse::<i64>() {
        Value::Integer(i)
    } else {
        Value::String(raw.to_string())
    }
}
