//! Effective environment for new terminal sessions.
//!
//! The configured override map is applied on top of the base environment.
//! Override values may reference base variables as `${env:NAME}`; a reference
//! to an unset variable expands to the empty string. A `null` override removes
//! the variable.

use std::collections::BTreeMap;

use crate::patterns::RE_ENV_REFERENCE;

/// Resolved environment: the full merged view plus the resolved overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentSnapshot {
    vars: BTreeMap<String, String>,
    overrides: BTreeMap<String, Option<String>>,
}

impl EnvironmentSnapshot {
    /// Merges `overrides` onto the current process environment.
    pub fn from_process(overrides: &BTreeMap<String, Option<String>>) -> Self {
        Self::resolve(std::env::vars(), overrides)
    }

    /// Merges `overrides` onto an explicit base environment.
    pub fn resolve<I>(base: I, overrides: &BTreeMap<String, Option<String>>) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let base: BTreeMap<String, String> = base.into_iter().collect();
        let mut vars = base.clone();
        let mut resolved = BTreeMap::new();

        for (key, value) in overrides {
            match value {
                Some(raw) => {
                    let expanded = substitute(raw, &base);
                    vars.insert(key.clone(), expanded.clone());
                    resolved.insert(key.clone(), Some(expanded));
                }
                None => {
                    vars.remove(key);
                    resolved.insert(key.clone(), None);
                }
            }
        }

        Self {
            vars,
            overrides: resolved,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Full merged environment.
    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Variables set by the override map, after substitution.
    pub fn set_overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.overrides
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v)))
    }

    /// Variables removed by the override map.
    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.overrides
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k.as_str())
    }
}

fn substitute(raw: &str, base: &BTreeMap<String, String>) -> String {
    RE_ENV_REFERENCE
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            base.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}
