//! Change classification against the watch and ignore globs.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::IndexConfig;
use crate::error::{FuzzyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Matches an ignore glob. Wins over the watch glob.
    Ignored,
    Watched,
    Unwatched,
}

#[derive(Debug, Clone)]
pub struct ChangeClassifier {
    watch: GlobSet,
    ignore: GlobSet,
}

fn build_set<'a, I>(patterns: I) -> Result<GlobSet>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| FuzzyError::InvalidGlob {
            pattern: pattern.to_string(),
            details: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| FuzzyError::InvalidGlob {
        pattern: "<set>".to_string(),
        details: e.to_string(),
    })
}

impl ChangeClassifier {
    pub fn new<S: AsRef<str>>(watch_glob: &str, ignore_globs: &[S]) -> Result<Self> {
        Ok(Self {
            watch: build_set([watch_glob])?,
            ignore: build_set(ignore_globs.iter().map(AsRef::as_ref))?,
        })
    }

    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        Self::new(&config.watch_glob, &config.ignore_globs)
    }

    /// Classifies a workspace-relative path.
    pub fn classify(&self, path: &str) -> PathClass {
        let path = normalize_separators(path);
        if self.ignore.is_match(&*path) {
            PathClass::Ignored
        } else if self.watch.is_match(&*path) {
            PathClass::Watched
        } else {
            PathClass::Unwatched
        }
    }
}

fn normalize_separators(path: &str) -> std::borrow::Cow<'_, str> {
    if path.contains('\\') {
        std::borrow::Cow::Owned(path.replace('\\', "/"))
    } else {
        std::borrow::Cow::Borrowed(path)
    }
}
