//! Library Locator.
//!
//! Turns logical library names plus optional search directories into an
//! ordered list of [`Candidate`]s, most preferred first:
//!
//! 1. exact pattern matches inside the search directories, in
//!    (name x directory x pattern) order;
//! 2. Unix only: versioned shared objects (`libfoo.so.2.0.1`) found by
//!    listing the search directories, newest version first;
//! 3. whatever the [`SystemResolver`] returns for each name.
//!
//! Locating is read-only filesystem probing. An empty result is not an
//! error; deciding that "nothing was found" is fatal is the loader's call.

mod resolver;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::config::SearchDirs;
use crate::platform::Platform;

pub use resolver::{
    HostResolver, NoSystemResolver, StaticResolver, SystemResolver, find_dylib,
    find_in_ldconfig_cache, find_on_windows_path, find_shared_object,
};

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("no library names given")]
    NoNames,
    #[error("search directory {} cannot be listed: {source}", .dir.display())]
    UnreadableDirectory {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// How a candidate was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum CandidateSource {
    /// `dir/pattern` exists.
    ExplicitPath,
    /// A versioned shared object found by listing a search directory.
    Versioned { version: Vec<u32> },
    /// Returned by the system resolver; may be a bare soname.
    SystemResolved,
}

/// A concrete thing to hand to the OS loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub path: PathBuf,
    #[serde(flatten)]
    pub source: CandidateSource,
}

impl Candidate {
    /// Coarse preference: explicit (2) > versioned (1) > system (0).
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self.source {
            CandidateSource::ExplicitPath => 2,
            CandidateSource::Versioned { .. } => 1,
            CandidateSource::SystemResolved => 0,
        }
    }

    #[must_use]
    pub fn is_system_resolved(&self) -> bool {
        matches!(self.source, CandidateSource::SystemResolved)
    }
}

// ---------------------------------------------------------------------------
// Locator
// ---------------------------------------------------------------------------

/// Candidate search for one platform with one system resolver.
#[derive(Clone)]
pub struct Locator {
    platform: Platform,
    resolver: Arc<dyn SystemResolver>,
}

impl Locator {
    /// Locator for `platform` backed by the host resolver.
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            resolver: Arc::new(HostResolver),
        }
    }

    /// Locator for the running host.
    #[must_use]
    pub fn host() -> Self {
        Self::new(Platform::current())
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn SystemResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Every plausible match for `names`, most preferred first.
    pub fn locate(
        &self,
        names: &[&str],
        search_dirs: Option<&SearchDirs>,
    ) -> Result<Vec<Candidate>, LocateError> {
        if names.is_empty() {
            return Err(LocateError::NoNames);
        }

        let mut results = Vec::new();
        if let Some(dirs) = search_dirs.filter(|d| !d.is_empty()) {
            results.extend(self.explicit_matches(names, dirs));
            if self.platform.scans_versioned() {
                results.extend(self.versioned_matches(names, dirs)?);
            }
        }
        results.extend(self.system_matches(names));
        Ok(results)
    }

    fn explicit_matches(&self, names: &[&str], dirs: &SearchDirs) -> Vec<Candidate> {
        let mut found = Vec::new();
        for name in names {
            for dir in dirs.dirs() {
                for pattern in self.platform.filename_patterns(name) {
                    let path = dir.join(pattern);
                    if path.exists() {
                        found.push(Candidate {
                            path,
                            source: CandidateSource::ExplicitPath,
                        });
                    }
                }
            }
        }
        found
    }

    fn versioned_matches(
        &self,
        names: &[&str],
        dirs: &SearchDirs,
    ) -> Result<Vec<Candidate>, LocateError> {
        let unversioned: Vec<String> = names
            .iter()
            .filter_map(|name| self.platform.unversioned_filename(name))
            .collect();

        let mut found: Vec<(Vec<u32>, PathBuf)> = Vec::new();
        for dir in dirs.dirs() {
            for file in sorted_listing(dir)? {
                if file.starts_with('.') {
                    continue;
                }
                let matches_name = unversioned
                    .iter()
                    .any(|base| file.contains(base.as_str()) && file != *base);
                if !matches_name {
                    continue;
                }
                if let Some(version) = so_version(&file) {
                    found.push((version, dir.join(&file)));
                }
            }
        }

        // Stable: equal versions keep directory order, then name order.
        found.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(found
            .into_iter()
            .map(|(version, path)| Candidate {
                path,
                source: CandidateSource::Versioned { version },
            })
            .collect())
    }

    fn system_matches(&self, names: &[&str]) -> Vec<Candidate> {
        names
            .iter()
            .filter_map(|name| self.resolver.resolve(name))
            .map(|token| {
                let token = if self.platform.needs_relative_marker(&token) {
                    format!("./{token}")
                } else {
                    token
                };
                Candidate {
                    path: PathBuf::from(token),
                    source: CandidateSource::SystemResolved,
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locator")
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

/// Locate `names` on the running host, reading `search_dir` with the host's
/// separator.
pub fn locate(names: &[&str], search_dir: Option<&str>) -> Result<Vec<Candidate>, LocateError> {
    let locator = Locator::host();
    let dirs = search_dir.map(|raw| SearchDirs::parse(raw, locator.platform()));
    locator.locate(names, dirs.as_ref())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// UTF-8 file names in `dir`, sorted so the result does not depend on the
/// filesystem's listing order.
fn sorted_listing(dir: &Path) -> Result<Vec<String>, LocateError> {
    let entries = fs::read_dir(dir).map_err(|source| LocateError::UnreadableDirectory {
        dir: dir.to_path_buf(),
        source,
    })?;
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    Ok(names)
}

/// Version numbers after the first `.so.` in `filename`.
///
/// `libSDL2-2.0.so.0.18.2` -> `[0, 18, 2]`. `None` when the suffix is not a
/// dot-separated list of integers.
#[must_use]
pub fn so_version(filename: &str) -> Option<Vec<u32>> {
    let suffix = filename.split(".so.").nth(1)?;
    suffix
        .split('.')
        .map(|part| part.parse::<u32>().ok())
        .collect()
}
