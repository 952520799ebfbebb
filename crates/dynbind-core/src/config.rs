//! Search-directory and verbosity configuration.
//!
//! Two environment variables feed the loader:
//! - a search-directory variable (default `DYNBIND_LIB_PATH`, callers pick
//!   their own name) holding one directory or a platform-separator-joined
//!   list of them. Unset means "system search only".
//! - `DYNBIND_VERBOSITY`: `quiet`, `normal` (default) or `verbose`. Controls
//!   which [`crate::diagnostics::DiagnosticKind`]s reach the sink.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::platform::Platform;

/// Default name of the search-directory variable.
pub const DEFAULT_SEARCH_ENV: &str = "DYNBIND_LIB_PATH";

/// Name of the verbosity variable.
pub const VERBOSITY_ENV: &str = "DYNBIND_VERBOSITY";

// ---------------------------------------------------------------------------
// Search directories
// ---------------------------------------------------------------------------

/// Ordered directories searched before the system resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchDirs {
    dirs: Vec<PathBuf>,
}

impl SearchDirs {
    /// Split `raw` on the platform separator. Empty segments are dropped.
    #[must_use]
    pub fn parse(raw: &str, platform: Platform) -> Self {
        let dirs = raw
            .split(platform.path_separator())
            .filter(|segment| !segment.is_empty())
            .map(PathBuf::from)
            .collect();
        Self { dirs }
    }

    #[must_use]
    pub fn from_dirs(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    #[must_use]
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// The first search directory that `path` lives under, if any.
    #[must_use]
    pub fn origin_of(&self, path: &Path) -> Option<&Path> {
        self.dirs
            .iter()
            .find(|dir| path.starts_with(dir))
            .map(PathBuf::as_path)
    }
}

/// Where the search directory came from, kept for error messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchConfig {
    var: String,
    value: Option<String>,
}

impl SearchConfig {
    /// Snapshot `var` from the process environment. Non-unicode values are
    /// treated as unset.
    #[must_use]
    pub fn from_env(var: &str) -> Self {
        let value = std::env::var(var).ok().filter(|v| !v.is_empty());
        Self {
            var: var.to_string(),
            value,
        }
    }

    /// A configuration that did not come from the environment. An empty
    /// value counts as unset.
    #[must_use]
    pub fn explicit(var: &str, value: Option<&str>) -> Self {
        Self {
            var: var.to_string(),
            value: value.filter(|v| !v.is_empty()).map(str::to_string),
        }
    }

    #[must_use]
    pub fn var(&self) -> &str {
        &self.var
    }

    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    #[must_use]
    pub fn search_dirs(&self, platform: Platform) -> SearchDirs {
        self.value
            .as_deref()
            .map(|raw| SearchDirs::parse(raw, platform))
            .unwrap_or_default()
    }
}

impl fmt::Display for SearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.var, self.value.as_deref().unwrap_or("unset"))
    }
}

// ---------------------------------------------------------------------------
// Verbosity
// ---------------------------------------------------------------------------

/// How much of the diagnostics stream reaches the sink.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Nothing is forwarded.
    Quiet,
    /// Warnings about skipped candidates and missing symbols.
    #[default]
    Normal,
    /// Also every bind attempt and every stand-in invocation.
    Verbose,
}

impl Verbosity {
    /// Parse from string (case-insensitive). Unknown values fall back to `Normal`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" | "silent" | "off" | "0" => Self::Quiet,
            "verbose" | "debug" | "all" | "2" => Self::Verbose,
            _ => Self::Normal,
        }
    }
}

// 0=unresolved, otherwise level + 1.
static CACHED_VERBOSITY: AtomicU8 = AtomicU8::new(0);

const VERBOSITY_UNRESOLVED: u8 = 0;

fn verbosity_to_u8(v: Verbosity) -> u8 {
    match v {
        Verbosity::Quiet => 1,
        Verbosity::Normal => 2,
        Verbosity::Verbose => 3,
    }
}

fn u8_to_verbosity(v: u8) -> Verbosity {
    match v {
        1 => Verbosity::Quiet,
        3 => Verbosity::Verbose,
        _ => Verbosity::Normal,
    }
}

/// Get the configured verbosity (reads `DYNBIND_VERBOSITY` on first call,
/// caches thereafter).
///
/// Two threads racing on the first call both read the same variable and
/// store the same value, so no stronger synchronization is needed.
#[must_use]
pub fn verbosity() -> Verbosity {
    let cached = CACHED_VERBOSITY.load(Ordering::Acquire);
    if cached != VERBOSITY_UNRESOLVED {
        return u8_to_verbosity(cached);
    }
    let level = std::env::var(VERBOSITY_ENV)
        .map(|v| Verbosity::from_str_loose(&v))
        .unwrap_or_default();
    CACHED_VERBOSITY.store(verbosity_to_u8(level), Ordering::Release);
    level
}
