//! Error taxonomy, one enum per scope.
//!
//! - [`LoadError`]: construction of a [`crate::Binder`]. Fatal; there is no
//!   partially loaded binder.
//! - [`BindError`]: one `bind_function` call. Other binds are unaffected.
//! - [`CallError`]: one call through a bound function.

use std::path::PathBuf;

use dynbind_core::LocateError;
use thiserror::Error;

/// One candidate the OS loader refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadAttempt {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    /// The locator produced no candidates at all.
    #[error("could not find any library for {library} ({search_config})")]
    NotFound {
        library: String,
        search_config: String,
    },
    /// Candidates existed but none could be opened.
    #[error(
        "found {}, but none is usable for the library {library}",
        render_attempts(.attempts)
    )]
    Unusable {
        library: String,
        attempts: Vec<LoadAttempt>,
    },
    #[error(transparent)]
    Locate(#[from] LocateError),
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("could not find function '{symbol}' in {}", .libfile.display())]
    SymbolNotFound { symbol: String, libfile: PathBuf },
    #[error("cannot call '{symbol}' dynamically: {reason}")]
    UnsupportedSignature { symbol: String, reason: String },
    #[error("symbol name {symbol:?} contains a NUL byte")]
    InvalidSymbolName { symbol: String },
}

#[derive(Debug, Error)]
pub enum CallError {
    #[error("{function}: {detail}")]
    TypeMismatch { function: String, detail: String },
    #[error("{function}: string argument {index} contains a NUL byte")]
    InteriorNul { function: String, index: usize },
}

fn render_attempts(attempts: &[LoadAttempt]) -> String {
    let listed: Vec<String> = attempts
        .iter()
        .map(|a| format!("{} ({})", a.path.display(), a.reason))
        .collect();
    format!("[{}]", listed.join(", "))
}
