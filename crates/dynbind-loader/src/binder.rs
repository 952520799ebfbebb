//! The dynamic binder.
//!
//! A [`Binder`] owns exactly one loaded library, chosen once at
//! construction: the locator ranks candidates and the first one the OS
//! loader accepts wins. Rejected candidates are reported as diagnostics and
//! only become an error if every candidate fails.
//!
//! Opening a library runs its initialisers. Construction trusts the files
//! the locator finds under the configured names and directories.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use dynbind_core::config::{self, DEFAULT_SEARCH_ENV};
use dynbind_core::{
    Diagnostic, DiagnosticKind, DiagnosticSink, Diagnostics, Locator, Platform, SearchConfig,
    SearchDirs, Signature, StderrSink, SystemResolver, Verbosity,
};
use libloading::Symbol;

use crate::bound::{BoundFunction, NativeFunction, Replacement, StandIn};
use crate::call::CallShape;
use crate::error::{BindError, LoadAttempt, LoadError};
use crate::library::LoadedLibrary;
use crate::search_path;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Everything a [`Binder`] needs besides the names.
pub struct BinderOptions {
    description: String,
    names: Vec<String>,
    search: SearchConfig,
    sink: Option<Arc<dyn DiagnosticSink>>,
    verbosity: Option<Verbosity>,
    resolver: Option<Arc<dyn SystemResolver>>,
    platform: Platform,
    search_path_var: String,
}

impl BinderOptions {
    /// `description` names the library in errors and diagnostics; `names`
    /// are the logical names tried in order.
    pub fn new<S: AsRef<str>>(description: &str, names: &[S]) -> Self {
        Self {
            description: description.to_string(),
            names: names.iter().map(|n| n.as_ref().to_string()).collect(),
            search: SearchConfig::explicit(DEFAULT_SEARCH_ENV, None),
            sink: None,
            verbosity: None,
            resolver: None,
            platform: Platform::current(),
            search_path_var: search_path::LIBRARY_SEARCH_VAR.to_string(),
        }
    }

    /// Search `dir` (one directory or a separator-joined list) before the
    /// system.
    #[must_use]
    pub fn search_dir(mut self, dir: Option<&str>) -> Self {
        self.search = SearchConfig::explicit(self.search.var(), dir);
        self
    }

    /// Take the search directory from a configuration snapshot; its variable
    /// name appears in [`LoadError::NotFound`].
    #[must_use]
    pub fn search_config(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Where diagnostics go. Default: [`StderrSink`].
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Override `DYNBIND_VERBOSITY`.
    #[must_use]
    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = Some(verbosity);
        self
    }

    /// Replace the host's system library lookup.
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn SystemResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Naming rules to locate with. Default: the host platform.
    #[must_use]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Variable the library's directory is prepended to on platforms that
    /// need it. Default: `PATH`.
    #[must_use]
    pub fn search_path_var(mut self, var: &str) -> Self {
        self.search_path_var = var.to_string();
        self
    }
}

impl fmt::Debug for BinderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinderOptions")
            .field("description", &self.description)
            .field("names", &self.names)
            .field("search", &self.search)
            .field("verbosity", &self.verbosity)
            .field("platform", &self.platform)
            .field("search_path_var", &self.search_path_var)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Binder
// ---------------------------------------------------------------------------

/// A loaded native library plus the means to bind its functions.
pub struct Binder {
    description: String,
    library: Arc<LoadedLibrary>,
    search_dirs: SearchDirs,
    diagnostics: Diagnostics,
}

impl Binder {
    /// Locate and load one of `names`, searching `search_dir` first.
    ///
    /// # Trust
    ///
    /// This is a safe function, but opening a library runs its
    /// initialisers with full process privileges. Every file the locator
    /// finds under `names` in `search_dir` or the system search path is
    /// trusted to be a well-behaved shared library. Only point `search_dir`
    /// (or the variable read by [`Binder::from_env`]) at directories whose
    /// contents you control. The same holds for [`Binder::with_options`].
    pub fn new<S: AsRef<str>>(
        description: &str,
        names: &[S],
        search_dir: Option<&str>,
    ) -> Result<Self, LoadError> {
        Self::with_options(BinderOptions::new(description, names).search_dir(search_dir))
    }

    /// Like [`Binder::new`], reading the search directory from `env_var`.
    pub fn from_env<S: AsRef<str>>(
        description: &str,
        names: &[S],
        env_var: &str,
    ) -> Result<Self, LoadError> {
        Self::with_options(
            BinderOptions::new(description, names).search_config(SearchConfig::from_env(env_var)),
        )
    }

    /// Construct from a full set of options. See [`Binder::new`] for the
    /// trust placed in located files.
    pub fn with_options(options: BinderOptions) -> Result<Self, LoadError> {
        let platform = options.platform;
        let diagnostics = Diagnostics::new(
            options.sink.unwrap_or_else(|| Arc::new(StderrSink)),
            options.verbosity.unwrap_or_else(config::verbosity),
        );
        let mut locator = Locator::new(platform);
        if let Some(resolver) = options.resolver {
            locator = locator.with_resolver(resolver);
        }

        let search_dirs = options.search.search_dirs(platform);
        let names: Vec<&str> = options.names.iter().map(String::as_str).collect();
        let candidates = locator.locate(&names, Some(&search_dirs))?;
        if candidates.is_empty() {
            return Err(LoadError::NotFound {
                library: options.description,
                search_config: options.search.to_string(),
            });
        }

        let mut attempts = Vec::new();
        let mut loaded = None;
        for candidate in candidates {
            // SAFETY: see the module docs; loading located libraries is the
            // purpose of this type.
            match unsafe { LoadedLibrary::open(&candidate.path) } {
                Ok(library) => {
                    loaded = Some(library);
                    break;
                }
                Err(err) => {
                    let reason = err.to_string();
                    diagnostics.emit(
                        Diagnostic::new(
                            DiagnosticKind::CandidateRejected,
                            format!(
                                "could not load {} for {}: {reason}",
                                candidate.path.display(),
                                options.description
                            ),
                        )
                        .with_library(&options.description)
                        .with_path(candidate.path.display().to_string()),
                    );
                    attempts.push(LoadAttempt {
                        path: candidate.path,
                        reason,
                    });
                }
            }
        }
        let Some(library) = loaded else {
            return Err(LoadError::Unusable {
                library: options.description,
                attempts,
            });
        };

        let binder = Self {
            description: options.description,
            library: Arc::new(library),
            search_dirs,
            diagnostics,
        };
        if platform.mutates_dll_search_path() {
            binder.extend_search_path(&options.search_path_var, platform);
        }
        Ok(binder)
    }

    /// Put the directory the library came from on the DLL search path, so
    /// its sibling dependencies resolve.
    /// System-resolved libraries are left alone.
    fn extend_search_path(&self, var: &str, platform: Platform) {
        let Some(dir) = self.search_dirs.origin_of(self.libfile()) else {
            return;
        };
        if search_path::prepend_to_var(var, dir, platform) {
            self.diagnostics.emit(
                Diagnostic::new(
                    DiagnosticKind::SearchPathExtended,
                    format!("added {} to the library search path", dir.display()),
                )
                .with_library(&self.description)
                .with_path(dir.display().to_string()),
            );
        }
    }

    /// Path (or system token) of the loaded library.
    #[must_use]
    pub fn libfile(&self) -> &Path {
        self.library.path()
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn search_dirs(&self) -> &SearchDirs {
        &self.search_dirs
    }

    #[must_use]
    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.library.contains(symbol)
    }

    /// Bind `symbol` with `signature`.
    ///
    /// If the library lacks the symbol, `replacement` is bound in its place
    /// (with a warning); without one the bind fails.
    ///
    /// # Safety
    ///
    /// `signature` must match the native prototype of `symbol`. Calls
    /// through the returned function are only checked against `signature`,
    /// never against the native code.
    pub unsafe fn bind_function(
        &self,
        symbol: &str,
        signature: Signature,
        replacement: Option<StandIn>,
    ) -> Result<BoundFunction, BindError> {
        check_symbol_name(symbol)?;
        if self.diagnostics.enabled(DiagnosticKind::BindAttempted) {
            self.diagnostics.emit(
                self.symbol_diagnostic(
                    DiagnosticKind::BindAttempted,
                    symbol,
                    format!(
                        "binding function '{symbol}' {signature} from {}",
                        self.libfile().display()
                    ),
                ),
            );
        }

        if let Some(entry) = self.library.entry(symbol) {
            let shape = CallShape::for_signature(&signature).map_err(|reason| {
                BindError::UnsupportedSignature {
                    symbol: symbol.to_string(),
                    reason,
                }
            })?;
            return Ok(BoundFunction::Native(NativeFunction::new(
                symbol,
                signature,
                shape,
                entry,
                Arc::clone(&self.library),
            )));
        }

        match replacement {
            Some(stand_in) => {
                self.diagnostics.emit(self.symbol_diagnostic(
                    DiagnosticKind::SymbolReplaced,
                    symbol,
                    format!(
                        "function '{symbol}' not found in {}, using replacement",
                        self.libfile().display()
                    ),
                ));
                Ok(BoundFunction::Replacement(Replacement::new(
                    symbol,
                    &self.description,
                    stand_in,
                    self.diagnostics.clone(),
                )))
            }
            None => {
                self.diagnostics.emit(self.symbol_diagnostic(
                    DiagnosticKind::SymbolMissing,
                    symbol,
                    format!(
                        "function '{symbol}' not found in {}",
                        self.libfile().display()
                    ),
                ));
                Err(BindError::SymbolNotFound {
                    symbol: symbol.to_string(),
                    libfile: self.libfile().to_path_buf(),
                })
            }
        }
    }

    /// Typed lookup for prototypes the dynamic call path cannot express.
    ///
    /// # Safety
    ///
    /// `F` must match the native prototype of `symbol`.
    pub unsafe fn symbol<F>(&self, symbol: &str) -> Result<Symbol<'_, F>, BindError> {
        check_symbol_name(symbol)?;
        // SAFETY: forwarded to the caller.
        unsafe { self.library.get::<F>(symbol) }.map_err(|_| BindError::SymbolNotFound {
            symbol: symbol.to_string(),
            libfile: self.libfile().to_path_buf(),
        })
    }

    fn symbol_diagnostic(&self, kind: DiagnosticKind, symbol: &str, message: String) -> Diagnostic {
        Diagnostic::new(kind, message)
            .with_library(&self.description)
            .with_symbol(symbol)
            .with_path(self.libfile().display().to_string())
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("description", &self.description)
            .field("libfile", &self.libfile())
            .field("search_dirs", &self.search_dirs)
            .finish_non_exhaustive()
    }
}

fn check_symbol_name(symbol: &str) -> Result<(), BindError> {
    if symbol.contains('\0') {
        return Err(BindError::InvalidSymbolName {
            symbol: symbol.to_string(),
        });
    }
    Ok(())
}

