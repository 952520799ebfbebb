//! Machine-readable reports for the `locate` and `probe` commands.
//!
//! Provides:
//! - [`LocateReport`]: ranked candidates for a set of names, without loading.
//! - [`ProbeReport`]: which library a binder settled on and which of the
//!   requested symbols it exports.
//! - [`ProbeRequest`]: inputs of a probe, independent of the CLI.

use std::path::PathBuf;
use std::sync::Arc;

use dynbind_core::config::DEFAULT_SEARCH_ENV;
use dynbind_core::{
    Candidate, DiagnosticSink, LocateError, Locator, NoSystemResolver, Platform, SearchConfig,
    SearchDirs, SystemResolver, Verbosity,
};
use dynbind_loader::{Binder, BinderOptions, LoadError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("unknown platform '{0}' (expected windows, macos or unix)")]
    UnknownPlatform(String),
    #[error(transparent)]
    Locate(#[from] LocateError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse a `--platform` value; `None` means the running host.
pub fn parse_platform(raw: Option<&str>) -> Result<Platform, ReportError> {
    match raw {
        None => Ok(Platform::current()),
        Some(s) => Platform::from_str_loose(s).ok_or_else(|| ReportError::UnknownPlatform(s.into())),
    }
}

// ---------------------------------------------------------------------------
// Locate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub rank: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocateReport {
    pub platform: Platform,
    pub names: Vec<String>,
    pub search_dirs: Vec<PathBuf>,
    /// Whether a system lookup ran. The host's lookup only answers for the
    /// host platform, so it is skipped for any other.
    pub system_lookup: bool,
    pub candidates: Vec<RankedCandidate>,
}

impl LocateReport {
    /// Run the locator for `platform`. `resolver` overrides the host's
    /// system lookup; without one, a foreign platform gets no system step.
    pub fn build(
        names: &[String],
        search_dir: Option<&str>,
        platform: Platform,
        resolver: Option<Arc<dyn SystemResolver>>,
    ) -> Result<Self, ReportError> {
        let system_lookup = resolver.is_some() || platform == Platform::current();
        let mut locator = Locator::new(platform);
        match resolver {
            Some(resolver) => locator = locator.with_resolver(resolver),
            None if !system_lookup => locator = locator.with_resolver(Arc::new(NoSystemResolver)),
            None => {}
        }
        let dirs = search_dir
            .map(|raw| SearchDirs::parse(raw, platform))
            .unwrap_or_default();
        let borrowed: Vec<&str> = names.iter().map(String::as_str).collect();
        let candidates = locator
            .locate(&borrowed, Some(&dirs))?
            .into_iter()
            .map(|candidate| RankedCandidate {
                rank: candidate.rank(),
                candidate,
            })
            .collect();
        Ok(Self {
            platform,
            names: names.to_vec(),
            search_dirs: dirs.dirs().to_vec(),
            system_lookup,
            candidates,
        })
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// Inputs of a probe.
pub struct ProbeRequest {
    pub description: String,
    pub names: Vec<String>,
    /// Explicit search directory; wins over `env_var`.
    pub dir: Option<String>,
    /// Variable to read the search directory from. Default `DYNBIND_LIB_PATH`.
    pub env_var: Option<String>,
    pub symbols: Vec<String>,
    pub sink: Arc<dyn DiagnosticSink>,
    pub verbosity: Option<Verbosity>,
}

impl ProbeRequest {
    fn search_config(&self) -> SearchConfig {
        let var = self.env_var.as_deref().unwrap_or(DEFAULT_SEARCH_ENV);
        match &self.dir {
            Some(dir) => SearchConfig::explicit(var, Some(dir.as_str())),
            None => SearchConfig::from_env(var),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolStatus {
    pub name: String,
    pub present: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub description: String,
    pub libfile: PathBuf,
    pub search: String,
    pub symbols: Vec<SymbolStatus>,
    pub missing: usize,
}

impl ProbeReport {
    /// Load the library described by `request` and check its symbols.
    pub fn run(request: &ProbeRequest) -> Result<Self, ReportError> {
        let search = request.search_config();
        let mut options = BinderOptions::new(&request.description, request.names.as_slice())
            .search_config(search.clone())
            .sink(Arc::clone(&request.sink));
        if let Some(verbosity) = request.verbosity {
            options = options.verbosity(verbosity);
        }
        let binder = Binder::with_options(options)?;
        Ok(Self::from_binder(&binder, &search, &request.symbols))
    }

    #[must_use]
    pub fn from_binder(binder: &Binder, search: &SearchConfig, symbols: &[String]) -> Self {
        let symbols: Vec<SymbolStatus> = symbols
            .iter()
            .map(|name| SymbolStatus {
                name: name.clone(),
                present: binder.has_symbol(name),
            })
            .collect();
        Self {
            description: binder.description().to_string(),
            libfile: binder.libfile().to_path_buf(),
            search: search.to_string(),
            missing: symbols.iter().filter(|s| !s.present).count(),
            symbols,
        }
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use dynbind_core::{NullSink, StaticResolver};

    use super::*;

    #[test]
    fn test_parse_platform() {
        assert_eq!(parse_platform(None).unwrap(), Platform::current());
        assert_eq!(parse_platform(Some("windows")).unwrap(), Platform::Windows);
        assert!(matches!(
            parse_platform(Some("plan9")),
            Err(ReportError::UnknownPlatform(p)) if p == "plan9"
        ));
    }

    #[test]
    fn test_locate_report_ranks_system_candidates() {
        let resolver = StaticResolver::new().with("SDL2", "SDL2.dll");
        let report = LocateReport::build(
            &["SDL2".to_string()],
            None,
            Platform::Windows,
            Some(Arc::new(resolver)),
        )
        .unwrap();
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].rank, 0);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["platform"], "windows");
        assert_eq!(json["candidates"][0]["path"], "./SDL2.dll");
        assert_eq!(json["candidates"][0]["source"], "system_resolved");
    }

    #[test]
    fn test_foreign_platform_skips_host_lookup() {
        let foreign = match Platform::current() {
            Platform::Windows => Platform::Unix,
            _ => Platform::Windows,
        };
        let report = LocateReport::build(&["c".to_string()], None, foreign, None).unwrap();
        assert!(!report.system_lookup);
        assert!(report.candidates.is_empty());

        let host = LocateReport::build(&["c".to_string()], None, Platform::current(), None)
            .unwrap();
        assert!(host.system_lookup);
    }

    #[test]
    fn test_explicit_dir_wins_over_env_var() {
        let request = ProbeRequest {
            description: "SDL2".into(),
            names: vec!["SDL2".into()],
            dir: Some("/opt/sdl".into()),
            env_var: Some("SDL_LIB_DIR".into()),
            symbols: Vec::new(),
            sink: Arc::new(NullSink),
            verbosity: None,
        };
        assert_eq!(request.search_config().to_string(), "SDL_LIB_DIR: /opt/sdl");
    }
}
