//! # dynbind-core
//!
//! Safe, OS-independent half of dynbind.
//!
//! This crate knows how native libraries are *named* and *found* on each
//! platform, and how the results of that search are reported. It never opens
//! a library itself; the `dynbind-loader` crate owns every call into the OS
//! loader. No `unsafe` code is permitted at the crate level.
//!
//! ```text
//! names + search dirs -> Locator -> ranked Candidates -> (loader) -> Binder
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod ctype;
pub mod diagnostics;
pub mod locate;
pub mod platform;

pub use config::{SearchConfig, SearchDirs, Verbosity};
pub use ctype::{CType, Signature, Value};
pub use diagnostics::{
    CollectingSink, Diagnostic, DiagnosticKind, DiagnosticLevel, DiagnosticSink, Diagnostics,
    JsonlSink, NullSink, StderrSink,
};
pub use locate::{
    Candidate, CandidateSource, HostResolver, LocateError, Locator, NoSystemResolver,
    StaticResolver, SystemResolver, locate,
};
pub use platform::Platform;
