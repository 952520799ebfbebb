//! # dynbind-loader
//!
//! OS-facing half of dynbind: opens the library the locator picked and binds
//! its functions.
//!
//! ```text
//! Binder::new -> Locator -> LoadedLibrary (first candidate that opens)
//!             -> bind_function -> BoundFunction::{Native, Replacement}
//! ```
//!
//! Every `unsafe` block in the workspace lives here: the `dlopen` /
//! `LoadLibraryExW` call, symbol lookup, the re-typed native call, and the
//! `PATH` write in [`search_path`].

mod binder;
mod bound;
mod call;
mod error;
mod library;
pub mod search_path;

pub use binder::{Binder, BinderOptions};
pub use bound::{BoundFunction, NativeFunction, Replacement, StandIn, nullfunc};
pub use call::MAX_ARGS;
pub use error::{BindError, CallError, LoadAttempt, LoadError};
pub use library::LoadedLibrary;

pub use dynbind_core::{CType, Signature, Value};
