//! The one native handle a [`crate::Binder`] owns.
//!
//! Unix opens with `RTLD_NOW | RTLD_LOCAL`: unresolved references fail at
//! load time, where the next candidate can still be tried, instead of at
//! first call. Windows goes through `LoadLibraryExW` with default flags.

use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

/// Untyped native entry point. Re-typed per call shape before invocation.
pub(crate) type RawFn = unsafe extern "C" fn();

/// An open library and the path it was opened from.
#[derive(Debug)]
pub struct LoadedLibrary {
    handle: Library,
    path: PathBuf,
}

impl LoadedLibrary {
    /// Open `path` with the platform loader.
    ///
    /// # Safety
    ///
    /// Opening a library runs its initialisers. The caller trusts whatever
    /// `path` resolves to.
    pub unsafe fn open(path: &Path) -> Result<Self, libloading::Error> {
        // SAFETY: forwarded to the caller.
        let handle = unsafe { open_handle(path)? };
        Ok(Self {
            handle,
            path: path.to_path_buf(),
        })
    }

    /// Path (or bare system token) the library was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Address of `symbol`, or `None` if the library does not export it.
    ///
    /// `symbol` must not contain NUL bytes; callers validate first.
    pub(crate) fn entry(&self, symbol: &str) -> Option<RawFn> {
        // SAFETY: the address is only copied out here. Every call through it
        // happens behind a signature the binder's caller vouched for.
        let found: Result<Symbol<'_, RawFn>, _> = unsafe { self.handle.get(symbol.as_bytes()) };
        found.ok().map(|sym| *sym)
    }

    /// Whether `symbol` is exported.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        !symbol.contains('\0') && self.entry(symbol).is_some()
    }

    /// Typed lookup.
    ///
    /// # Safety
    ///
    /// `F` must match the native prototype of `symbol`.
    pub unsafe fn get<F>(&self, symbol: &str) -> Result<Symbol<'_, F>, libloading::Error> {
        // SAFETY: forwarded to the caller.
        unsafe { self.handle.get(symbol.as_bytes()) }
    }
}

#[cfg(unix)]
unsafe fn open_handle(path: &Path) -> Result<Library, libloading::Error> {
    let flags = libc::RTLD_NOW | libc::RTLD_LOCAL;
    // SAFETY: forwarded from `LoadedLibrary::open`.
    unsafe { libloading::os::unix::Library::open(Some(path), flags) }.map(Library::from)
}

#[cfg(not(unix))]
unsafe fn open_handle(path: &Path) -> Result<Library, libloading::Error> {
    // SAFETY: forwarded from `LoadedLibrary::open`.
    unsafe { Library::new(path) }
}
