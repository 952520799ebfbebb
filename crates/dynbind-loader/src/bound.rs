//! Bound functions: either a native entry point or a stand-in.
//!
//! A bind produces a [`BoundFunction`] once; callers keep and clone it.
//! Native functions check every call against the signature fixed at bind
//! time. Replacements ignore the signature and forward the arguments to
//! their [`StandIn`] as-is.

use std::fmt;
use std::sync::Arc;

use dynbind_core::{Diagnostic, DiagnosticKind, Diagnostics, Signature, Value};

use crate::call::{self, CallShape};
use crate::error::CallError;
use crate::library::{LoadedLibrary, RawFn};

// ---------------------------------------------------------------------------
// Stand-ins
// ---------------------------------------------------------------------------

type StandInFn = dyn Fn(&[Value]) -> Value + Send + Sync;

/// Safe callable used in place of a missing native function.
#[derive(Clone)]
pub struct StandIn {
    func: Arc<StandInFn>,
}

impl StandIn {
    pub fn new(func: impl Fn(&[Value]) -> Value + Send + Sync + 'static) -> Self {
        Self {
            func: Arc::new(func),
        }
    }

    /// Accepts anything, does nothing, returns [`Value::Void`].
    #[must_use]
    pub fn noop() -> Self {
        Self::new(nullfunc)
    }

    /// Accepts anything and returns `value`.
    #[must_use]
    pub fn returning(value: Value) -> Self {
        Self::new(move |_| value.clone())
    }

    #[must_use]
    pub fn call(&self, args: &[Value]) -> Value {
        (self.func)(args)
    }
}

impl fmt::Debug for StandIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandIn").finish_non_exhaustive()
    }
}

/// The no-op stand-in as a plain function.
#[must_use]
pub fn nullfunc(_args: &[Value]) -> Value {
    Value::Void
}

// ---------------------------------------------------------------------------
// Native functions
// ---------------------------------------------------------------------------

/// An exported symbol with a validated call shape.
///
/// Holds the library open for as long as any clone exists.
#[derive(Clone)]
pub struct NativeFunction {
    name: String,
    signature: Signature,
    shape: CallShape,
    entry: RawFn,
    library: Arc<LoadedLibrary>,
}

impl NativeFunction {
    pub(crate) fn new(
        name: &str,
        signature: Signature,
        shape: CallShape,
        entry: RawFn,
        library: Arc<LoadedLibrary>,
    ) -> Self {
        Self {
            name: name.to_string(),
            signature,
            shape,
            entry,
            library,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[must_use]
    pub fn library(&self) -> &LoadedLibrary {
        &self.library
    }

    /// Call the native function.
    ///
    /// Arity and argument types are checked before anything crosses the
    /// boundary.
    pub fn call(&self, args: &[Value]) -> Result<Value, CallError> {
        if let Some(detail) = self.signature.mismatch(args) {
            return Err(self.mismatch(detail));
        }
        let encoded = call::encode_args(self.shape, args).map_err(|nul| CallError::InteriorNul {
            function: self.name.clone(),
            index: nul.0,
        })?;
        // SAFETY: `Binder::bind_function` is unsafe; its caller asserted that
        // `signature` is the native prototype of `entry`. `self.library`
        // keeps the code mapped.
        let raw = unsafe { call::invoke(self.entry, self.shape, &encoded) }.ok_or_else(|| {
            self.mismatch(format!("no call shape for {} arguments", args.len()))
        })?;
        // SAFETY: as above; a `CStr` return is a C string or null.
        Ok(unsafe { call::decode_return(self.signature.returns, raw) })
    }

    fn mismatch(&self, detail: String) -> CallError {
        CallError::TypeMismatch {
            function: self.name.clone(),
            detail,
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("library", &self.library.path())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Replacements
// ---------------------------------------------------------------------------

/// A stand-in bound under the name of a symbol the library lacks.
#[derive(Clone)]
pub struct Replacement {
    name: String,
    library: String,
    stand_in: StandIn,
    diagnostics: Diagnostics,
}

impl Replacement {
    pub(crate) fn new(
        name: &str,
        library: &str,
        stand_in: StandIn,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            name: name.to_string(),
            library: library.to_string(),
            stand_in,
            diagnostics,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn stand_in(&self) -> &StandIn {
        &self.stand_in
    }

    /// Run the stand-in. Every call warns that the native function does not
    /// exist.
    #[must_use]
    pub fn call(&self, args: &[Value]) -> Value {
        if self.diagnostics.enabled(DiagnosticKind::StandInInvoked) {
            self.diagnostics.emit(
                Diagnostic::new(
                    DiagnosticKind::StandInInvoked,
                    format!("function '{}' does not exist", self.name),
                )
                .with_library(&self.library)
                .with_symbol(&self.name),
            );
        }
        self.stand_in.call(args)
    }
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replacement")
            .field("name", &self.name)
            .field("library", &self.library)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Bound function
// ---------------------------------------------------------------------------

/// Result of a successful bind.
#[derive(Debug, Clone)]
pub enum BoundFunction {
    Native(NativeFunction),
    Replacement(Replacement),
}

impl BoundFunction {
    /// Call through to the native function or the stand-in.
    pub fn call(&self, args: &[Value]) -> Result<Value, CallError> {
        match self {
            Self::Native(native) => native.call(args),
            Self::Replacement(replacement) => Ok(replacement.call(args)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Native(native) => native.name(),
            Self::Replacement(replacement) => replacement.name(),
        }
    }

    #[must_use]
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }
}
