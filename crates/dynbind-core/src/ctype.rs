//! C type model for bound functions.
//!
//! A [`Signature`] is declared once when a symbol is bound and every call is
//! checked against it. Checking is exact: an `I32` parameter accepts only
//! [`Value::I32`]; there is no implicit widening. The only leniency is
//! [`Value::Null`], accepted wherever a pointer (`Pointer`, `CStr`) is.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A C scalar type as seen across the FFI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CType {
    Void,
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    ISize,
    USize,
    F32,
    F64,
    /// Opaque `void *` / `T *`.
    Pointer,
    /// `const char *`, NUL-terminated.
    CStr,
}

impl CType {
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    #[must_use]
    pub const fn is_pointer(self) -> bool {
        matches!(self, Self::Pointer | Self::CStr)
    }

    #[must_use]
    pub const fn is_64bit_integer(self) -> bool {
        matches!(self, Self::I64 | Self::U64)
    }

    /// Parse the names produced by `Display` plus the common C spellings.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Option<Self> {
        Some(match s.trim().to_ascii_lowercase().as_str() {
            "void" => Self::Void,
            "bool" | "_bool" => Self::Bool,
            "i8" | "int8_t" | "char" | "schar" => Self::I8,
            "u8" | "uint8_t" | "uchar" => Self::U8,
            "i16" | "int16_t" | "short" => Self::I16,
            "u16" | "uint16_t" | "ushort" => Self::U16,
            "i32" | "int32_t" | "int" => Self::I32,
            "u32" | "uint32_t" | "uint" => Self::U32,
            "i64" | "int64_t" | "longlong" => Self::I64,
            "u64" | "uint64_t" | "ulonglong" => Self::U64,
            "isize" | "ssize_t" | "intptr_t" => Self::ISize,
            "usize" | "size_t" | "uintptr_t" => Self::USize,
            "f32" | "float" => Self::F32,
            "f64" | "double" => Self::F64,
            "ptr" | "pointer" | "void*" => Self::Pointer,
            "cstr" | "string" | "char*" => Self::CStr,
            _ => return None,
        })
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Void => "void",
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::ISize => "isize",
            Self::USize => "usize",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Pointer => "ptr",
            Self::CStr => "cstr",
        })
    }
}

/// A runtime argument or return value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Result of a `void` function.
    Void,
    /// Null pointer; valid for `Pointer` and `CStr` parameters.
    Null,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    ISize(isize),
    USize(usize),
    F32(f32),
    F64(f64),
    /// Raw address.
    Pointer(usize),
    /// Owned string; passed as a NUL-terminated copy.
    Str(String),
}

impl Value {
    /// The declared type this value naturally carries (`None` for `Null`).
    #[must_use]
    pub fn ctype(&self) -> Option<CType> {
        Some(match self {
            Self::Void => CType::Void,
            Self::Null => return None,
            Self::Bool(_) => CType::Bool,
            Self::I8(_) => CType::I8,
            Self::U8(_) => CType::U8,
            Self::I16(_) => CType::I16,
            Self::U16(_) => CType::U16,
            Self::I32(_) => CType::I32,
            Self::U32(_) => CType::U32,
            Self::I64(_) => CType::I64,
            Self::U64(_) => CType::U64,
            Self::ISize(_) => CType::ISize,
            Self::USize(_) => CType::USize,
            Self::F32(_) => CType::F32,
            Self::F64(_) => CType::F64,
            Self::Pointer(_) => CType::Pointer,
            Self::Str(_) => CType::CStr,
        })
    }

    /// Whether this value may be passed where `ty` is declared.
    #[must_use]
    pub fn fits(&self, ty: CType) -> bool {
        match self {
            Self::Null => ty.is_pointer(),
            other => other.ctype() == Some(ty),
        }
    }

    fn describe(&self) -> String {
        match self.ctype() {
            Some(ty) => ty.to_string(),
            None => "null".to_string(),
        }
    }
}

/// Declared argument and return types of a bound function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub args: Vec<CType>,
    pub returns: CType,
}

impl Signature {
    #[must_use]
    pub fn new(args: impl Into<Vec<CType>>, returns: CType) -> Self {
        Self {
            args: args.into(),
            returns,
        }
    }

    /// `void f(void)`.
    #[must_use]
    pub fn void() -> Self {
        Self::new(Vec::new(), CType::Void)
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Describe the first way `args` disagrees with this signature, or
    /// `None` if the call is well-typed.
    #[must_use]
    pub fn mismatch(&self, args: &[Value]) -> Option<String> {
        if args.len() != self.args.len() {
            return Some(format!(
                "expected {} argument(s), got {}",
                self.args.len(),
                args.len()
            ));
        }
        self.args
            .iter()
            .zip(args)
            .enumerate()
            .find(|(_, (ty, value))| !value.fits(**ty))
            .map(|(index, (ty, value))| {
                format!(
                    "argument {index} expects {ty}, got {}",
                    value.describe()
                )
            })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ") -> {}", self.returns)
    }
}
