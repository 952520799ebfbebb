//! Dynamic call path for bound native functions.
//!
//! Without a foreign-function-interface library the call has to be made
//! through a concrete Rust function pointer type. Every argument is
//! therefore widened into one register class, and the entry point is
//! re-typed to `extern "C" fn(T, T, ..) -> R` for the arity at hand:
//!
//! - integer, bool, pointer and string arguments become machine words
//!   (`usize`), sign- or zero-extended from their declared width;
//! - `F32` and `F64` arguments stay as they are.
//!
//! A signature mixing classes, or one with more than [`MAX_ARGS`]
//! arguments, has no shape here and is rejected when it is bound.

use std::ffi::{CStr, CString, c_char};
use std::mem::transmute;

use dynbind_core::{CType, Signature, Value};

use crate::library::RawFn;

/// Largest arity with a generated call shape. Eight word arguments still
/// travel in registers on the AArch64 calling conventions.
pub const MAX_ARGS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArgClass {
    Word,
    F32,
    F64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReturnClass {
    Void,
    Word,
    F32,
    F64,
}

/// Register class of a validated signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CallShape {
    args: ArgClass,
    returns: ReturnClass,
}

impl CallShape {
    /// Shape for `signature`, or the reason there is none.
    pub(crate) fn for_signature(signature: &Signature) -> Result<Self, String> {
        if signature.arity() > MAX_ARGS {
            return Err(format!(
                "{} arguments, at most {MAX_ARGS} are supported",
                signature.arity()
            ));
        }

        let mut args: Option<ArgClass> = None;
        for (index, ty) in signature.args.iter().enumerate() {
            let class = arg_class(*ty).map_err(|why| format!("argument {index} {why}"))?;
            match args {
                None => args = Some(class),
                Some(seen) if seen == class => {}
                Some(_) => {
                    return Err(
                        "arguments mix integer and floating-point register classes".to_string()
                    );
                }
            }
        }

        let returns = match signature.returns {
            CType::Void => ReturnClass::Void,
            CType::F32 => ReturnClass::F32,
            CType::F64 => ReturnClass::F64,
            ty => match arg_class(ty) {
                Ok(_) => ReturnClass::Word,
                Err(why) => return Err(format!("return type {why}")),
            },
        };

        Ok(Self {
            args: args.unwrap_or(ArgClass::Word),
            returns,
        })
    }
}

fn arg_class(ty: CType) -> Result<ArgClass, String> {
    match ty {
        CType::Void => Err("cannot be void".to_string()),
        CType::F32 => Ok(ArgClass::F32),
        CType::F64 => Ok(ArgClass::F64),
        ty if ty.is_64bit_integer() && usize::BITS < 64 => Err(format!(
            "is {ty}, which does not fit a {}-bit machine word",
            usize::BITS
        )),
        _ => Ok(ArgClass::Word),
    }
}

// ---------------------------------------------------------------------------
// Argument encoding
// ---------------------------------------------------------------------------

/// Arguments converted for one call.
///
/// Owns the NUL-terminated copies of string arguments; the words passed
/// for them point into these buffers, so the value must outlive the call.
pub(crate) struct EncodedArgs {
    values: Encoded,
    _strings: Vec<CString>,
}

enum Encoded {
    Words(Vec<usize>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Failure to encode: the index of a string argument with an interior NUL.
pub(crate) struct InteriorNul(pub(crate) usize);

/// Encode `args`, already checked against the signature that produced
/// `shape`.
pub(crate) fn encode_args(shape: CallShape, args: &[Value]) -> Result<EncodedArgs, InteriorNul> {
    let mut strings = Vec::new();
    let values = match shape.args {
        ArgClass::F32 => Encoded::F32(
            args.iter()
                .map(|v| match v {
                    Value::F32(x) => *x,
                    _ => 0.0,
                })
                .collect(),
        ),
        ArgClass::F64 => Encoded::F64(
            args.iter()
                .map(|v| match v {
                    Value::F64(x) => *x,
                    _ => 0.0,
                })
                .collect(),
        ),
        ArgClass::Word => {
            let mut words = Vec::with_capacity(args.len());
            for (index, value) in args.iter().enumerate() {
                let word = match value {
                    Value::Str(s) => {
                        let owned = CString::new(s.as_str()).map_err(|_| InteriorNul(index))?;
                        // The heap buffer does not move when the CString does.
                        let address = owned.as_ptr() as usize;
                        strings.push(owned);
                        address
                    }
                    other => to_word(other),
                };
                words.push(word);
            }
            Encoded::Words(words)
        }
    };
    Ok(EncodedArgs {
        values,
        _strings: strings,
    })
}

fn to_word(value: &Value) -> usize {
    match value {
        Value::Void | Value::Null | Value::Str(_) => 0,
        Value::Bool(b) => usize::from(*b),
        Value::I8(v) => *v as isize as usize,
        Value::U8(v) => *v as usize,
        Value::I16(v) => *v as isize as usize,
        Value::U16(v) => *v as usize,
        Value::I32(v) => *v as isize as usize,
        Value::U32(v) => *v as usize,
        Value::I64(v) => *v as usize,
        Value::U64(v) => *v as usize,
        Value::ISize(v) => *v as usize,
        Value::USize(v) | Value::Pointer(v) => *v,
        Value::F32(v) => v.to_bits() as usize,
        Value::F64(v) => v.to_bits() as usize,
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// Raw result before it is narrowed to the declared return type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RawReturn {
    Void,
    Word(usize),
    F32(f32),
    F64(f64),
}

/// Call `entry` with arguments of type `$arg`, returning `$ret`. One arm per
/// supported arity; anything longer yields `None`.
macro_rules! dispatch {
    ($entry:expr, $args:expr, $arg:ty => $ret:ty) => {
        match $args {
            [] => Some(transmute::<RawFn, unsafe extern "C" fn() -> $ret>($entry)()),
            [a0] => Some(transmute::<RawFn, unsafe extern "C" fn($arg) -> $ret>($entry)(*a0)),
            [a0, a1] => Some(
                transmute::<RawFn, unsafe extern "C" fn($arg, $arg) -> $ret>($entry)(*a0, *a1),
            ),
            [a0, a1, a2] => Some(transmute::<
                RawFn,
                unsafe extern "C" fn($arg, $arg, $arg) -> $ret,
            >($entry)(*a0, *a1, *a2)),
            [a0, a1, a2, a3] => Some(transmute::<
                RawFn,
                unsafe extern "C" fn($arg, $arg, $arg, $arg) -> $ret,
            >($entry)(*a0, *a1, *a2, *a3)),
            [a0, a1, a2, a3, a4] => Some(transmute::<
                RawFn,
                unsafe extern "C" fn($arg, $arg, $arg, $arg, $arg) -> $ret,
            >($entry)(*a0, *a1, *a2, *a3, *a4)),
            [a0, a1, a2, a3, a4, a5] => Some(transmute::<
                RawFn,
                unsafe extern "C" fn($arg, $arg, $arg, $arg, $arg, $arg) -> $ret,
            >($entry)(
                *a0, *a1, *a2, *a3, *a4, *a5,
            )),
            [a0, a1, a2, a3, a4, a5, a6] => Some(transmute::<
                RawFn,
                unsafe extern "C" fn($arg, $arg, $arg, $arg, $arg, $arg, $arg) -> $ret,
            >($entry)(
                *a0, *a1, *a2, *a3, *a4, *a5, *a6,
            )),
            [a0, a1, a2, a3, a4, a5, a6, a7] => Some(transmute::<
                RawFn,
                unsafe extern "C" fn($arg, $arg, $arg, $arg, $arg, $arg, $arg, $arg) -> $ret,
            >($entry)(
                *a0, *a1, *a2, *a3, *a4, *a5, *a6, *a7,
            )),
            _ => None,
        }
    };
}

/// Per argument class, pick the return type and dispatch.
macro_rules! dispatch_returns {
    ($entry:expr, $returns:expr, $args:expr, $arg:ty) => {
        match $returns {
            ReturnClass::Void => dispatch!($entry, $args, $arg => ()).map(|()| RawReturn::Void),
            ReturnClass::Word => dispatch!($entry, $args, $arg => usize).map(RawReturn::Word),
            ReturnClass::F32 => dispatch!($entry, $args, $arg => f32).map(RawReturn::F32),
            ReturnClass::F64 => dispatch!($entry, $args, $arg => f64).map(RawReturn::F64),
        }
    };
}

/// Call `entry` with `args`. `None` if the arity has no generated shape.
///
/// # Safety
///
/// `entry` must point to a C function whose prototype matches the signature
/// `shape` was derived from.
pub(crate) unsafe fn invoke(entry: RawFn, shape: CallShape, args: &EncodedArgs) -> Option<RawReturn> {
    // SAFETY: the caller guarantees the prototype. Transmuting between
    // function pointer types is size-preserving.
    unsafe {
        match &args.values {
            Encoded::Words(words) => dispatch_returns!(entry, shape.returns, words.as_slice(), usize),
            Encoded::F32(floats) => dispatch_returns!(entry, shape.returns, floats.as_slice(), f32),
            Encoded::F64(floats) => dispatch_returns!(entry, shape.returns, floats.as_slice(), f64),
        }
    }
}

// ---------------------------------------------------------------------------
// Return decoding
// ---------------------------------------------------------------------------

/// Narrow `raw` to `returns`.
///
/// # Safety
///
/// For `CType::CStr`, a non-zero word must be the address of a
/// NUL-terminated string that is valid for reads.
pub(crate) unsafe fn decode_return(returns: CType, raw: RawReturn) -> Value {
    let word = match raw {
        RawReturn::Void => return Value::Void,
        RawReturn::F32(x) => return Value::F32(x),
        RawReturn::F64(x) => return Value::F64(x),
        RawReturn::Word(word) => word,
    };
    match returns {
        CType::Void => Value::Void,
        CType::Bool => Value::Bool(word as u8 != 0),
        CType::I8 => Value::I8(word as i8),
        CType::U8 => Value::U8(word as u8),
        CType::I16 => Value::I16(word as i16),
        CType::U16 => Value::U16(word as u16),
        CType::I32 => Value::I32(word as i32),
        CType::U32 => Value::U32(word as u32),
        CType::I64 => Value::I64(word as i64),
        CType::U64 => Value::U64(word as u64),
        CType::ISize => Value::ISize(word as isize),
        CType::USize => Value::USize(word),
        CType::F32 => Value::F32(f32::from_bits(word as u32)),
        CType::F64 => Value::F64(f64::from_bits(word as u64)),
        CType::Pointer if word == 0 => Value::Null,
        CType::Pointer => Value::Pointer(word),
        CType::CStr if word == 0 => Value::Null,
        CType::CStr => {
            // SAFETY: the caller guarantees a readable C string.
            let text = unsafe { CStr::from_ptr(word as *const c_char) };
            Value::Str(text.to_string_lossy().into_owned())
        }
    }
}
