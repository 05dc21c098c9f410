//! Programmer-error conditions.
//!
//! Misuse of the reflection API fails fast: the public operations raise the
//! error as a panic carrying the message below. `try_*` variants hand the
//! same error back as a `Result`.

use thiserror::Error;
use vo_common_core::Kind;
use vo_runtime::objects::channel::ChanError;

pub type Result<T> = std::result::Result<T, ReflectError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReflectError {
    #[error("reflect: call of {method} on {kind} Value")]
    WrongKind { method: &'static str, kind: Kind },
    #[error("reflect: call of {method} on zero Value")]
    ZeroValue { method: &'static str },
    #[error("reflect: {method} using unaddressable value")]
    Unaddressable { method: &'static str },
    #[error("reflect: {method} using value obtained using unexported field")]
    Unexported { method: &'static str },
    #[error("reflect.Value.Interface: cannot return value obtained from unexported field or method")]
    CannotInterface,
    #[error("reflect: {what} index out of range")]
    IndexOutOfRange { what: &'static str },
    #[error("{op}: {what} index out of bounds")]
    OutOfBounds { op: &'static str, what: &'static str },
    #[error("reflect: {what} out of range in {method}")]
    LenOutOfRange { what: &'static str, method: &'static str },
    #[error("{op}: value of type {from} is not assignable to type {to}")]
    NotAssignable { op: &'static str, from: String, to: String },
    #[error("reflect.Value.Convert: value of type {from} cannot be converted to type {to}")]
    NotConvertible { from: String, to: String },
    #[error("{op}: {a} != {b}")]
    TypeMismatch { op: &'static str, a: String, b: String },

    #[error("reflect: {op} using {from} as type {to}")]
    BadArgument { op: &'static str, from: String, to: String },
    #[error("reflect: {op} with too few input arguments")]
    TooFewArgs { op: &'static str },
    #[error("reflect: {op} with too many input arguments")]
    TooManyArgs { op: &'static str },
    #[error("reflect: {op} using zero Value argument")]
    ZeroArgument { op: &'static str },
    #[error("reflect: CallSlice of non-variadic function")]
    CallSliceNonVariadic,
    #[error("reflect: call of nil function")]
    NilFunc,
    #[error("reflect: Method index out of range")]
    MethodIndex,
    #[error("reflect: Method on nil interface value")]
    NilInterfaceMethod,
    #[error("reflect: {op} of unexported method")]
    UnexportedMethod { op: &'static str },
    #[error("value method {method} called using nil pointer")]
    NilReceiver { method: String },
    #[error("reflect: wrong return count from function created by MakeFunc")]
    MakeFuncResultCount,
    #[error("reflect: function created by MakeFunc using closure returned {0}")]
    MakeFuncResult(&'static str),
    #[error("reflect: native code read {slot} as {want}, declared type is {have}")]
    FrameSlotType { slot: String, want: String, have: String },

    #[error("reflect: indirection through nil pointer to embedded struct")]
    NilEmbeddedPointer,
    #[error("reflect: {0}")]
    FieldIndex(&'static str),

    #[error("reflect.StructOf: field {index} has no name")]
    NoFieldName { index: usize },
    #[error("reflect.StructOf: field {name:?} has invalid name")]
    InvalidFieldName { name: String },
    #[error("reflect.StructOf: field {name:?} is unexported but missing PkgPath")]
    MissingPkgPath { name: String },
    #[error("reflect.StructOf: duplicate field {name}")]
    DuplicateField { name: String },
    #[error("reflect: embedded type with methods not implemented if there is more than one field")]
    EmbeddedMethods,
    #[error("reflect.InterfaceOf: duplicate method {0}")]
    DuplicateMethod(String),
    #[error("reflect.MapOf: invalid key type {0}")]
    InvalidMapKey(String),
    #[error("reflect.ArrayOf: array size would exceed virtual address space")]
    ArrayTooLarge,
    #[error("reflect.ChanOf: element size too large")]
    ChanElemTooLarge,
    #[error("reflect.FuncOf: last arg of variadic func must be slice")]
    VariadicNotSlice,
    #[error("{op} of non-{kind} type {typ}")]
    NotKindType { op: &'static str, kind: Kind, typ: String },
    #[error("reflect: {method} of non-{what} type {typ}")]
    TypeKind { method: &'static str, what: &'static str, typ: String },
    #[error("reflect: type {0} used before its definition was completed")]
    Incomplete(String),
    #[error("reflect: type {0} is already defined differently")]
    TypeRedefined(String),

    #[error("reflect.MakeSlice: len > cap")]
    LenGreaterThanCap,
    #[error("reflect.MakeChan: unidirectional channel type")]
    UnidirectionalChan,
    #[error("reflect: {op} on {dir} channel")]
    ChanDirection { op: &'static str, dir: &'static str },
    #[error("reflect.Select: {0}")]
    BadSelect(&'static str),
    #[error(transparent)]
    Chan(#[from] ChanError),
    #[error("close of nil channel")]
    CloseOfNil,
    #[error("assignment to entry in nil map")]
    NilMapWrite,
    #[error("reflect: MapIter.{method} {detail}")]
    MapIter { method: &'static str, detail: &'static str },

    #[error("hash of unhashable type {0}")]
    Unhashable(String),
    #[error("comparing uncomparable type {0}")]
    Uncomparable(String),
    #[error("reflect.Value.Equal: values of type {0} are not comparable")]
    NotComparable(String),
}

impl ReflectError {
    /// Fail fast with this error.
    #[track_caller]
    pub fn raise(self) -> ! {
        tracing::error!(target: "vo::reflect", error = %self, "reflection misuse");
        panic!("{self}")
    }
}

/// Unwrap a result, raising the error as a panic.
pub(crate) trait OrRaise<T> {
    fn or_raise(self) -> T;
}

impl<T> OrRaise<T> for Result<T> {
    #[track_caller]
    fn or_raise(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => e.raise(),
        }
    }
}
