//! Numeric values crossing the host/guest boundary.
//!
//! Bytecode exports only take and return numbers. [`WasmArg`] is what the
//! host passes in, [`WasmValue`] is what comes back.

use serde_json::{Number, Value};
use wasmtime::{Val, ValType};

use fnhost_common::EngineError;

/// An argument for a bytecode export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WasmArg {
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl WasmArg {
    fn type_name(self) -> &'static str {
        match self {
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
        }
    }

    /// Two's complement bits of an integer argument, sign-extended.
    #[allow(clippy::cast_sign_loss)]
    fn int_bits(self) -> Option<u64> {
        match self {
            Self::I32(v) => Some(i64::from(v) as u64),
            Self::I64(v) => Some(v as u64),
            Self::U32(v) => Some(u64::from(v)),
            Self::U64(v) => Some(v),
            Self::F32(_) | Self::F64(_) => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        match self {
            Self::I32(v) => f64::from(v),
            Self::I64(v) => v as f64,
            Self::U32(v) => f64::from(v),
            Self::U64(v) => v as f64,
            Self::F32(v) => f64::from(v),
            Self::F64(v) => v,
        }
    }

    /// Encode for a parameter of type `ty`.
    ///
    /// Integers pass through as raw bits (truncated for 32-bit parameters),
    /// floats use the IEEE-754 bit encoding, and integers given to a float
    /// parameter are converted by value. A float for an integer parameter is
    /// rejected.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub(crate) fn to_val(self, ty: &ValType) -> Result<Val, EngineError> {
        match ty {
            ValType::I32 => self
                .int_bits()
                .map(|bits| Val::I32(bits as u32 as i32))
                .ok_or_else(|| self.mismatch(ty)),
            ValType::I64 => self
                .int_bits()
                .map(|bits| Val::I64(bits as i64))
                .ok_or_else(|| self.mismatch(ty)),
            ValType::F32 => {
                let v = match self {
                    Self::F32(v) => v,
                    other => other.as_f64() as f32,
                };
                Ok(Val::F32(v.to_bits()))
            }
            ValType::F64 => Ok(Val::F64(self.as_f64().to_bits())),
            _ => Err(self.mismatch(ty)),
        }
    }

    fn mismatch(self, ty: &ValType) -> EngineError {
        EngineError::unsupported_argument(format!("{} for {ty:?} parameter", self.type_name()))
    }
}

impl TryFrom<&Value> for WasmArg {
    type Error = EngineError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Ok(Self::I64(v))
                } else if let Some(v) = n.as_u64() {
                    Ok(Self::U64(v))
                } else {
                    n.as_f64()
                        .map(Self::F64)
                        .ok_or_else(|| EngineError::unsupported_argument("number"))
                }
            }
            Value::Null => Err(EngineError::unsupported_argument("null")),
            Value::Bool(_) => Err(EngineError::unsupported_argument("bool")),
            Value::String(_) => Err(EngineError::unsupported_argument("string")),
            Value::Array(_) => Err(EngineError::unsupported_argument("array")),
            Value::Object(_) => Err(EngineError::unsupported_argument("object")),
        }
    }
}

macro_rules! wasm_arg_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for WasmArg {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

wasm_arg_from!(i32 => I32, i64 => I64, u32 => U32, u64 => U64, f32 => F32, f64 => F64);

/// A numeric result returned by a bytecode export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WasmValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl WasmValue {
    /// Decode a wasmtime value; `None` for non-numeric values.
    pub(crate) fn from_val(val: &Val) -> Option<Self> {
        match val {
            Val::I32(v) => Some(Self::I32(*v)),
            Val::I64(v) => Some(Self::I64(*v)),
            Val::F32(bits) => Some(Self::F32(f32::from_bits(*bits))),
            Val::F64(bits) => Some(Self::F64(f64::from_bits(*bits))),
            _ => None,
        }
    }

    /// JSON rendering. Non-finite floats become `null`.
    pub fn to_json(self) -> Value {
        match self {
            Self::I32(v) => Value::from(v),
            Self::I64(v) => Value::from(v),
            Self::F32(v) => Number::from_f64(f64::from(v)).map_or(Value::Null, Value::Number),
            Self::F64(v) => Number::from_f64(v).map_or(Value::Null, Value::Number),
        }
    }
}
