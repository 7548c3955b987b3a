//! Native values held on the PLC side of a bridge

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag of a native value
///
/// Deserializes from Rust type names as well as the IEC 61131-3 names the
/// PLC project uses (`LREAL`, `REAL`, `DINT`, `LINT`, `BOOL`, `STRING`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[serde(alias = "lreal", alias = "LREAL", alias = "double", alias = "float64")]
    F64,
    #[serde(alias = "real", alias = "REAL", alias = "float", alias = "float32")]
    F32,
    #[serde(alias = "dint", alias = "DINT", alias = "int32")]
    I32,
    #[serde(alias = "lint", alias = "LINT", alias = "int64")]
    I64,
    #[serde(alias = "BOOL")]
    Bool,
    #[serde(alias = "STRING")]
    String,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::F64 => "f64",
            ValueKind::F32 => "f32",
            ValueKind::I32 => "i32",
            ValueKind::I64 => "i64",
            ValueKind::Bool => "bool",
            ValueKind::String => "string",
        };
        f.write_str(name)
    }
}

/// A native value of any supported kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NativeValue {
    F64(f64),
    F32(f32),
    I32(i32),
    I64(i64),
    Bool(bool),
    String(String),
}

impl NativeValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            NativeValue::F64(_) => ValueKind::F64,
            NativeValue::F32(_) => ValueKind::F32,
            NativeValue::I32(_) => ValueKind::I32,
            NativeValue::I64(_) => ValueKind::I64,
            NativeValue::Bool(_) => ValueKind::Bool,
            NativeValue::String(_) => ValueKind::String,
        }
    }

    /// Numeric view used for gauges; strings have none
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NativeValue::F64(v) => Some(*v),
            NativeValue::F32(v) => Some(f64::from(*v)),
            NativeValue::I32(v) => Some(f64::from(*v)),
            NativeValue::I64(v) => Some(*v as f64),
            NativeValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            NativeValue::String(_) => None,
        }
    }

    /// Interpret a JSON value as a native value of the given kind
    ///
    /// Integers are accepted for float kinds. Floats are never truncated into
    /// integer kinds, and numbers out of range for the kind are rejected.
    pub fn from_json(kind: ValueKind, json: &serde_json::Value) -> Option<Self> {
        match kind {
            ValueKind::F64 => json.as_f64().map(NativeValue::F64),
            ValueKind::F32 => json
                .as_f64()
                .map(|v| v as f32)
                .filter(|v| v.is_finite())
                .map(NativeValue::F32),
            ValueKind::I32 => json
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(NativeValue::I32),
            ValueKind::I64 => json.as_i64().map(NativeValue::I64),
            ValueKind::Bool => json.as_bool().map(NativeValue::Bool),
            ValueKind::String => json.as_str().map(|s| NativeValue::String(s.to_string())),
        }
    }
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::F64(v) => write!(f, "{}", v),
            NativeValue::F32(v) => write!(f, "{}", v),
            NativeValue::I32(v) => write!(f, "{}", v),
            NativeValue::I64(v) => write!(f, "{}", v),
            NativeValue::Bool(v) => write!(f, "{}", v),
            NativeValue::String(v) => write!(f, "{:?}", v),
        }
    }
}

/// A Rust type that can sit on the native side of a bridge
pub trait NativeType: Sized + Send + 'static {
    const KIND: ValueKind;

    fn into_value(self) -> NativeValue;

    fn from_value(value: &NativeValue) -> Option<Self>;
}

macro_rules! native_type {
    ($ty:ty, $variant:ident) => {
        impl NativeType for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn into_value(self) -> NativeValue {
                NativeValue::$variant(self)
            }

            fn from_value(value: &NativeValue) -> Option<Self> {
                match value {
                    NativeValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }

        impl From<$ty> for NativeValue {
            fn from(value: $ty) -> Self {
                NativeValue::$variant(value)
            }
        }
    };
}

native_type!(f64, F64);
native_type!(f32, F32);
native_type!(i32, I32);
native_type!(i64, I64);
native_type!(bool, Bool);
native_type!(String, String);
