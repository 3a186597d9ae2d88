//! Format independent value tree.
//!
//! Every query parameter, payload and result travels as a [`Value`]. The tree is a closed
//! sum type, so every variant maps onto both supported wire formats and encoding never has
//! to reject a value because of its shape.
//!
//! # Native pass-through
//!
//! Values that were built directly from a wire format's own representation can be wrapped in
//! [`Value::Native`]. When such a value is handed to the codec of the same format, the wrapped
//! container is moved into the output as-is instead of being rebuilt element by element. When
//! it is handed to the other format, it is converted like any other value.
//!
//! Native scalars the value model has no variant for (BSON dates, object ids, decimals and so
//! on) are also kept as [`NativeValue`] handles when decoded, so they survive a BSON round trip
//! untouched.
use std::collections::BTreeMap;

/// Map type used for parameters, single results and nested objects.
///
/// Key order carries no meaning on the wire; a sorted map keeps encodings deterministic.
pub type ValueMap = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(ValueMap),
    /// Opaque handle onto a value that is already in a wire format's representation.
    Native(NativeValue),
}

/// A value kept in the representation of one specific wire format.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Bson(bson::Bson),
    Json(serde_json::Value),
}

impl Value {
    /// Wraps an already built BSON value for pass-through.
    pub fn native_bson(value: impl Into<bson::Bson>) -> Self {
        Value::Native(NativeValue::Bson(value.into()))
    }

    /// Wraps an already built JSON value for pass-through.
    pub fn native_json(value: serde_json::Value) -> Self {
        Value::Native(NativeValue::Json(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view that accepts either integer width as long as the value fits.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(i) => Some(*i),
            Value::Int64(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(i) => Some(i64::from(*i)),
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(f) => Some(*f),
            Value::Int32(i) => Some(f64::from(*i)),
            Value::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            Value::Native(native) => match native.into_generic() {
                Value::List(l) => Some(l),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn into_map(self) -> Option<ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            Value::Native(native) => match native.into_generic() {
                Value::Map(m) => Some(m),
                _ => None,
            },
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Native(NativeValue::Bson(_)) => "native bson",
            Value::Native(NativeValue::Json(_)) => "native json",
        }
    }
}

impl NativeValue {
    /// Converts the handle into the generic tree.
    ///
    /// Scalars without a generic counterpart stay wrapped.
    pub fn into_generic(self) -> Value {
        match self {
            NativeValue::Bson(b) => crate::codec::bson::from_bson(b),
            NativeValue::Json(j) => crate::codec::json::from_json(j),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

/// Single precision input is widened on entry; neither wire format has a narrower float.
impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float64(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<ValueMap> for Value {
    fn from(value: ValueMap) -> Self {
        Value::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
