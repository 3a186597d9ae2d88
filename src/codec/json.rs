//! JSON representation of queries and values.
//!
//! JSON has a single number type. Integers keep an integer literal and come back as `Int32`
//! when they fit, `Int64` otherwise; floating point values always come back as `Float64`.
//! Anything narrower than double precision is therefore widened, which is expected behavior
//! of this format rather than a loss to correct. Byte sequences travel as base64 strings and
//! decode as strings. Non-finite floats have no JSON literal and are written as `null`.
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Map, Number};

use crate::{
    error::{DecodeError, EncodeError},
    keys::query as key,
    query::{Query, QueryType},
    value::{NativeValue, Value, ValueMap},
};

use super::{Format, bson};

type Json = serde_json::Value;

/// Converts a value into JSON, moving native JSON values through without rebuilding them.
pub fn to_json(value: Value) -> Json {
    match value {
        Value::List(list) => Json::Array(list.into_iter().map(to_json).collect()),
        Value::Map(map) => Json::Object(map.into_iter().map(|(k, v)| (k, to_json(v))).collect()),
        Value::Native(NativeValue::Json(native)) => native,
        Value::Native(NativeValue::Bson(native)) => bson_to_json(native),
        scalar => scalar_to_json(&scalar),
    }
}

pub(crate) fn to_json_ref(value: &Value) -> Json {
    match value {
        Value::List(list) => Json::Array(list.iter().map(to_json_ref).collect()),
        Value::Map(map) => Json::Object(map_to_object(map)),
        Value::Native(NativeValue::Json(native)) => native.clone(),
        Value::Native(NativeValue::Bson(native)) => bson_to_json(native.clone()),
        scalar => scalar_to_json(scalar),
    }
}

fn bson_to_json(native: ::bson::Bson) -> Json {
    match bson::from_bson(native) {
        // no generic counterpart, fall back to relaxed extended JSON
        Value::Native(NativeValue::Bson(scalar)) => scalar.into_relaxed_extjson(),
        generic => to_json(generic),
    }
}

fn scalar_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int32(i) => Json::from(*i),
        Value::Int64(i) => Json::from(*i),
        Value::Float64(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::Str(s) => Json::String(s.clone()),
        Value::Bytes(bytes) => Json::String(STANDARD.encode(bytes)),
        container => to_json_ref(container),
    }
}

fn map_to_object(map: &ValueMap) -> Map<String, Json> {
    map.iter()
        .map(|(k, v)| (k.clone(), to_json_ref(v)))
        .collect()
}

pub fn from_json(value: Json) -> Value {
    match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).map_or(Value::Int64(i), Value::Int32),
            None => n.as_f64().map_or(Value::Null, Value::Float64),
        },
        Json::String(s) => Value::Str(s),
        Json::Array(list) => Value::List(list.into_iter().map(from_json).collect()),
        Json::Object(object) => Value::Map(object_to_map(object)),
    }
}

fn object_to_map(object: Map<String, Json>) -> ValueMap {
    object.into_iter().map(|(k, v)| (k, from_json(v))).collect()
}

pub(crate) fn encode_query(query: &Query) -> Result<String, EncodeError> {
    let mut object = envelope(query);
    if !query.parameters.is_empty() {
        object.insert(
            key::PARAMETERS.to_string(),
            Json::Object(map_to_object(&query.parameters)),
        );
    }
    if let Some(payload) = &query.payload {
        object.insert(key::PAYLOAD.to_string(), to_json_ref(payload));
    }
    write_object(object)
}

pub(crate) fn encode_owned_query(query: Query) -> Result<String, EncodeError> {
    write_object(query_object(query))
}

/// Envelope object of an owned query; native handles are moved, not copied.
fn query_object(query: Query) -> Map<String, Json> {
    let mut object = envelope(&query);
    if !query.parameters.is_empty() {
        let parameters = query
            .parameters
            .into_iter()
            .map(|(k, v)| (k, to_json(v)))
            .collect();
        object.insert(key::PARAMETERS.to_string(), Json::Object(parameters));
    }
    if let Some(payload) = query.payload {
        object.insert(key::PAYLOAD.to_string(), to_json(payload));
    }
    object
}

fn envelope(query: &Query) -> Map<String, Json> {
    let mut object = Map::new();
    object.insert(key::ID.to_string(), Json::from(query.id));
    object.insert(key::TYPE.to_string(), Json::from(query.kind.code()));
    object
}

fn write_object(object: Map<String, Json>) -> Result<String, EncodeError> {
    serde_json::to_string(&Json::Object(object)).map_err(|e| EncodeError::Serialize {
        format: Format::Json,
        reason: e.to_string(),
    })
}

pub(crate) fn decode_query(bytes: &[u8]) -> Result<Query, DecodeError> {
    match serde_json::from_slice::<Json>(bytes).map_err(|e| DecodeError::Malformed {
        format: Format::Json,
        reason: e.to_string(),
    })? {
        Json::Object(object) => query_from_object(object),
        other => Err(DecodeError::Malformed {
            format: Format::Json,
            reason: format!("expected an object, found {}", json_kind(&other)),
        }),
    }
}

pub(crate) fn probe(bytes: &[u8]) -> bool {
    matches!(serde_json::from_slice::<Json>(bytes), Ok(Json::Object(_)))
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn query_from_object(mut object: Map<String, Json>) -> Result<Query, DecodeError> {
    let id = match object.remove(key::ID) {
        Some(Json::Number(n)) => n
            .as_i64()
            .and_then(|id| i32::try_from(id).ok())
            .ok_or_else(|| DecodeError::InvalidField {
                field: key::ID,
                reason: format!("{n} is not a 32 bit integer"),
            })?,
        Some(other) => {
            return Err(DecodeError::InvalidField {
                field: key::ID,
                reason: format!("expected number, found {}", json_kind(&other)),
            });
        }
        None => return Err(DecodeError::MissingField(key::ID)),
    };

    let kind = match object.remove(key::TYPE) {
        Some(Json::String(code)) => {
            QueryType::from_code(&code).ok_or(DecodeError::UnknownQueryType(code))?
        }
        Some(other) => {
            return Err(DecodeError::InvalidField {
                field: key::TYPE,
                reason: format!("expected string, found {}", json_kind(&other)),
            });
        }
        None => return Err(DecodeError::MissingField(key::TYPE)),
    };

    let parameters = match object.remove(key::PARAMETERS) {
        Some(Json::Object(parameters)) => object_to_map(parameters),
        None | Some(Json::Null) => ValueMap::new(),
        Some(other) => {
            return Err(DecodeError::InvalidField {
                field: key::PARAMETERS,
                reason: format!("expected object, found {}", json_kind(&other)),
            });
        }
    };

    let payload = object.remove(key::PAYLOAD).map(from_json);

    Ok(Query {
        id,
        kind,
        parameters,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn integers_keep_integer_representation() {
        assert_eq!(from_json(to_json(Value::Int32(7))), Value::Int32(7));
        assert_eq!(from_json(to_json(Value::Int64(i64::MAX))), Value::Int64(i64::MAX));
        // small wide integers come back narrow
        assert_eq!(from_json(to_json(Value::Int64(7))), Value::Int32(7));
    }

    #[test]
    fn floats_stay_floats_even_when_integral() {
        let text = serde_json::to_string(&to_json(Value::Float64(3.0))).unwrap();
        assert_eq!(text, "3.0");
        assert_eq!(
            from_json(serde_json::from_str(&text).unwrap()),
            Value::Float64(3.0)
        );
    }

    #[test]
    fn single_precision_widens() {
        let narrow = 1.1f32;
        let decoded = from_json(to_json(Value::from(narrow)));
        assert_eq!(decoded, Value::Float64(f64::from(narrow)));
        assert_ne!(decoded, Value::Float64(1.1));
    }

    #[test]
    fn non_finite_floats_become_null() {
        assert_eq!(to_json(Value::Float64(f64::NAN)), Json::Null);
        assert_eq!(to_json(Value::Float64(f64::INFINITY)), Json::Null);
    }

    #[test]
    fn bytes_travel_as_base64() {
        assert_eq!(to_json(Value::Bytes(b"hi".to_vec())), json!("aGk="));
        assert_eq!(from_json(json!("aGk=")), Value::Str("aGk=".into()));
    }

    #[test]
    fn huge_unsigned_becomes_float() {
        assert_eq!(from_json(json!(u64::MAX)), Value::Float64(u64::MAX as f64));
    }

    #[test]
    fn native_object_passes_through_without_rebuild() {
        let array = vec![json!(1), json!("x")];
        let address = array.as_ptr();

        match to_json(Value::native_json(Json::Array(array))) {
            Json::Array(passed) => assert_eq!(passed.as_ptr(), address),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn owned_query_moves_native_payload() {
        let array = vec![json!(1), json!("x")];
        let address = array.as_ptr();
        let query =
            Query::new(3, QueryType::Result).with_payload(Value::native_json(Json::Array(array)));

        let mut object = query_object(query);
        match object.remove(key::PAYLOAD) {
            Some(Json::Array(passed)) => assert_eq!(passed.as_ptr(), address),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(object.get(key::ID), Some(&json!(3)));
    }

    #[test]
    fn native_bson_scalar_uses_extended_json() {
        let date = ::bson::DateTime::from_millis(0);
        let json = to_json(Value::native_bson(::bson::Bson::DateTime(date)));
        assert!(json.is_object());
    }

    #[test]
    fn query_envelope_uses_short_keys() {
        let query = Query::new(9, QueryType::ProcedureCall)
            .with_parameter("name", "getUniqueId")
            .with_payload(Value::List(vec![Value::Bool(true)]));

        let text = encode_query(&query).unwrap();
        let parsed: Json = serde_json::from_str(&text).unwrap();
        assert_eq!(
            parsed,
            json!({ "q": 9, "t": "s", "p": { "name": "getUniqueId" }, "l": [true] })
        );
        assert_eq!(decode_query(text.as_bytes()).unwrap(), query);
    }

    #[test]
    fn structural_failures() {
        assert!(matches!(
            decode_query(b"[1, 2]"),
            Err(DecodeError::Malformed { .. })
        ));
        assert!(matches!(
            decode_query(br#"{"t": "i"}"#),
            Err(DecodeError::MissingField("q"))
        ));
        assert!(matches!(
            decode_query(br#"{"q": 1.5, "t": "i"}"#),
            Err(DecodeError::InvalidField { field: "q", .. })
        ));
        assert!(matches!(
            decode_query(br#"{"q": 1, "t": "nope"}"#),
            Err(DecodeError::UnknownQueryType(_))
        ));
        assert!(!probe(b"not json"));
        assert!(probe(br#"{"anything": 1}"#));
    }
}
