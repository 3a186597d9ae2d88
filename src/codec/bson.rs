//! BSON representation of queries and values.
//!
//! BSON keeps every scalar of the value model distinct, so a value survives a BSON round
//! trip exactly. Native BSON handles are moved into the output untouched.
use bson::{Binary, Bson, Document, spec::BinarySubtype};

use crate::{
    error::{DecodeError, EncodeError},
    keys::query as key,
    query::{Query, QueryType},
    value::{NativeValue, Value, ValueMap},
};

use super::{Format, json};

/// Smallest valid document: length prefix plus terminating zero.
const MIN_DOCUMENT_SIZE: usize = 5;

/// Converts a value into BSON, moving native BSON containers through without rebuilding them.
pub fn to_bson(value: Value) -> Bson {
    match value {
        Value::List(list) => Bson::Array(list.into_iter().map(to_bson).collect()),
        Value::Map(map) => Bson::Document(map.into_iter().map(|(k, v)| (k, to_bson(v))).collect()),
        Value::Native(NativeValue::Bson(native)) => native,
        Value::Native(NativeValue::Json(native)) => to_bson(json::from_json(native)),
        scalar => scalar_to_bson(&scalar),
    }
}

/// Borrowing variant of [`to_bson`]; native handles are cloned rather than converted.
pub(crate) fn to_bson_ref(value: &Value) -> Bson {
    match value {
        Value::List(list) => Bson::Array(list.iter().map(to_bson_ref).collect()),
        Value::Map(map) => Bson::Document(map_to_document(map)),
        Value::Native(NativeValue::Bson(native)) => native.clone(),
        Value::Native(NativeValue::Json(native)) => to_bson(json::from_json(native.clone())),
        scalar => scalar_to_bson(scalar),
    }
}

fn scalar_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Int32(i) => Bson::Int32(*i),
        Value::Int64(i) => Bson::Int64(*i),
        Value::Float64(f) => Bson::Double(*f),
        Value::Str(s) => Bson::String(s.clone()),
        Value::Bytes(bytes) => Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: bytes.clone(),
        }),
        container => to_bson_ref(container),
    }
}

fn map_to_document(map: &ValueMap) -> Document {
    map.iter()
        .map(|(k, v)| (k.clone(), to_bson_ref(v)))
        .collect()
}

/// Converts BSON into the generic tree. Types without a generic counterpart stay native.
pub fn from_bson(value: Bson) -> Value {
    match value {
        Bson::Null => Value::Null,
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(i) => Value::Int32(i),
        Bson::Int64(i) => Value::Int64(i),
        Bson::Double(f) => Value::Float64(f),
        Bson::String(s) => Value::Str(s),
        Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes,
        }) => Value::Bytes(bytes),
        Bson::Array(list) => Value::List(list.into_iter().map(from_bson).collect()),
        Bson::Document(document) => Value::Map(document_to_map(document)),
        other => Value::Native(NativeValue::Bson(other)),
    }
}

fn document_to_map(document: Document) -> ValueMap {
    document
        .into_iter()
        .map(|(k, v)| (k, from_bson(v)))
        .collect()
}

pub(crate) fn encode_query(query: &Query) -> Result<Vec<u8>, EncodeError> {
    let mut document = envelope(query);
    if !query.parameters.is_empty() {
        document.insert(key::PARAMETERS, map_to_document(&query.parameters));
    }
    if let Some(payload) = &query.payload {
        document.insert(key::PAYLOAD, to_bson_ref(payload));
    }
    write_document(&document)
}

pub(crate) fn encode_owned_query(query: Query) -> Result<Vec<u8>, EncodeError> {
    write_document(&query_document(query))
}

/// Envelope document of an owned query; native handles are moved, not copied.
fn query_document(query: Query) -> Document {
    let mut document = envelope(&query);
    if !query.parameters.is_empty() {
        let parameters: Document = query
            .parameters
            .into_iter()
            .map(|(k, v)| (k, to_bson(v)))
            .collect();
        document.insert(key::PARAMETERS, parameters);
    }
    if let Some(payload) = query.payload {
        document.insert(key::PAYLOAD, to_bson(payload));
    }
    document
}

fn envelope(query: &Query) -> Document {
    let mut document = Document::new();
    document.insert(key::ID, query.id);
    document.insert(key::TYPE, query.kind.code());
    document
}

fn write_document(document: &Document) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    document
        .to_writer(&mut out)
        .map_err(|e| EncodeError::Serialize {
            format: Format::Bson,
            reason: e.to_string(),
        })?;
    Ok(out)
}

pub(crate) fn decode_query(bytes: &[u8]) -> Result<Query, DecodeError> {
    check_length(bytes)?;
    let document = Document::from_reader(bytes).map_err(|e| malformed(e.to_string()))?;
    query_from_document(document)
}

/// Structural check only: the buffer holds exactly one well-formed document.
pub(crate) fn probe(bytes: &[u8]) -> bool {
    check_length(bytes).is_ok() && Document::from_reader(bytes).is_ok()
}

fn malformed(reason: String) -> DecodeError {
    DecodeError::Malformed {
        format: Format::Bson,
        reason,
    }
}

fn check_length(bytes: &[u8]) -> Result<(), DecodeError> {
    if bytes.len() < MIN_DOCUMENT_SIZE {
        return Err(malformed(format!("{} bytes is too short", bytes.len())));
    }

    let declared = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if usize::try_from(declared).ok() != Some(bytes.len()) {
        return Err(malformed(format!(
            "document declares {declared} bytes, buffer holds {}",
            bytes.len()
        )));
    }
    Ok(())
}

fn query_from_document(mut document: Document) -> Result<Query, DecodeError> {
    let id = match document.remove(key::ID) {
        Some(Bson::Int32(id)) => id,
        Some(Bson::Int64(id)) => i32::try_from(id).map_err(|_| DecodeError::InvalidField {
            field: key::ID,
            reason: format!("{id} does not fit into 32 bits"),
        })?,
        Some(other) => {
            return Err(DecodeError::InvalidField {
                field: key::ID,
                reason: format!("expected integer, found {:?}", other.element_type()),
            });
        }
        None => return Err(DecodeError::MissingField(key::ID)),
    };

    let kind = match document.remove(key::TYPE) {
        Some(Bson::String(code)) => {
            QueryType::from_code(&code).ok_or(DecodeError::UnknownQueryType(code))?
        }
        Some(other) => {
            return Err(DecodeError::InvalidField {
                field: key::TYPE,
                reason: format!("expected string, found {:?}", other.element_type()),
            });
        }
        None => return Err(DecodeError::MissingField(key::TYPE)),
    };

    let parameters = match document.remove(key::PARAMETERS) {
        Some(Bson::Document(parameters)) => document_to_map(parameters),
        None | Some(Bson::Null) => ValueMap::new(),
        Some(other) => {
            return Err(DecodeError::InvalidField {
                field: key::PARAMETERS,
                reason: format!("expected document, found {:?}", other.element_type()),
            });
        }
    };

    let payload = document.remove(key::PAYLOAD).map(from_bson);

    Ok(Query {
        id,
        kind,
        parameters,
        payload,
    })
}
