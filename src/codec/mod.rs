//! Codec matrix.
//!
//! A [`Codec`] turns a [`Query`] into its on-wire form and back. Instead of one type per
//! combination, a codec is composed from three independent strategies chosen at construction:
//!
//! - the value format, [`Format`]: BSON documents or JSON text,
//! - the compression, [`Compression`]: none, or raw deflate at the fastest or smallest preset,
//! - the concurrency discipline, [`Concurrency`]: [`Reentrant`] or [`SingleOwner`].
//!
//! All combinations behave identically for the same (format, compression) pair; the
//! concurrency discipline only changes how scratch state is kept.
//!
//! # Output
//!
//! Uncompressed JSON is text ([`Encoded::Text`]). Every other combination needs byte framing
//! and produces [`Encoded::Binary`].
//!
//! # Example
//! ```rust
//! use querywire::{Codec, Compression, Format, Query, QueryType, Reentrant};
//!
//! let codec: Codec<Reentrant> = Codec::new(Format::Bson, Compression::Fastest);
//! let query = Query::new(1, QueryType::Ping);
//!
//! let encoded = codec.encode(&query).unwrap();
//! assert_eq!(codec.decode(encoded.as_bytes()).unwrap(), query);
//! ```
pub mod bson;
mod concurrency;
pub mod deflate;
pub mod json;

use std::{fmt, str::FromStr};

use bytes::Bytes;

pub use concurrency::{Concurrency, Reentrant, SingleOwner};

use crate::{
    error::{ConfigurationError, DecodeError, EncodeError},
    keys,
    query::{Query, QueryType},
    result::ResultSet,
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Bson,
    Json,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Format::Bson => "bson",
            Format::Json => "json",
        }
    }

    fn decode_document(self, document: &[u8]) -> Result<Query, DecodeError> {
        let query = match self {
            Format::Bson => bson::decode_query(document)?,
            Format::Json => json::decode_query(document)?,
        };
        check_result(&query)?;
        Ok(query)
    }

    fn probe(self, document: &[u8]) -> bool {
        match self {
            Format::Bson => bson::probe(document),
            Format::Json => json::probe(document),
        }
    }
}

/// A RESULT payload carrying a result type code must hold a well-formed result set.
fn check_result(query: &Query) -> Result<(), DecodeError> {
    if query.kind != QueryType::Result {
        return Ok(());
    }
    match &query.payload {
        Some(Value::Map(map)) if map.contains_key(keys::result::TYPE) => {
            ResultSet::from_map(map.clone())?;
            Ok(())
        }
        _ => Ok(()),
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bson" => Ok(Format::Bson),
            "json" => Ok(Format::Json),
            other => Err(ConfigurationError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    #[default]
    None,
    Fastest,
    Best,
}

impl Compression {
    pub fn name(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Fastest => "fastest",
            Compression::Best => "best",
        }
    }

    pub fn is_compressed(self) -> bool {
        self != Compression::None
    }

    /// Deflate preset, `None` when uncompressed.
    pub fn level(self) -> Option<flate2::Compression> {
        match self {
            Compression::None => None,
            Compression::Fastest => Some(flate2::Compression::fast()),
            Compression::Best => Some(flate2::Compression::best()),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Compression {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Compression::None),
            "fastest" => Ok(Compression::Fastest),
            "best" => Ok(Compression::Best),
            other => Err(ConfigurationError::UnknownCompression(other.to_string())),
        }
    }
}

/// On-wire form of an encoded query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    Binary(Bytes),
    Text(String),
}

impl Encoded {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Encoded::Binary(bytes) => bytes,
            Encoded::Text(text) => text.as_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Encoded::Binary(_))
    }
}

#[derive(Debug)]
pub struct Codec<M: Concurrency = Reentrant> {
    format: Format,
    compression: Compression,
    mode: M,
}

/// Clones share the configuration, never the scratch state.
impl<M: Concurrency> Clone for Codec<M> {
    fn clone(&self) -> Self {
        Self::new(self.format, self.compression)
    }
}

impl<M: Concurrency> Codec<M> {
    pub fn new(format: Format, compression: Compression) -> Self {
        Self {
            format,
            compression,
            mode: M::default(),
        }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    #[cfg(test)]
    pub(crate) fn mode(&self) -> &M {
        &self.mode
    }

    /// Whether the output needs byte framing rather than text.
    pub fn is_binary(&self) -> bool {
        self.format == Format::Bson || self.compression.is_compressed()
    }

    pub fn encode(&self, query: &Query) -> Result<Encoded, EncodeError> {
        let document = match self.format {
            Format::Json => Encoded::Text(json::encode_query(query)?),
            Format::Bson => Encoded::Binary(bson::encode_query(query)?.into()),
        };
        self.compress(document)
    }

    /// Like [`Codec::encode`], but consumes the query so native handles are moved into the
    /// document instead of copied.
    pub fn encode_owned(&self, query: Query) -> Result<Encoded, EncodeError> {
        let document = match self.format {
            Format::Json => Encoded::Text(json::encode_owned_query(query)?),
            Format::Bson => Encoded::Binary(bson::encode_owned_query(query)?.into()),
        };
        self.compress(document)
    }

    fn compress(&self, document: Encoded) -> Result<Encoded, EncodeError> {
        let Some(level) = self.compression.level() else {
            return Ok(document);
        };

        self.mode
            .with_workspace(|ws| deflate::deflate(document.as_bytes(), level, ws))
            .map(Encoded::Binary)
            .map_err(|cause| EncodeError::Compression {
                format: self.format,
                cause,
            })
    }

    pub fn decode(&self, input: &[u8]) -> Result<Query, DecodeError> {
        if !self.compression.is_compressed() {
            return self.format.decode_document(input);
        }

        let document = self
            .mode
            .with_workspace(|ws| deflate::inflate(input, ws))?;
        self.format.decode_document(&document)
    }

    /// Best-effort structural probe used for format sniffing. Never fails, and a `true` does
    /// not guarantee that [`Codec::decode`] will succeed.
    pub fn will_decode(&self, input: &[u8]) -> bool {
        if !self.compression.is_compressed() {
            return self.format.probe(input);
        }

        self.mode
            .with_workspace(|ws| deflate::inflate(input, ws))
            .is_ok_and(|document| self.format.probe(&document))
    }
}

#[cfg(test)]
mod tests {
    use crate::{ValueMap, error::ResultError};

    use super::*;

    const FORMATS: [Format; 2] = [Format::Bson, Format::Json];
    const COMPRESSIONS: [Compression; 3] =
        [Compression::None, Compression::Fastest, Compression::Best];

    fn sample_query() -> Query {
        let mut nested = ValueMap::new();
        nested.insert("depth".into(), Value::Int32(2));
        nested.insert("tags".into(), Value::List(vec!["a".into(), "b".into()]));

        Query::new(17, QueryType::DirectCypher)
            .with_parameter("query", "MATCH (n) RETURN n")
            .with_parameter("limit", 25)
            .with_parameter("big", i64::MIN)
            .with_parameter("ratio", 0.25)
            .with_parameter("strict", true)
            .with_parameter("none", Value::Null)
            .with_parameter("nested", Value::Map(nested))
            .with_payload(Value::List(vec![Value::Float64(-1.5), Value::Int32(0)]))
    }

    fn each_codec<M: Concurrency>(mut check: impl FnMut(Codec<M>)) {
        for format in FORMATS {
            for compression in COMPRESSIONS {
                check(Codec::new(format, compression));
            }
        }
    }

    #[test]
    fn matrix_round_trip() {
        let query = sample_query();
        each_codec::<Reentrant>(|codec| {
            let encoded = codec.encode(&query).unwrap();
            assert_eq!(encoded.is_binary(), codec.is_binary());
            assert_eq!(codec.decode(encoded.as_bytes()).unwrap(), query, "{codec:?}");
        });
        each_codec::<SingleOwner>(|codec| {
            for _ in 0..3 {
                let encoded = codec.encode(&query).unwrap();
                assert_eq!(codec.decode(encoded.as_bytes()).unwrap(), query);
                assert_eq!(codec.mode().pending_chunks(), 0);
            }
        });
    }

    #[test]
    fn disciplines_produce_identical_output() {
        let query = sample_query();
        for format in FORMATS {
            for compression in COMPRESSIONS {
                let reentrant = Codec::<Reentrant>::new(format, compression);
                let owner = Codec::<SingleOwner>::new(format, compression);
                let a = reentrant.encode(&query).unwrap();
                let b = owner.encode(&query).unwrap();
                assert_eq!(reentrant.decode(b.as_bytes()).unwrap(), query);
                assert_eq!(owner.decode(a.as_bytes()).unwrap(), query);
            }
        }
    }

    #[test]
    fn store_procedure_keeps_wide_integer_exactly() {
        let query = Query::new(42, QueryType::StoreProcedure)
            .with_parameter("k", "v")
            .with_parameter("n", 9223372036854775807i64);
        let codec: Codec = Codec::new(Format::Bson, Compression::None);

        let decoded = codec.decode(codec.encode(&query).unwrap().as_bytes()).unwrap();
        assert_eq!(decoded.id, 42);
        assert_eq!(decoded.kind, QueryType::StoreProcedure);
        assert_eq!(decoded.parameter("k"), Some(&Value::Str("v".into())));
        assert_eq!(
            decoded.parameter("n"),
            Some(&Value::Int64(9223372036854775807))
        );
    }

    #[test]
    fn bson_preserves_numeric_types_json_widens() {
        let query = Query::new(1, QueryType::Result)
            .with_parameter("i64", Value::Int64(5))
            .with_parameter("f32", Value::from(0.3f32))
            .with_parameter("bytes", Value::Bytes(vec![1, 2, 3]));

        let bson: Codec = Codec::new(Format::Bson, Compression::Best);
        let decoded = bson.decode(bson.encode(&query).unwrap().as_bytes()).unwrap();
        assert_eq!(decoded, query);

        let json: Codec = Codec::new(Format::Json, Compression::Best);
        let decoded = json.decode(json.encode(&query).unwrap().as_bytes()).unwrap();
        assert_eq!(decoded.parameter("i64"), Some(&Value::Int32(5)));
        assert_eq!(
            decoded.parameter("f32"),
            Some(&Value::Float64(f64::from(0.3f32)))
        );
        assert_eq!(decoded.parameter("bytes"), Some(&Value::Str("AQID".into())));
    }

    #[test]
    fn empty_parameters_and_payload_are_omitted() {
        let codec: Codec = Codec::new(Format::Json, Compression::None);
        let encoded = codec.encode(&Query::new(3, QueryType::Pong)).unwrap();
        assert_eq!(encoded, Encoded::Text(r#"{"q":3,"t":"o"}"#.to_string()));
    }

    #[test]
    fn result_payload_survives_every_codec() {
        let table = ResultSet::table(
            vec!["name".into(), "age".into()],
            vec![vec!["ada".into(), Value::Int32(36)]],
        )
        .unwrap()
        .with_total(1);
        let query = Query::result(8, &table);

        each_codec::<Reentrant>(|codec| {
            let decoded = codec.decode(codec.encode(&query).unwrap().as_bytes()).unwrap();
            assert_eq!(decoded.result_set().unwrap(), table);
        });
    }

    #[test]
    fn native_payload_passes_through_codec() {
        let payload = ::bson::doc! { "n": ::bson::Bson::Int64(3) };
        let query = Query::new(2, QueryType::Result).with_payload(Value::native_bson(payload));
        let codec: Codec = Codec::new(Format::Bson, Compression::None);

        let decoded = codec.decode(codec.encode(&query).unwrap().as_bytes()).unwrap();
        let map = decoded.payload.unwrap().into_map().unwrap();
        assert_eq!(map.get("n"), Some(&Value::Int64(3)));
    }

    #[test]
    fn owned_encoding_matches_borrowed() {
        let array = ::bson::Bson::Array(vec![::bson::Bson::Int64(7), "x".into()]);
        let object = serde_json::json!({ "k": [1, 2.5] });
        let query = Query::new(6, QueryType::Result)
            .with_parameter("json", Value::native_json(object))
            .with_payload(Value::native_bson(array));

        each_codec::<SingleOwner>(|codec| {
            let borrowed = codec.encode(&query).unwrap();
            let owned = codec.encode_owned(query.clone()).unwrap();
            assert_eq!(owned, borrowed, "{codec:?}");

            let decoded = codec.decode(owned.as_bytes()).unwrap();
            let again = codec.decode(borrowed.as_bytes()).unwrap();
            assert_eq!(decoded.parameters, again.parameters);
        });
    }

    #[test]
    fn ragged_table_is_rejected_on_decode() {
        let mut payload = ValueMap::new();
        payload.insert("rt".into(), "t".into());
        payload.insert("col".into(), Value::List(vec!["a".into()]));
        payload.insert(
            "r".into(),
            Value::List(vec![Value::List(vec![Value::Int32(1), Value::Int32(2)])]),
        );
        let query = Query::new(4, QueryType::Result).with_payload(Value::Map(payload));

        each_codec::<Reentrant>(|codec| {
            let encoded = codec.encode(&query).unwrap();
            assert!(matches!(
                codec.decode(encoded.as_bytes()),
                Err(DecodeError::Result(ResultError::RowWidth {
                    row: 0,
                    expected: 1,
                    found: 2
                }))
            ));
        });
    }

    #[test]
    fn unknown_result_type_is_rejected_on_decode() {
        let mut payload = ValueMap::new();
        payload.insert("rt".into(), "x".into());
        payload.insert("r".into(), Value::List(Vec::new()));
        let query = Query::new(4, QueryType::Result).with_payload(Value::Map(payload));

        each_codec::<Reentrant>(|codec| {
            let encoded = codec.encode(&query).unwrap();
            assert!(matches!(
                codec.decode(encoded.as_bytes()),
                Err(DecodeError::Result(ResultError::UnknownResultType(code))) if code == "x"
            ));
        });
    }

    #[test]
    fn result_type_code_is_only_checked_on_results() {
        let mut payload = ValueMap::new();
        payload.insert("rt".into(), "x".into());
        let query = Query::new(4, QueryType::DirectCypher).with_payload(Value::Map(payload));
        let codec: Codec = Codec::new(Format::Json, Compression::None);

        let decoded = codec.decode(codec.encode(&query).unwrap().as_bytes()).unwrap();
        assert_eq!(decoded, query);
    }

    #[test]
    fn foreign_input_is_rejected_by_every_codec() {
        each_codec::<Reentrant>(|codec| {
            assert!(codec.decode(b"\x00\x01garbage").is_err());
            assert!(!codec.will_decode(b"\x00\x01garbage"));
        });
    }

    #[test]
    fn will_decode_accepts_own_output() {
        let query = sample_query();
        each_codec::<SingleOwner>(|codec| {
            let encoded = codec.encode(&query).unwrap();
            assert!(codec.will_decode(encoded.as_bytes()));
        });
    }

    #[test]
    fn format_and_compression_names() {
        assert_eq!("bson".parse::<Format>(), Ok(Format::Bson));
        assert_eq!("json".parse::<Format>(), Ok(Format::Json));
        assert_eq!(
            "xml".parse::<Format>(),
            Err(ConfigurationError::UnknownFormat("xml".into()))
        );
        for compression in COMPRESSIONS {
            assert_eq!(compression.name().parse::<Compression>(), Ok(compression));
        }
        assert!("gzip".parse::<Compression>().is_err());
    }
}
