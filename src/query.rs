//! Query envelope exchanged in both directions of a connection.
//!
//! A [`Query`] always carries an id and a [`QueryType`]. Parameters default to an empty map
//! and the payload is optional; both only appear on the wire when they carry something.
//!
//! # Example
//! ```rust
//! use querywire::{Query, QueryType, Value};
//!
//! let query = Query::new(42, QueryType::StoreProcedure)
//!     .with_parameter("k", "v")
//!     .with_parameter("n", i64::MAX);
//!
//! assert_eq!(query.parameter("k"), Some(&Value::Str("v".into())));
//! assert!(query.payload.is_none());
//! ```
use std::fmt;

use crate::{
    error::ResultError,
    result::ResultSet,
    value::{Value, ValueMap},
};

/// General kind of a query, each with a compact code used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryType {
    Ping,
    Pong,
    /// Successful command without a return value.
    Success,
    Error,
    /// Initial login at the server.
    Authentication,
    /// Changes settings of the sender's own connection.
    Configuration,
    /// Executes a statement directly.
    DirectCypher,
    /// Calls a stored statement or routine by name.
    ProcedureCall,
    DeleteProcedure,
    StoreProcedure,
    /// Values returned from a called procedure or executed statement.
    Result,
}

impl QueryType {
    pub const ALL: [QueryType; 11] = [
        QueryType::Ping,
        QueryType::Pong,
        QueryType::Success,
        QueryType::Error,
        QueryType::Authentication,
        QueryType::Configuration,
        QueryType::DirectCypher,
        QueryType::ProcedureCall,
        QueryType::DeleteProcedure,
        QueryType::StoreProcedure,
        QueryType::Result,
    ];

    pub fn code(self) -> &'static str {
        match self {
            QueryType::Ping => "i",
            QueryType::Pong => "o",
            QueryType::Success => "y",
            QueryType::Error => "err",
            QueryType::Authentication => "a",
            QueryType::Configuration => "c",
            QueryType::DirectCypher => "d",
            QueryType::ProcedureCall => "s",
            QueryType::DeleteProcedure => "e",
            QueryType::StoreProcedure => "n",
            QueryType::Result => "r",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryType::Ping => "PING",
            QueryType::Pong => "PONG",
            QueryType::Success => "SUCCESS",
            QueryType::Error => "ERROR",
            QueryType::Authentication => "AUTHENTICATION",
            QueryType::Configuration => "CONFIGURATION",
            QueryType::DirectCypher => "DIRECT_CYPHER",
            QueryType::ProcedureCall => "PROCEDURE_CALL",
            QueryType::DeleteProcedure => "DELETE_PROCEDURE",
            QueryType::StoreProcedure => "STORE_PROCEDURE",
            QueryType::Result => "RESULT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Caller assigned, used only to correlate responses with requests.
    pub id: i32,
    pub kind: QueryType,
    pub parameters: ValueMap,
    pub payload: Option<Value>,
}

impl Default for Query {
    /// An empty ping with id 0.
    fn default() -> Self {
        Self::new(0, QueryType::Ping)
    }
}

impl Query {
    pub fn new(id: i32, kind: QueryType) -> Self {
        Self {
            id,
            kind,
            parameters: ValueMap::new(),
            payload: None,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_parameter(key, value);
        self
    }

    pub fn with_parameters(mut self, parameters: ValueMap) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    pub fn set_parameter(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.parameters.insert(key.into(), value.into());
    }

    /// RESULT query answering `id` with the given result set as payload.
    pub fn result(id: i32, result: &ResultSet) -> Self {
        Self::new(id, QueryType::Result).with_payload(result.to_map())
    }

    /// ERROR query answering `id` with a message payload.
    pub fn error(id: i32, message: impl Into<String>) -> Self {
        Self::new(id, QueryType::Error).with_payload(message.into())
    }

    /// Reads the payload back as a result set.
    pub fn result_set(&self) -> Result<ResultSet, ResultError> {
        match &self.payload {
            Some(Value::Map(map)) => ResultSet::from_map(map.clone()),
            Some(Value::Native(native)) => match native.clone().into_generic() {
                Value::Map(map) => ResultSet::from_map(map),
                other => Err(ResultError::InvalidField {
                    field: crate::keys::query::PAYLOAD,
                    expected: "map",
                    found: other.kind(),
                }),
            },
            Some(other) => Err(ResultError::InvalidField {
                field: crate::keys::query::PAYLOAD,
                expected: "map",
                found: other.kind(),
            }),
            None => Err(ResultError::MissingField(crate::keys::query::PAYLOAD)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_are_unique_and_reversible() {
        for kind in QueryType::ALL {
            assert_eq!(QueryType::from_code(kind.code()), Some(kind));
        }

        let mut codes = QueryType::ALL.map(QueryType::code).to_vec();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), QueryType::ALL.len());
    }

    #[test]
    fn unknown_type_code() {
        assert_eq!(QueryType::from_code("zz"), None);
        assert_eq!(QueryType::from_code(""), None);
    }

    #[test]
    fn default_query_is_ping() {
        let query = Query::default();
        assert_eq!(query.id, 0);
        assert_eq!(query.kind, QueryType::Ping);
        assert!(query.parameters.is_empty());
        assert!(query.payload.is_none());
    }

    #[test]
    fn result_payload_round_trip() {
        let set = ResultSet::list(vec![Value::Int32(1), Value::Int32(2)]).with_total(10);
        let query = Query::result(3, &set);

        assert_eq!(query.kind, QueryType::Result);
        assert_eq!(query.result_set().unwrap(), set);
    }

    #[test]
    #[should_panic(expected = "MissingField")]
    fn result_set_without_payload() {
        Query::new(1, QueryType::Result).result_set().unwrap();
    }
}
