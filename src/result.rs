//! Potentially paginated result sets.
//!
//! A [`ResultSet`] couples pagination metadata with one of three bodies: a single map, a list
//! of values, or a table of rows with named columns. Result sets ride inside a RESULT query's
//! payload as a plain map, see [`ResultSet::to_map`] and [`ResultSet::from_map`].
use crate::{
    error::ResultError,
    keys::result as key,
    value::{Value, ValueMap},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultType {
    Single,
    List,
    Table,
}

impl ResultType {
    pub fn code(self) -> &'static str {
        match self {
            ResultType::Single => "s",
            ResultType::List => "l",
            ResultType::Table => "t",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        [ResultType::Single, ResultType::List, ResultType::Table]
            .into_iter()
            .find(|t| t.code() == code)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultBody {
    Single(ValueMap),
    List(Vec<Value>),
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    first: i32,
    max: i32,
    total: i32,
    body: ResultBody,
}

const DEFAULT_FIRST: i32 = 0;
const UNSET: i32 = -1;

impl ResultSet {
    fn with_body(body: ResultBody) -> Self {
        Self {
            first: DEFAULT_FIRST,
            max: UNSET,
            total: UNSET,
            body,
        }
    }

    pub fn single(result: ValueMap) -> Self {
        Self::with_body(ResultBody::Single(result))
    }

    pub fn list(results: Vec<Value>) -> Self {
        Self::with_body(ResultBody::List(results))
    }

    /// Builds a table, rejecting rows whose width differs from the column count.
    pub fn table(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, ResultError> {
        check_rows(&columns, &rows)?;
        Ok(Self::with_body(ResultBody::Table { columns, rows }))
    }

    pub fn with_first(mut self, first: i32) -> Self {
        self.first = first;
        self
    }

    pub fn with_max(mut self, max: i32) -> Self {
        self.max = max;
        self
    }

    pub fn with_total(mut self, total: i32) -> Self {
        self.total = total;
        self
    }

    pub fn set_first(&mut self, first: i32) {
        self.first = first;
    }

    pub fn set_max(&mut self, max: i32) {
        self.max = max;
    }

    pub fn set_total(&mut self, total: i32) {
        self.total = total;
    }

    pub fn kind(&self) -> ResultType {
        match self.body {
            ResultBody::Single(_) => ResultType::Single,
            ResultBody::List(_) => ResultType::List,
            ResultBody::Table { .. } => ResultType::Table,
        }
    }

    /// Index of the first returned result among all results.
    pub fn first(&self) -> i32 {
        self.first
    }

    /// Maximum number of results that were requested, `-1` when unset.
    pub fn max(&self) -> i32 {
        self.max
    }

    /// Total number of results available, `-1` when unset.
    pub fn total(&self) -> i32 {
        self.total
    }

    pub fn body(&self) -> &ResultBody {
        &self.body
    }

    pub fn into_body(self) -> ResultBody {
        self.body
    }

    /// Number of results contained; a single result always counts as one.
    pub fn size(&self) -> usize {
        match &self.body {
            ResultBody::Single(_) => 1,
            ResultBody::List(list) => list.len(),
            ResultBody::Table { rows, .. } => rows.len(),
        }
    }

    pub fn columns(&self) -> Option<&[String]> {
        match &self.body {
            ResultBody::Table { columns, .. } => Some(columns),
            _ => None,
        }
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns()?.iter().position(|c| c == column)
    }

    /// Replaces the column names of a table, keeping rows untouched.
    pub fn set_columns(&mut self, new_columns: Vec<String>) -> Result<(), ResultError> {
        match &mut self.body {
            ResultBody::Table { columns, rows } => {
                check_rows(&new_columns, rows)?;
                *columns = new_columns;
                Ok(())
            }
            _ => Err(ResultError::InvalidField {
                field: key::COLUMNS,
                expected: "table result",
                found: "non-table result",
            }),
        }
    }

    /// Transferable form. Pagination fields are only written when they differ from their
    /// defaults, `total` never for single results.
    pub fn to_map(&self) -> ValueMap {
        let mut map = ValueMap::new();
        let kind = self.kind();

        map.insert(key::TYPE.to_string(), kind.code().into());

        if self.first > 0 {
            map.insert(key::FIRST.to_string(), Value::Int32(self.first));
        }
        if self.max > 0 {
            map.insert(key::MAX.to_string(), Value::Int32(self.max));
        }
        if kind != ResultType::Single && self.total >= 0 {
            map.insert(key::TOTAL.to_string(), Value::Int32(self.total));
        }

        let results = match &self.body {
            ResultBody::Single(single) => Value::Map(single.clone()),
            ResultBody::List(list) => Value::List(list.clone()),
            ResultBody::Table { columns, rows } => {
                map.insert(
                    key::COLUMNS.to_string(),
                    Value::List(columns.iter().cloned().map(Value::Str).collect()),
                );
                Value::List(rows.iter().cloned().map(Value::List).collect())
            }
        };
        map.insert(key::RESULTS.to_string(), results);

        map
    }

    pub fn from_map(mut map: ValueMap) -> Result<Self, ResultError> {
        let code = match map.remove(key::TYPE) {
            Some(Value::Str(code)) => code,
            Some(other) => {
                return Err(ResultError::InvalidField {
                    field: key::TYPE,
                    expected: "string",
                    found: other.kind(),
                });
            }
            None => return Err(ResultError::MissingField(key::TYPE)),
        };
        let kind = ResultType::from_code(&code).ok_or(ResultError::UnknownResultType(code))?;

        let first = pagination(&map, key::FIRST)?.unwrap_or(DEFAULT_FIRST);
        let max = pagination(&map, key::MAX)?.unwrap_or(UNSET);
        let total = pagination(&map, key::TOTAL)?.unwrap_or(UNSET);

        let results = map
            .remove(key::RESULTS)
            .ok_or(ResultError::MissingField(key::RESULTS))?;

        let body = match kind {
            ResultType::Single => ResultBody::Single(expect_map(results)?),
            ResultType::List => ResultBody::List(expect_list(key::RESULTS, results)?),
            ResultType::Table => {
                let columns = map
                    .remove(key::COLUMNS)
                    .ok_or(ResultError::MissingField(key::COLUMNS))?;
                let columns = expect_list(key::COLUMNS, columns)?
                    .into_iter()
                    .map(|c| match c {
                        Value::Str(s) => Ok(s),
                        other => Err(ResultError::InvalidField {
                            field: key::COLUMNS,
                            expected: "string",
                            found: other.kind(),
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let rows = expect_list(key::RESULTS, results)?
                    .into_iter()
                    .map(|row| expect_list(key::RESULTS, row))
                    .collect::<Result<Vec<_>, _>>()?;

                check_rows(&columns, &rows)?;
                ResultBody::Table { columns, rows }
            }
        };

        Ok(Self {
            first,
            max,
            total,
            body,
        })
    }
}

fn check_rows(columns: &[String], rows: &[Vec<Value>]) -> Result<(), ResultError> {
    match rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != columns.len())
    {
        Some((row, values)) => Err(ResultError::RowWidth {
            row,
            expected: columns.len(),
            found: values.len(),
        }),
        None => Ok(()),
    }
}

fn pagination(map: &ValueMap, field: &'static str) -> Result<Option<i32>, ResultError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i32()
            .map(Some)
            .ok_or(ResultError::InvalidField {
                field,
                expected: "int32",
                found: value.kind(),
            }),
    }
}

fn expect_map(value: Value) -> Result<ValueMap, ResultError> {
    let found = value.kind();
    value.into_map().ok_or(ResultError::InvalidField {
        field: key::RESULTS,
        expected: "map",
        found,
    })
}

fn expect_list(field: &'static str, value: Value) -> Result<Vec<Value>, ResultError> {
    let found = value.kind();
    value.into_list().ok_or(ResultError::InvalidField {
        field,
        expected: "list",
        found,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[i32]) -> Vec<Value> {
        values.iter().copied().map(Value::Int32).collect()
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn defaults_are_omitted() {
        let set = ResultSet::list(vec![]);
        let map = set.to_map();

        assert_eq!(map.get(key::TYPE), Some(&Value::Str("l".into())));
        assert!(!map.contains_key(key::FIRST));
        assert!(!map.contains_key(key::MAX));
        assert!(!map.contains_key(key::TOTAL));
        assert!(!map.contains_key(key::COLUMNS));
    }

    #[test]
    fn single_never_writes_total() {
        let set = ResultSet::single(ValueMap::new()).with_total(5).with_first(2);
        let map = set.to_map();

        assert!(!map.contains_key(key::TOTAL));
        assert_eq!(map.get(key::FIRST), Some(&Value::Int32(2)));

        let decoded = ResultSet::from_map(map).unwrap();
        assert_eq!(decoded.total(), -1);
        assert_eq!(decoded.first(), 2);
        assert_eq!(decoded.size(), 1);
    }

    #[test]
    fn list_round_trip_with_pagination() {
        let set = ResultSet::list(vec![Value::from("a"), Value::from("b")])
            .with_first(10)
            .with_max(2)
            .with_total(40);

        let decoded = ResultSet::from_map(set.to_map()).unwrap();
        assert_eq!(decoded, set);
        assert_eq!(decoded.kind(), ResultType::List);
        assert_eq!(decoded.size(), 2);
        assert_eq!((decoded.first(), decoded.max(), decoded.total()), (10, 2, 40));
    }

    #[test]
    fn zero_total_is_kept() {
        let set = ResultSet::list(vec![]).with_total(0);
        let decoded = ResultSet::from_map(set.to_map()).unwrap();
        assert_eq!(decoded.total(), 0);
    }

    #[test]
    fn table_round_trip() {
        let set = ResultSet::table(columns(&["id", "name"]), vec![row(&[1, 2]), row(&[3, 4])])
            .unwrap()
            .with_total(2);

        let decoded = ResultSet::from_map(set.to_map()).unwrap();
        assert_eq!(decoded, set);
        assert_eq!(decoded.columns().unwrap(), &columns(&["id", "name"])[..]);
        assert_eq!(decoded.column_index("name"), Some(1));
        assert_eq!(decoded.column_index("missing"), None);
        assert_eq!(decoded.size(), 2);
    }

    #[test]
    fn table_rejects_ragged_rows() {
        let err = ResultSet::table(columns(&["a", "b"]), vec![row(&[1, 2]), row(&[3])]).unwrap_err();
        assert_eq!(
            err,
            ResultError::RowWidth {
                row: 1,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn decoding_rejects_ragged_rows() {
        let mut map = ResultSet::table(columns(&["a"]), vec![row(&[1])])
            .unwrap()
            .to_map();
        map.insert(key::RESULTS.to_string(), Value::List(vec![Value::List(row(&[1, 2]))]));

        assert!(matches!(
            ResultSet::from_map(map),
            Err(ResultError::RowWidth { row: 0, .. })
        ));
    }

    #[test]
    fn unknown_result_type() {
        let mut map = ValueMap::new();
        map.insert(key::TYPE.to_string(), "x".into());
        map.insert(key::RESULTS.to_string(), Value::List(vec![]));

        assert_eq!(
            ResultSet::from_map(map),
            Err(ResultError::UnknownResultType("x".into()))
        );
    }

    #[test]
    fn set_columns_validates_width() {
        let mut set = ResultSet::table(columns(&["a"]), vec![row(&[1])]).unwrap();
        assert!(set.set_columns(columns(&["a", "b"])).is_err());
        set.set_columns(columns(&["renamed"])).unwrap();
        assert_eq!(set.column_index("renamed"), Some(0));

        let mut list = ResultSet::list(vec![]);
        assert!(list.set_columns(columns(&["a"])).is_err());
    }

    #[test]
    fn pagination_accepts_wide_integers() {
        let mut map = ResultSet::list(vec![]).to_map();
        map.insert(key::TOTAL.to_string(), Value::Int64(12));

        assert_eq!(ResultSet::from_map(map).unwrap().total(), 12);
    }
}
