//! Paging, sorting and filtering options carried in a query's parameter map.
use std::fmt;

use crate::{
    error::DecodeError,
    keys::options as key,
    value::{Value, ValueMap},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn code(self) -> &'static str {
        match self {
            SortOrder::Ascending => "a",
            SortOrder::Descending => "d",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "a" => Some(SortOrder::Ascending),
            "d" => Some(SortOrder::Descending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperation {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
    HasProperty,
}

impl FilterOperation {
    pub const ALL: [FilterOperation; 5] = [
        FilterOperation::Contains,
        FilterOperation::Equals,
        FilterOperation::StartsWith,
        FilterOperation::EndsWith,
        FilterOperation::HasProperty,
    ];

    pub fn code(self) -> &'static str {
        match self {
            FilterOperation::Contains => "c",
            FilterOperation::Equals => "e",
            FilterOperation::StartsWith => "sw",
            FilterOperation::EndsWith => "ew",
            FilterOperation::HasProperty => "h",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }
}

impl fmt::Display for FilterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub operation: FilterOperation,
    /// Absent for [`FilterOperation::HasProperty`].
    pub value: Option<Value>,
}

/// Options a client attaches to a query to page, sort or filter its result.
///
/// Every option is optional; unset options are simply not written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub first: Option<i32>,
    pub max: Option<i32>,
    pub sort_field: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub filter: Option<Filter>,
}

impl QueryOptions {
    pub fn page(mut self, first: i32, max: i32) -> Self {
        self.first = Some(first);
        self.max = Some(max);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_field = Some(field.into());
        self.sort_order = Some(order);
        self
    }

    pub fn filter(
        mut self,
        field: impl Into<String>,
        operation: FilterOperation,
        value: Option<Value>,
    ) -> Self {
        self.filter = Some(Filter {
            field: field.into(),
            operation,
            value,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn write_to(&self, parameters: &mut ValueMap) {
        if let Some(first) = self.first {
            parameters.insert(key::FIRST.into(), Value::Int32(first));
        }
        if let Some(max) = self.max {
            parameters.insert(key::MAX.into(), Value::Int32(max));
        }
        if let Some(field) = &self.sort_field {
            parameters.insert(key::SORT_FIELD.into(), Value::Str(field.clone()));
        }
        if let Some(order) = self.sort_order {
            parameters.insert(key::SORT_ORDER.into(), order.code().into());
        }
        if let Some(filter) = &self.filter {
            parameters.insert(key::FILTER_FIELD.into(), Value::Str(filter.field.clone()));
            parameters.insert(key::FILTER_OPERATION.into(), filter.operation.code().into());
            if let Some(value) = &filter.value {
                parameters.insert(key::FILTER_VALUE.into(), value.clone());
            }
        }
    }

    pub fn from_parameters(parameters: &ValueMap) -> Result<Self, DecodeError> {
        let first = int_option(parameters, key::FIRST)?;
        let max = int_option(parameters, key::MAX)?;
        let sort_field = str_option(parameters, key::SORT_FIELD)?.map(str::to_string);

        let sort_order = str_option(parameters, key::SORT_ORDER)?
            .map(|code| {
                SortOrder::from_code(code).ok_or_else(|| DecodeError::InvalidField {
                    field: key::SORT_ORDER,
                    reason: format!("unknown sort order '{code}'"),
                })
            })
            .transpose()?;

        let filter = match str_option(parameters, key::FILTER_FIELD)? {
            Some(field) => {
                let code = str_option(parameters, key::FILTER_OPERATION)?
                    .unwrap_or(FilterOperation::Equals.code());
                let operation =
                    FilterOperation::from_code(code).ok_or_else(|| DecodeError::InvalidField {
                        field: key::FILTER_OPERATION,
                        reason: format!("unknown filter operation '{code}'"),
                    })?;
                Some(Filter {
                    field: field.to_string(),
                    operation,
                    value: parameters.get(key::FILTER_VALUE).cloned(),
                })
            }
            None => None,
        };

        Ok(Self {
            first,
            max,
            sort_field,
            sort_order,
            filter,
        })
    }
}

fn int_option(parameters: &ValueMap, field: &'static str) -> Result<Option<i32>, DecodeError> {
    match parameters.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i32()
            .map(Some)
            .ok_or_else(|| DecodeError::InvalidField {
                field,
                reason: format!("expected integer, found {}", value.kind()),
            }),
    }
}

fn str_option<'a>(
    parameters: &'a ValueMap,
    field: &'static str,
) -> Result<Option<&'a str>, DecodeError> {
    match parameters.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| DecodeError::InvalidField {
                field,
                reason: format!("expected string, found {}", value.kind()),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_are_written_with_short_keys() {
        let options = QueryOptions::default()
            .page(10, 5)
            .sort("name", SortOrder::Descending)
            .filter("name", FilterOperation::StartsWith, Some("Jo".into()));

        let mut parameters = ValueMap::new();
        options.write_to(&mut parameters);

        assert_eq!(parameters.get("s_s"), Some(&Value::Int32(10)));
        assert_eq!(parameters.get("s_n"), Some(&Value::Int32(5)));
        assert_eq!(parameters.get("sf"), Some(&Value::Str("name".into())));
        assert_eq!(parameters.get("so"), Some(&Value::Str("d".into())));
        assert_eq!(parameters.get("fo"), Some(&Value::Str("sw".into())));
        assert_eq!(parameters.get("fv"), Some(&Value::Str("Jo".into())));

        assert_eq!(QueryOptions::from_parameters(&parameters).unwrap(), options);
    }

    #[test]
    fn unset_options_write_nothing() {
        let mut parameters = ValueMap::new();
        QueryOptions::default().write_to(&mut parameters);
        assert!(parameters.is_empty());
        assert!(QueryOptions::from_parameters(&parameters).unwrap().is_empty());
    }

    #[test]
    fn has_property_filter_carries_no_value() {
        let options = QueryOptions::default().filter("email", FilterOperation::HasProperty, None);
        let mut parameters = ValueMap::new();
        options.write_to(&mut parameters);

        assert!(!parameters.contains_key("fv"));
        assert_eq!(QueryOptions::from_parameters(&parameters).unwrap(), options);
    }

    #[test]
    fn missing_filter_operation_means_equals() {
        let parameters: ValueMap = [("ff".to_string(), Value::from("id"))].into();
        let filter = QueryOptions::from_parameters(&parameters)
            .unwrap()
            .filter
            .unwrap();
        assert_eq!(filter.operation, FilterOperation::Equals);
    }

    #[test]
    fn unknown_codes_are_rejected() {
        let parameters: ValueMap = [("so".to_string(), Value::from("up"))].into();
        assert!(matches!(
            QueryOptions::from_parameters(&parameters),
            Err(DecodeError::InvalidField { field: "so", .. })
        ));

        let parameters: ValueMap = [
            ("ff".to_string(), Value::from("x")),
            ("fo".to_string(), Value::from("regex")),
        ]
        .into();
        assert!(matches!(
            QueryOptions::from_parameters(&parameters),
            Err(DecodeError::InvalidField { field: "fo", .. })
        ));
    }

    #[test]
    fn wide_paging_values_are_rejected() {
        let parameters: ValueMap = [("s_n".to_string(), Value::Int64(i64::MAX))].into();
        assert!(QueryOptions::from_parameters(&parameters).is_err());

        // JSON may hand paging values back as Int64 when they were sent wide
        let parameters: ValueMap = [("s_n".to_string(), Value::Int64(20))].into();
        assert_eq!(
            QueryOptions::from_parameters(&parameters).unwrap().max,
            Some(20)
        );
    }

    #[test]
    fn filter_codes_round_trip() {
        for operation in FilterOperation::ALL {
            assert_eq!(FilterOperation::from_code(operation.code()), Some(operation));
        }
        assert_eq!(FilterOperation::from_code("x"), None);
    }
}
