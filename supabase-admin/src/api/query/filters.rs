//! PostgREST horizontal filters
//!
//! A [`Filter`] renders to the `column=op.value` query parameters PostgREST
//! understands, and can also be evaluated locally against a JSON row with the
//! same SQL semantics (a NULL column never satisfies a comparison).

use serde_json::Value;

/// A literal value inside a filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Null,
}

impl FilterValue {
    /// Form used after `eq.` / `neq.`
    fn render(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Null => "null".to_string(),
        }
    }

    /// Form used inside `not.in.(...)`; strings are always double-quoted so commas,
    /// parentheses and dots in emails cannot break the list
    fn render_list_item(&self) -> String {
        match self {
            Self::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            other => other.render(),
        }
    }

    /// Equality against a JSON column value. NULL never equals anything.
    fn equals(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (Self::Null, _) => false,
            (Self::String(expected), Value::String(actual)) => expected == actual,
            (Self::String(expected), Value::Number(actual)) => *expected == actual.to_string(),
            (Self::Integer(expected), Value::Number(actual)) => actual.as_i64() == Some(*expected),
            (Self::Integer(expected), Value::String(actual)) => *actual == expected.to_string(),
            (Self::Boolean(expected), Value::Bool(actual)) => expected == actual,
            _ => false,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for FilterValue {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Row filter. Multiple filters combined with [`Filter::And`] become separate
/// query parameters, which PostgREST joins with AND.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, FilterValue),
    NotEq(String, FilterValue),
    NotIn(String, Vec<FilterValue>),
    IsNull(String),
    NotNull(String),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn not_eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::NotEq(field.into(), value.into())
    }

    pub fn not_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        Self::NotIn(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Self::And(filters)
    }

    /// Render as PostgREST query parameters
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        match self {
            Self::Eq(field, FilterValue::Null) => vec![(field.clone(), "is.null".to_string())],
            Self::NotEq(field, FilterValue::Null) => {
                vec![(field.clone(), "not.is.null".to_string())]
            }
            Self::Eq(field, value) => vec![(field.clone(), format!("eq.{}", value.render()))],
            Self::NotEq(field, value) => vec![(field.clone(), format!("neq.{}", value.render()))],
            Self::NotIn(field, values) => {
                vec![(field.clone(), format!("not.in.({})", render_list(values)))]
            }
            Self::IsNull(field) => vec![(field.clone(), "is.null".to_string())],
            Self::NotNull(field) => vec![(field.clone(), "not.is.null".to_string())],
            Self::And(filters) => filters.iter().flat_map(Filter::to_query_pairs).collect(),
        }
    }

    /// Render as a query string fragment, e.g. `email=neq.admin@x.com`
    pub fn to_query_string(&self) -> String {
        self.to_query_pairs()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Evaluate the filter against a JSON object the way the database would
    pub fn matches(&self, row: &Value) -> bool {
        let column = |field: &str| row.get(field).unwrap_or(&Value::Null);

        match self {
            Self::Eq(field, FilterValue::Null) | Self::IsNull(field) => column(field).is_null(),
            Self::NotEq(field, FilterValue::Null) | Self::NotNull(field) => {
                !column(field).is_null()
            }
            Self::Eq(field, value) => value.equals(column(field)),
            Self::NotEq(field, value) => {
                let actual = column(field);
                !actual.is_null() && !value.equals(actual)
            }
            Self::NotIn(field, values) => {
                let actual = column(field);
                !actual.is_null() && !values.iter().any(|v| v.equals(actual))
            }
            Self::And(filters) => filters.iter().all(|f| f.matches(row)),
        }
    }
}

fn render_list(values: &[FilterValue]) -> String {
    values
        .iter()
        .map(FilterValue::render_list_item)
        .collect::<Vec<_>>()
        .join(",")
}
