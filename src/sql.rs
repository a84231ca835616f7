//! Tagged values and parameterized statements used to talk to the embedded
//! store without leaking its native bindings into the rest of the crate.

use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};

/// Discriminant of a [`SqlParameter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlKind {
    Null,
    Integer,
    Real,
    Text,
}

/// A tagged value bound positionally into a statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SqlParameter {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlParameter {
    pub fn kind(&self) -> SqlKind {
        match self {
            SqlParameter::Null => SqlKind::Null,
            SqlParameter::Integer(_) => SqlKind::Integer,
            SqlParameter::Real(_) => SqlKind::Real,
            SqlParameter::Text(_) => SqlKind::Text,
        }
    }

    pub fn set_null(&mut self) {
        *self = SqlParameter::Null;
    }

    pub fn set_integer(&mut self, value: i64) {
        *self = SqlParameter::Integer(value);
    }

    pub fn set_real(&mut self, value: f64) {
        *self = SqlParameter::Real(value);
    }

    pub fn set_text(&mut self, value: impl Into<String>) {
        *self = SqlParameter::Text(value.into());
    }

    /// The integer value, only when this parameter holds one.
    pub fn query_integer(&self) -> Option<i64> {
        match self {
            SqlParameter::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// The real value, only when this parameter holds one.
    pub fn query_real(&self) -> Option<f64> {
        match self {
            SqlParameter::Real(value) => Some(*value),
            _ => None,
        }
    }

    /// The text value, only when this parameter holds one.
    pub fn query_text(&self) -> Option<&str> {
        match self {
            SqlParameter::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<i64> for SqlParameter {
    fn from(value: i64) -> Self {
        SqlParameter::Integer(value)
    }
}

impl From<f64> for SqlParameter {
    fn from(value: f64) -> Self {
        SqlParameter::Real(value)
    }
}

impl From<String> for SqlParameter {
    fn from(value: String) -> Self {
        SqlParameter::Text(value)
    }
}

impl From<&str> for SqlParameter {
    fn from(value: &str) -> Self {
        SqlParameter::Text(value.to_owned())
    }
}

impl ToSql for SqlParameter {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParameter::Null => ToSqlOutput::Owned(Value::Null),
            SqlParameter::Integer(value) => ToSqlOutput::Owned(Value::Integer(*value)),
            SqlParameter::Real(value) => ToSqlOutput::Owned(Value::Real(*value)),
            SqlParameter::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
        })
    }
}

/// A statement body plus its positionally bound parameters. This is a plain
/// carrier; execution belongs to the log store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlStatement {
    pub text: String,
    pub parameters: Vec<SqlParameter>,
}

impl SqlStatement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    pub fn append_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn push_parameter(&mut self, parameter: impl Into<SqlParameter>) {
        self.parameters.push(parameter.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_null() {
        let parameter = SqlParameter::default();
        assert_eq!(parameter.kind(), SqlKind::Null);
        assert_eq!(parameter.query_integer(), None);
        assert_eq!(parameter.query_real(), None);
        assert_eq!(parameter.query_text(), None);
    }

    #[test]
    fn round_trip_matching_tag() {
        let mut parameter = SqlParameter::default();

        parameter.set_integer(42);
        assert_eq!(parameter.kind(), SqlKind::Integer);
        assert_eq!(parameter.query_integer(), Some(42));
        assert_eq!(parameter.query_real(), None);
        assert_eq!(parameter.query_text(), None);

        parameter.set_real(0.5);
        assert_eq!(parameter.kind(), SqlKind::Real);
        assert_eq!(parameter.query_real(), Some(0.5));
        assert_eq!(parameter.query_integer(), None);

        parameter.set_text("hello");
        assert_eq!(parameter.kind(), SqlKind::Text);
        assert_eq!(parameter.query_text(), Some("hello"));
        assert_eq!(parameter.query_integer(), None);

        parameter.set_null();
        assert_eq!(parameter.kind(), SqlKind::Null);
    }

    #[test]
    fn statement_carries_parameters_in_order() {
        let mut statement = SqlStatement::new("SELECT ? + ?;");
        statement.push_parameter(1i64);
        statement.push_parameter(2i64);
        assert_eq!(statement.parameters.len(), 2);
        assert_eq!(statement.parameters[0].query_integer(), Some(1));
        assert_eq!(statement.parameters[1].query_integer(), Some(2));
    }
}
