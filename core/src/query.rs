//! Query predicates for server-side filtering.
//!
//! A predicate is a `field-operator-value` string. The server maps operators
//! onto SQL/PostgreSQL comparisons:
//!
//! | op     | SQL         | notes |
//! |--------|-------------|-------|
//! | `eq`   | `=`         | case-sensitive for strings |
//! | `neq`  | `!=`        | case-sensitive for strings |
//! | `lt`   | `<`         | |
//! | `gt`   | `>`         | |
//! | `lte`  | `<=`        | |
//! | `gte`  | `>=`        | |
//! | `re`   | `~`         | POSIX regular expression |
//! | `rei`  | `~*`        | case-insensitive regular expression |
//! | `like` | `LIKE`      | case-sensitive |
//! | `is`   | `IS`        | use for NULL; `field-eq-null` is always false |
//! | `nt`   | `IS NOT`    | use for NOT NULL; `field-neq-null` is always false |
//!
//! Field names and operators are not validated here. Unknown operators are
//! forwarded untouched so newer server operators keep working. Hyphens inside
//! the value are not escaped; the protocol has no escape for them.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    Re,
    Rei,
    Like,
    Is,
    Nt,
    /// Any token outside the known set, sent as-is.
    Other(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Lt => "lt",
            Operator::Gt => "gt",
            Operator::Lte => "lte",
            Operator::Gte => "gte",
            Operator::Re => "re",
            Operator::Rei => "rei",
            Operator::Like => "like",
            Operator::Is => "is",
            Operator::Nt => "nt",
            Operator::Other(token) => token,
        }
    }
}

impl FromStr for Operator {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "eq" => Operator::Eq,
            "neq" => Operator::Neq,
            "lt" => Operator::Lt,
            "gt" => Operator::Gt,
            "lte" => Operator::Lte,
            "gte" => Operator::Gte,
            "re" => Operator::Re,
            "rei" => Operator::Rei,
            "like" => Operator::Like,
            "is" => Operator::Is,
            "nt" => Operator::Nt,
            other => Operator::Other(other.to_string()),
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encode a predicate triple into its wire form.
pub fn encode(field: &str, operator: &str, value: &str) -> String {
    format!("{field}-{operator}-{value}")
}

/// A single filter condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    pub value: String,
}

impl Predicate {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl ToString) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.to_string(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl ToString) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    /// `field-is-null`
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::Is, "null")
    }

    /// `field-nt-null`
    pub fn not_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::Nt, "null")
    }

    pub fn encode(&self) -> String {
        encode(&self.field, self.operator.as_str(), &self.value)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<Predicate> for String {
    fn from(predicate: Predicate) -> Self {
        predicate.encode()
    }
}
