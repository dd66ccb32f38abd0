//! Predicate evaluation, sorting, and paging for stored records.

use std::cmp::Ordering;

use serde_json::Value;

/// A parsed `field-operator-value` predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub op: String,
    pub value: String,
}

impl Condition {
    /// Split on the first two hyphens; the value keeps any further hyphens.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, '-');
        let field = parts.next()?.to_string();
        let op = parts.next()?.to_string();
        let value = parts.next()?.to_string();
        if field.is_empty() {
            return None;
        }
        Some(Self { field, op, value })
    }

    /// Whether the operator is one this stub can evaluate.
    pub fn is_supported(&self) -> bool {
        matches!(
            self.op.as_str(),
            "eq" | "neq" | "lt" | "gt" | "lte" | "gte" | "like" | "is" | "nt"
        )
    }

    pub fn matches(&self, record: &Value) -> bool {
        // Subscribers expose list membership through the nested `lists` array.
        if self.field == "list_id" && record.get("list_id").is_none() {
            return record
                .get("lists")
                .and_then(Value::as_array)
                .is_some_and(|lists| lists.iter().any(|l| self.test(l.get("list_id"))));
        }
        self.test(record.get(&self.field))
    }

    fn test(&self, field: Option<&Value>) -> bool {
        let field = field.filter(|v| !v.is_null());
        match self.op.as_str() {
            "is" => field.is_none() == (self.value == "null"),
            "nt" => field.is_some() == (self.value == "null"),
            op => {
                let Some(field) = field else {
                    return false;
                };
                let ord = compare_text(&text(field), &self.value);
                match op {
                    "eq" => ord == Ordering::Equal,
                    "neq" => ord != Ordering::Equal,
                    "lt" => ord == Ordering::Less,
                    "gt" => ord == Ordering::Greater,
                    "lte" => ord != Ordering::Greater,
                    "gte" => ord != Ordering::Less,
                    "like" => like(&text(field), &self.value),
                    _ => false,
                }
            }
        }
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numeric comparison when both sides are numbers, otherwise lexicographic.
fn compare_text(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

/// SQL LIKE with `%` (any run) and `_` (any one character).
fn like(input: &str, pattern: &str) -> bool {
    let input: Vec<char> = input.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    like_at(&input, &pattern)
}

fn like_at(input: &[char], pattern: &[char]) -> bool {
    match pattern.split_first() {
        None => input.is_empty(),
        Some(('%', rest)) => (0..=input.len()).any(|skip| like_at(&input[skip..], rest)),
        Some(('_', rest)) => !input.is_empty() && like_at(&input[1..], rest),
        Some((c, rest)) => input.first() == Some(c) && like_at(&input[1..], rest),
    }
}

/// Order records by `field`; records without the field sort first.
pub fn sort_by_field(records: &mut [Value], field: &str, descending: bool) {
    records.sort_by(|a, b| {
        let ord = match (a.get(field), b.get(field)) {
            (Some(x), Some(y)) => compare_text(&text(x), &text(y)),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}
