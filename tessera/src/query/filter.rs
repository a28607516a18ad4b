use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

use crate::store::StoredDocument;
use crate::value::{compare_values, lookup_field};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// Post-filter expression evaluated against each document the store returns.
///
/// ```
/// use tessera::{field, literal};
///
/// let expr = field("tag").eq("greeting").and(field("score").gte(literal(3)));
/// # let _ = expr;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterExpr {
    Field(String),
    Literal(Value),
    Compare(CompareOp, Box<FilterExpr>, Box<FilterExpr>),
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
}

/// Reference a document field. Dotted paths reach into nested objects;
/// `_id` and `_creationTime` are the system fields.
pub fn field(path: impl Into<String>) -> FilterExpr {
    FilterExpr::Field(path.into())
}

pub fn literal(value: impl Into<Value>) -> FilterExpr {
    FilterExpr::Literal(value.into())
}

macro_rules! literal_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FilterExpr {
                fn from(value: $ty) -> Self {
                    FilterExpr::Literal(Value::from(value))
                }
            }
        )*
    };
}

literal_from!(&str, String, bool, i32, i64, u32, u64, f64);

impl From<Value> for FilterExpr {
    fn from(value: Value) -> Self {
        FilterExpr::Literal(value)
    }
}

impl FilterExpr {
    fn compare(self, op: CompareOp, other: impl Into<FilterExpr>) -> FilterExpr {
        FilterExpr::Compare(op, Box::new(self), Box::new(other.into()))
    }

    pub fn eq(self, other: impl Into<FilterExpr>) -> FilterExpr {
        self.compare(CompareOp::Eq, other)
    }

    pub fn neq(self, other: impl Into<FilterExpr>) -> FilterExpr {
        self.compare(CompareOp::Neq, other)
    }

    pub fn lt(self, other: impl Into<FilterExpr>) -> FilterExpr {
        self.compare(CompareOp::Lt, other)
    }

    pub fn lte(self, other: impl Into<FilterExpr>) -> FilterExpr {
        self.compare(CompareOp::Lte, other)
    }

    pub fn gt(self, other: impl Into<FilterExpr>) -> FilterExpr {
        self.compare(CompareOp::Gt, other)
    }

    pub fn gte(self, other: impl Into<FilterExpr>) -> FilterExpr {
        self.compare(CompareOp::Gte, other)
    }

    pub fn and(self, other: FilterExpr) -> FilterExpr {
        match self {
            FilterExpr::And(mut all) => {
                all.push(other);
                FilterExpr::And(all)
            }
            first => FilterExpr::And(vec![first, other]),
        }
    }

    pub fn or(self, other: FilterExpr) -> FilterExpr {
        match self {
            FilterExpr::Or(mut any) => {
                any.push(other);
                FilterExpr::Or(any)
            }
            first => FilterExpr::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> FilterExpr {
        FilterExpr::Not(Box::new(self))
    }

    pub fn evaluate(&self, doc: &StoredDocument) -> Value {
        match self {
            FilterExpr::Field(path) => match path.as_str() {
                "_id" => Value::String(doc.id.clone()),
                "_creationTime" => Value::from(doc.created_at.timestamp_millis()),
                _ => lookup_field(&doc.fields, path).cloned().unwrap_or(Value::Null),
            },
            FilterExpr::Literal(value) => value.clone(),
            FilterExpr::Compare(op, left, right) => {
                let ord = compare_values(&left.evaluate(doc), &right.evaluate(doc));
                Value::Bool(match op {
                    CompareOp::Eq => ord == Ordering::Equal,
                    CompareOp::Neq => ord != Ordering::Equal,
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::Lte => ord != Ordering::Greater,
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::Gte => ord != Ordering::Less,
                })
            }
            FilterExpr::And(all) => Value::Bool(all.iter().all(|e| e.matches(doc))),
            FilterExpr::Or(any) => Value::Bool(any.iter().any(|e| e.matches(doc))),
            FilterExpr::Not(inner) => Value::Bool(!inner.matches(doc)),
        }
    }

    /// A document passes when the expression evaluates to `true`.
    pub fn matches(&self, doc: &StoredDocument) -> bool {
        self.evaluate(doc) == Value::Bool(true)
    }
}
