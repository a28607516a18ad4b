use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::schema::SearchIndexDefinition;
use crate::value::{compare_values, lookup_field};

/// Key range over an index: an equality prefix, then at most one lower and
/// one upper bound on the next index field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexRange {
    pub equalities: Vec<(String, Value)>,
    pub lower: Option<RangeBound>,
    pub upper: Option<RangeBound>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeBound {
    pub field: String,
    pub value: Value,
    pub inclusive: bool,
}

impl IndexRange {
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equalities.push((field.into(), value.into()));
        self
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.lower_bound(field.into(), value.into(), false)
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.lower_bound(field.into(), value.into(), true)
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.upper_bound(field.into(), value.into(), false)
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.upper_bound(field.into(), value.into(), true)
    }

    fn lower_bound(mut self, field: String, value: Value, inclusive: bool) -> Self {
        self.lower = Some(RangeBound { field, value, inclusive });
        self
    }

    fn upper_bound(mut self, field: String, value: Value, inclusive: bool) -> Self {
        self.upper = Some(RangeBound { field, value, inclusive });
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.equalities.is_empty() && self.lower.is_none() && self.upper.is_none()
    }

    /// Check the range against the fields of the index it is applied to.
    pub fn check(&self, index_fields: &[String]) -> std::result::Result<(), String> {
        for (position, (field, _)) in self.equalities.iter().enumerate() {
            match index_fields.get(position) {
                Some(expected) if expected == field => {}
                Some(expected) => {
                    return Err(format!(
                        "equality on '{field}' at position {position}, index expects '{expected}'"
                    ))
                }
                None => return Err(format!("equality on '{field}' exceeds the index fields")),
            }
        }

        let next = index_fields.get(self.equalities.len());
        for bound in [&self.lower, &self.upper].into_iter().flatten() {
            match next {
                Some(expected) if *expected == bound.field => {}
                Some(expected) => {
                    return Err(format!(
                        "range bound on '{}', index expects '{expected}' after the equalities",
                        bound.field
                    ))
                }
                None => {
                    return Err(format!(
                        "range bound on '{}' exceeds the index fields",
                        bound.field
                    ))
                }
            }
        }
        Ok(())
    }

    /// Whether a document's fields fall inside this range.
    pub fn contains(&self, fields: &Map<String, Value>) -> bool {
        let value_of = |path: &str| lookup_field(fields, path).cloned().unwrap_or(Value::Null);

        for (field, expected) in &self.equalities {
            if compare_values(&value_of(field), expected) != Ordering::Equal {
                return false;
            }
        }
        if let Some(bound) = &self.lower {
            match compare_values(&value_of(&bound.field), &bound.value) {
                Ordering::Less => return false,
                Ordering::Equal if !bound.inclusive => return false,
                _ => {}
            }
        }
        if let Some(bound) = &self.upper {
            match compare_values(&value_of(&bound.field), &bound.value) {
                Ordering::Greater => return false,
                Ordering::Equal if !bound.inclusive => return false,
                _ => {}
            }
        }
        true
    }
}

/// Full-text search filter: one search term plus equality filters on the
/// index's filter fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchFilter {
    pub search: Option<(String, String)>,
    pub equalities: Vec<(String, Value)>,
}

impl SearchFilter {
    pub fn search(mut self, field: impl Into<String>, term: impl Into<String>) -> Self {
        self.search = Some((field.into(), term.into()));
        self
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equalities.push((field.into(), value.into()));
        self
    }

    pub fn check(&self, index: &SearchIndexDefinition) -> std::result::Result<(), String> {
        match &self.search {
            None => return Err("search filter has no search term".to_string()),
            Some((field, _)) if *field != index.search_field => {
                return Err(format!(
                    "search on '{field}', index searches '{}'",
                    index.search_field
                ))
            }
            Some(_) => {}
        }
        for (field, _) in &self.equalities {
            if !index.filter_fields.contains(field) {
                return Err(format!("'{field}' is not a filter field of the search index"));
            }
        }
        Ok(())
    }
}
