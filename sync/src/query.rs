//! Query descriptions.
//!
//! A query names the remote namespace it reads from and optionally narrows
//! the result with equality filters. The remote source decides how to
//! evaluate it; sessions only carry it around and log it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Equality filter on one field of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub field: String,
    pub value: serde_json::Value,
}

/// A query against the remote source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// Target namespace (collection, table, path)
    pub namespace: String,
    /// Filters, all of which must match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
}

impl Query {
    /// Query every item of a namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            filters: Vec::new(),
        }
    }

    /// Narrow the query to items whose `field` equals `value`.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Check a JSON item against the filters.
    pub fn matches(&self, item: &serde_json::Value) -> bool {
        self.filters
            .iter()
            .all(|f| item.get(&f.field) == Some(&f.value))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.namespace)?;
        for (i, filter) in self.filters.iter().enumerate() {
            let sep = if i == 0 { " where " } else { " and " };
            write!(f, "{sep}{} = {}", filter.field, filter.value)?;
        }
        Ok(())
    }
}
