//! Query key construction.
//!
//! Turns an endpoint path plus [`FilterOptions`] into a canonical [`QueryKey`].
//! Named filters serialize in a fixed field order, so two option sets with the
//! same defined fields always produce the same key no matter how they were built.

use std::collections::BTreeMap;
use std::fmt;

use url::form_urlencoded;

/// A scalar (or list of scalars) accepted as a filter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Text(String),
    /// Serialized as repeated `name=value` pairs, in insertion order.
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Empty strings (and lists of them) emit nothing; `false` and `0` are kept.
    fn push_pairs(&self, name: &str, pairs: &mut Vec<(String, String)>) {
        match self {
            Self::Bool(value) => pairs.push((name.to_string(), value.to_string())),
            Self::Int(value) => pairs.push((name.to_string(), value.to_string())),
            Self::Text(value) if value.is_empty() => {}
            Self::Text(value) => pairs.push((name.to_string(), value.clone())),
            Self::List(values) => {
                for value in values {
                    value.push_pairs(name, pairs);
                }
            }
        }
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<V: Into<FilterValue>> From<Vec<V>> for FilterValue {
    fn from(values: Vec<V>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Caller-supplied filter and pagination parameters for a collection fetch.
///
/// `None` fields are omitted from the serialized key entirely, which keeps
/// "unset" distinct from `false` or `0`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub museum_id: Option<FilterValue>,
    pub approved: Option<bool>,
    pub featured: Option<bool>,
    /// Serialized as `type`.
    pub kind: Option<String>,
    /// Serialized as repeated `tag` pairs in the order given (not sorted).
    pub tags: Vec<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub page: Option<u32>,
    /// Serialized as `search`.
    pub search_query: Option<String>,
    /// Endpoint-specific fields, serialized after the named ones in key order.
    pub extra: BTreeMap<String, FilterValue>,
}

impl FilterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn museum_id(mut self, id: impl Into<FilterValue>) -> Self {
        self.museum_id = Some(id.into());
        self
    }

    pub fn approved(mut self, approved: bool) -> Self {
        self.approved = Some(approved);
        self
    }

    pub fn featured(mut self, featured: bool) -> Self {
        self.featured = Some(featured);
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.search_query = Some(query.into());
        self
    }

    pub fn extra(mut self, name: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Defined fields as ordered `(name, value)` pairs.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();

        if let Some(id) = &self.museum_id {
            id.push_pairs("museumId", &mut pairs);
        }
        if let Some(approved) = self.approved {
            pairs.push(("approved".to_string(), approved.to_string()));
        }
        if let Some(featured) = self.featured {
            pairs.push(("featured".to_string(), featured.to_string()));
        }
        if let Some(kind) = self.kind.as_deref().filter(|kind| !kind.is_empty()) {
            pairs.push(("type".to_string(), kind.to_string()));
        }
        for tag in self.tags.iter().filter(|tag| !tag.is_empty()) {
            pairs.push(("tag".to_string(), tag.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(query) = self.search_query.as_deref().filter(|q| !q.is_empty()) {
            pairs.push(("search".to_string(), query.to_string()));
        }
        for (name, value) in &self.extra {
            value.push_pairs(name, &mut pairs);
        }

        pairs
    }

    /// URL-encoded query string without the leading `?`; empty when nothing is set.
    pub fn query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in self.query_pairs() {
            serializer.append_pair(&name, &value);
        }
        serializer.finish()
    }
}

/// Canonical identifier for an (endpoint, filters) combination.
///
/// Doubles as the request target: it is the endpoint path followed by the
/// query string, or the bare path when no filter is set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(String);

impl QueryKey {
    /// Build the key for `endpoint` with `options`.
    pub fn build(endpoint: &str, options: &FilterOptions) -> Self {
        let query = options.query_string();
        if query.is_empty() {
            Self(endpoint.to_string())
        } else {
            Self(format!("{endpoint}?{query}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The endpoint path portion of the key.
    pub fn path(&self) -> &str {
        self.0.split_once('?').map_or(self.0.as_str(), |(path, _)| path)
    }

    /// The query string portion of the key, if any.
    pub fn query(&self) -> Option<&str> {
        self.0.split_once('?').map(|(_, query)| query)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QueryKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
