//! Per-entity field whitelists.
//!
//! A whitelist decides which field paths an entity kind accepts for
//! filtering, sorting and searching. The engine consults it before resolving
//! any field so that unknown fields fail fast instead of silently matching
//! nothing.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Derived sort field carrying the search relevance score.
///
/// Always sortable, whatever the whitelist says.
pub const RELEVANCE_FIELD: &str = "_score";

/// What a field reference is being used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Usage {
    Filter,
    Sort,
    Search,
}

impl Usage {
    pub fn as_str(self) -> &'static str {
        match self {
            Usage::Filter => "filtering",
            Usage::Sort => "sorting",
            Usage::Search => "searching",
        }
    }
}

impl std::fmt::Display for Usage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Field whitelist for one entity kind.
pub trait FieldWhitelist {
    /// Returns `true` if the path may be referenced at all.
    fn is_queryable(&self, path: &str) -> bool;

    /// Returns `true` if the path may be used for the given purpose.
    fn allows(&self, usage: Usage, path: &str) -> bool {
        let _ = usage;
        self.is_queryable(path)
    }

    /// Fields searched when a search request names none.
    fn search_fields(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<W: FieldWhitelist + ?Sized> FieldWhitelist for &W {
    fn is_queryable(&self, path: &str) -> bool {
        (**self).is_queryable(path)
    }

    fn allows(&self, usage: Usage, path: &str) -> bool {
        (**self).allows(usage, path)
    }

    fn search_fields(&self) -> Vec<String> {
        (**self).search_fields()
    }
}

/// Set-backed whitelist, loadable from configuration.
///
/// `fields` lists every queryable path. `sortable` and `searchable`, when
/// present, narrow sorting and searching to a subset; when absent every
/// queryable field is allowed. `search_default` names the fields searched
/// when a request does not specify any.
///
/// ```
/// use listing_query::{FieldSet, FieldWhitelist, Usage};
///
/// let fields = FieldSet::new(["name", "price", "payment.name"])
///     .sortable(["name", "price"])
///     .search_default(["name"]);
///
/// assert!(fields.allows(Usage::Filter, "payment.name"));
/// assert!(!fields.allows(Usage::Sort, "payment.name"));
/// assert_eq!(fields.search_fields(), vec!["name".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSet {
    pub fields: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sortable: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searchable: Option<BTreeSet<String>>,
    pub search_default: Vec<String>,
}

impl FieldSet {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldSet {
            fields: fields.into_iter().map(Into::into).collect(),
            ..FieldSet::default()
        }
    }

    pub fn sortable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sortable = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn searchable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn search_default<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_default = fields.into_iter().map(Into::into).collect();
        self
    }
}

impl FieldWhitelist for FieldSet {
    fn is_queryable(&self, path: &str) -> bool {
        self.fields.contains(path)
    }

    fn allows(&self, usage: Usage, path: &str) -> bool {
        if !self.is_queryable(path) {
            return false;
        }
        let narrowed = match usage {
            Usage::Filter => None,
            Usage::Sort => self.sortable.as_ref(),
            Usage::Search => self.searchable.as_ref(),
        };
        narrowed.map_or(true, |set| set.contains(path))
    }

    fn search_fields(&self) -> Vec<String> {
        self.search_default
            .iter()
            .filter(|field| self.allows(Usage::Search, field))
            .cloned()
            .collect()
    }
}
