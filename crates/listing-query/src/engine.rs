//! Query builder and pipeline.
//!
//! [`ListQuery`] bundles the four optional specifications of a list request.
//! [`ListEngine`] runs it against a record slice in a fixed order:
//!
//! ```text
//! validate → filter → search (score, drop zero) → sort → paginate
//! ```
//!
//! Validation covers every field reference, operand, page number and cursor
//! before a single record is evaluated.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ConfigError, EngineConfig};
use crate::error::{PipelineError, QueryError, Stage};
use crate::field::FieldResolver;
use crate::filter::FilterSpec;
use crate::ordering::SortSpec;
use crate::pagination::{self, PaginationMetadata, PaginationSpec, Paginator};
use crate::search::{Hit, SearchResult, SearchSpec};
use crate::whitelist::FieldWhitelist;

/// A list request: pagination plus optional filter, sort and search.
///
/// # Example
///
/// ```
/// use listing_query::{FilterSpec, ListQuery, SearchSpec, SortSpec};
///
/// let query = ListQuery::new()
///     .filter(FilterSpec::new().bool_equals("active", true))
///     .search(SearchSpec::new("widget"))
///     .sort(SortSpec::new().by_relevance().asc("name"))
///     .page(2, 25);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub pagination: Option<PaginationSpec>,
    pub filter: Option<FilterSpec>,
    pub sort: Option<SortSpec>,
    pub search: Option<SearchSpec>,
}

impl ListQuery {
    /// Creates a query for the first page at the default size.
    pub fn new() -> Self {
        ListQuery::default()
    }

    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn search(mut self, search: SearchSpec) -> Self {
        self.search = Some(search);
        self
    }

    pub fn paginate(mut self, pagination: PaginationSpec) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Offset pagination: page numbers start at 1.
    pub fn page(self, page: usize, page_size: usize) -> Self {
        self.paginate(PaginationSpec::page(page, page_size))
    }

    /// Cursor pagination resuming after `cursor`, or from the start.
    pub fn cursor(self, cursor: Option<String>, page_size: usize) -> Self {
        self.paginate(PaginationSpec::Cursor {
            cursor,
            page_size: Some(page_size),
        })
    }

    /// Identifies the result order, for cursor validation.
    ///
    /// Empty specs hash like absent ones.
    pub fn fingerprint(&self) -> u64 {
        let filter = self.filter.as_ref().filter(|f| !f.is_empty());
        let sort = self.sort.as_ref().filter(|s| !s.is_empty());
        let search = self.search.as_ref().filter(|s| s.is_active());
        pagination::fingerprint(&(filter, sort, search))
    }
}

/// One page of results.
///
/// `search_results`, when present, is aligned by position with `items`.
#[derive(Debug)]
pub struct Page<'a, T> {
    pub items: Vec<&'a T>,
    pub pagination: PaginationMetadata,
    pub search_results: Option<Vec<SearchResult>>,
}

impl<'a, T> Page<'a, T> {
    /// Records matching the query, across all pages.
    pub fn total(&self) -> usize {
        self.pagination.total_items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates records together with their search result, if any.
    pub fn hits(&self) -> impl Iterator<Item = (&'a T, Option<&SearchResult>)> + '_ {
        self.items.iter().enumerate().map(move |(i, record)| {
            let result = self.search_results.as_ref().and_then(|r| r.get(i));
            (*record, result)
        })
    }
}

fn at(stage: Stage) -> impl Fn(QueryError) -> PipelineError {
    move |source| PipelineError::new(stage, source)
}

/// List-query engine for one entity kind.
///
/// Holds the entity's field whitelist and resolver plus the shared
/// configuration. It keeps no state between calls, so one engine can serve
/// concurrent requests.
///
/// # Example
///
/// ```
/// use listing_query::{
///     FieldSet, ListEngine, ListQuery, Number, SortSpec, Value,
/// };
///
/// struct Product {
///     name: String,
///     price: i64,
/// }
///
/// fn accessor<'a>(p: &'a Product, field: &str) -> Value<'a> {
///     match field {
///         "name" => Value::String(&p.name),
///         "price" => Value::Number(Number::I64(p.price)),
///         _ => Value::Null,
///     }
/// }
///
/// let products = vec![
///     Product { name: "Widget".into(), price: 10 },
///     Product { name: "Gadget".into(), price: 25 },
/// ];
///
/// let engine = ListEngine::new(FieldSet::new(["name", "price"]), accessor);
/// let page = engine
///     .run(&products, &ListQuery::new().sort(SortSpec::new().desc("price")))
///     .unwrap();
///
/// assert_eq!(page.items[0].name, "Gadget");
/// assert_eq!(page.total(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ListEngine<W, R> {
    whitelist: W,
    resolver: R,
    config: EngineConfig,
    paginator: Paginator,
}

impl<W: FieldWhitelist, R> ListEngine<W, R> {
    /// Creates an engine with the default configuration.
    pub fn new(whitelist: W, resolver: R) -> Self {
        Self::build(whitelist, resolver, EngineConfig::default())
    }

    /// Creates an engine with an explicit configuration.
    ///
    /// Fails if the configuration does not pass [`EngineConfig::validate`].
    pub fn with_config(
        whitelist: W,
        resolver: R,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(whitelist, resolver, config))
    }

    fn build(whitelist: W, resolver: R, config: EngineConfig) -> Self {
        ListEngine {
            paginator: Paginator::new(&config),
            whitelist,
            resolver,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn whitelist(&self) -> &W {
        &self.whitelist
    }

    /// Processes one list request from its separate specifications.
    ///
    /// `pagination: None` returns the first page at the default size.
    pub fn process<'a, T>(
        &self,
        records: &'a [T],
        pagination: Option<PaginationSpec>,
        filter: Option<FilterSpec>,
        sort: Option<SortSpec>,
        search: Option<SearchSpec>,
    ) -> Result<Page<'a, T>, PipelineError>
    where
        R: FieldResolver<T>,
    {
        let query = ListQuery {
            pagination,
            filter,
            sort,
            search,
        };
        self.run(records, &query)
    }

    /// Runs a [`ListQuery`] against `records`.
    ///
    /// Fails with the first error, tagged with the stage that raised it.
    /// On success the page is complete; there are no partial results.
    pub fn run<'a, T>(&self, records: &'a [T], query: &ListQuery) -> Result<Page<'a, T>, PipelineError>
    where
        R: FieldResolver<T>,
    {
        let filter = query
            .filter
            .as_ref()
            .map(|f| f.compile(&self.whitelist))
            .transpose()
            .map_err(at(Stage::Filter))?;
        let scorer = query
            .search
            .as_ref()
            .map(|s| s.compile(&self.whitelist, &self.config.weights))
            .transpose()
            .map_err(at(Stage::Search))?;
        let sort = query
            .sort
            .as_ref()
            .map(|s| s.compile(&self.whitelist))
            .transpose()
            .map_err(at(Stage::Sort))?;
        let plan = self
            .paginator
            .plan(
                query.pagination.as_ref().unwrap_or(&PaginationSpec::default()),
                query.fingerprint(),
            )
            .map_err(at(Stage::Paginate))?;

        let kept: Vec<&'a T> = match &filter {
            Some(filter) => filter
                .apply(records, &self.resolver)
                .map_err(at(Stage::Filter))?,
            None => records.iter().collect(),
        };
        let filtered = kept.len();

        let mut hits: Vec<Hit<'a, T>> = match &scorer {
            Some(scorer) => scorer.apply(kept, &self.resolver),
            None => kept.into_iter().map(Hit::unscored).collect(),
        };

        if let Some(sort) = &sort {
            sort.sort(&mut hits, &self.resolver);
        }

        let matched = hits.len();
        let (page, pagination) = self
            .paginator
            .paginate(&plan, hits)
            .map_err(at(Stage::Paginate))?;

        let (items, results): (Vec<&'a T>, Vec<SearchResult>) =
            page.into_iter().map(|hit| (hit.record, hit.result)).unzip();

        debug!(
            records = records.len(),
            filtered,
            matched,
            page_size = plan.page_size(),
            returned = items.len(),
            "list query processed"
        );

        Ok(Page {
            items,
            pagination,
            search_results: scorer.is_some().then_some(results),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Number, Value};
    use crate::whitelist::{FieldSet, Usage};

    #[derive(Debug, PartialEq)]
    struct Product {
        name: &'static str,
        price: i64,
    }

    fn accessor<'a>(p: &'a Product, field: &str) -> Value<'a> {
        match field {
            "name" => Value::String(p.name),
            "price" => Value::Number(Number::I64(p.price)),
            _ => Value::Null,
        }
    }

    fn products() -> Vec<Product> {
        ["Widget", "Gadget", "Wide lamp", "Sprocket"]
            .into_iter()
            .zip([10, 25, 40, 5])
            .map(|(name, price)| Product { name, price })
            .collect()
    }

    type Accessor = for<'a> fn(&'a Product, &str) -> Value<'a>;

    fn engine() -> ListEngine<FieldSet, Accessor> {
        ListEngine::new(
            FieldSet::new(["name", "price"]).search_default(["name"]),
            accessor as Accessor,
        )
    }

    #[test]
    fn no_specs_returns_first_default_page_in_input_order() {
        let records = products();
        let page = engine().process(&records, None, None, None, None).unwrap();
        assert_eq!(page.len(), 4);
        assert_eq!(page.items[0].name, "Widget");
        assert_eq!(page.pagination.current_page, Some(1));
        assert_eq!(page.pagination.page_size, 20);
        assert!(page.search_results.is_none());
    }

    #[test]
    fn search_results_align_with_items() {
        let records = products();
        let query = ListQuery::new()
            .search(SearchSpec::new("wid"))
            .sort(SortSpec::new().desc("price"));
        let page = engine().run(&records, &query).unwrap();

        let names: Vec<_> = page.items.iter().map(|p| p.name).collect();
        assert_eq!(names, ["Wide lamp", "Widget"]);

        let results = page.search_results.as_ref().unwrap();
        assert_eq!(results.len(), 2);
        for (record, result) in page.hits() {
            let result = result.unwrap();
            assert!(result.score > 0.0);
            assert_eq!(&record.name[..3], "Wid");
        }
    }

    #[test]
    fn errors_carry_stage() {
        let records = products();
        let err = engine()
            .run(&records, &ListQuery::new().sort(SortSpec::new().asc("colour")))
            .unwrap_err();
        assert_eq!(err.stage, Stage::Sort);
        assert_eq!(
            err.source,
            QueryError::InvalidField {
                field: "colour".into(),
                usage: Usage::Sort,
            }
        );

        let err = engine()
            .run(&records, &ListQuery::new().page(0, 10))
            .unwrap_err();
        assert_eq!(err.stage, Stage::Paginate);
    }

    #[test]
    fn type_mismatch_surfaces_from_filter_stage() {
        let records = products();
        let query = ListQuery::new().filter(FilterSpec::new().contains("price", "1"));
        let err = engine().run(&records, &query).unwrap_err();
        assert_eq!(err.stage, Stage::Filter);
        assert!(matches!(err.source, QueryError::TypeMismatch { .. }));
    }

    #[test]
    fn fingerprint_ignores_pagination_and_empty_specs() {
        let base = ListQuery::new().page(1, 10);
        assert_eq!(
            base.fingerprint(),
            ListQuery::new()
                .filter(FilterSpec::new())
                .search(SearchSpec::new(" "))
                .page(3, 50)
                .fingerprint()
        );
        assert_ne!(
            base.fingerprint(),
            base.clone().sort(SortSpec::new().asc("name")).fingerprint()
        );
    }

    #[test]
    fn cursor_from_other_sort_is_rejected() {
        let records = products();
        let by_name = ListQuery::new()
            .sort(SortSpec::new().asc("name"))
            .cursor(None, 2);
        let first = engine().run(&records, &by_name).unwrap();
        let next = first.pagination.next_cursor.clone().unwrap();

        let by_price = ListQuery::new()
            .sort(SortSpec::new().asc("price"))
            .cursor(Some(next), 2);
        let err = engine().run(&records, &by_price).unwrap_err();
        assert_eq!(err.stage, Stage::Paginate);
        assert!(matches!(err.source, QueryError::InvalidCursor(_)));
    }

    #[test]
    fn with_config_rejects_invalid_configuration() {
        let fields = FieldSet::new(["name", "price"]);
        let zero_max = EngineConfig {
            max_page_size: 0,
            ..EngineConfig::default()
        };
        let err = ListEngine::with_config(fields.clone(), accessor as Accessor, zero_max)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let default_above_max = EngineConfig {
            default_page_size: 50,
            max_page_size: 10,
            ..EngineConfig::default()
        };
        assert!(ListEngine::with_config(fields, accessor as Accessor, default_above_max).is_err());
    }

    #[test]
    fn with_config_applies_page_sizes() {
        let config = EngineConfig {
            default_page_size: 2,
            max_page_size: 3,
            ..EngineConfig::default()
        };
        let engine =
            ListEngine::with_config(FieldSet::new(["name"]), accessor as Accessor, config).unwrap();
        let records = products();

        assert_eq!(engine.run(&records, &ListQuery::new()).unwrap().len(), 2);
        assert_eq!(engine.run(&records, &ListQuery::new().page(1, 10)).unwrap().len(), 3);
    }

    #[test]
    fn list_query_deserializes() {
        let json = r#"{
            "pagination": {"mode": "offset", "page": 1, "page_size": 5},
            "filter": [{"field": "price", "op": "greater_than", "value": {"number": 8}}],
            "sort": [{"field": "price", "dir": "desc"}],
            "search": {"query": "wid"}
        }"#;
        let query: ListQuery = serde_json::from_str(json).unwrap();
        let records = products();
        let page = engine().run(&records, &query).unwrap();
        let names: Vec<_> = page.items.iter().map(|p| p.name).collect();
        assert_eq!(names, ["Wide lamp", "Widget"]);
    }
}
