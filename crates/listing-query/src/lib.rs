//! listing-query - Filtering, sorting, search and pagination for list pages.
//!
//! Given an unordered slice of business records, the engine produces one
//! normalized page of results:
//!
//! - Typed filter predicates combined with AND
//! - Multi-key sorting with nulls last and stable tie-breaking
//! - Free-text search with relevance scores and highlighted spans
//! - Offset pagination and opaque cursor pagination sharing one metadata shape
//!
//! The engine never sees concrete entity types. Each entity kind supplies a
//! [`FieldResolver`] (field path to [`Value`]) and a [`FieldWhitelist`]
//! (which paths may be filtered, sorted or searched).
//!
//! # Quick Start
//!
//! ```rust
//! use listing_query::{
//!     FieldSet, FilterSpec, ListEngine, ListQuery, Number, SearchSpec, SortSpec, Value,
//! };
//!
//! struct Product {
//!     name: String,
//!     price: i64,
//!     active: bool,
//! }
//!
//! fn accessor<'a>(product: &'a Product, field: &str) -> Value<'a> {
//!     match field {
//!         "name" => Value::String(&product.name),
//!         "price" => Value::Number(Number::I64(product.price)),
//!         "active" => Value::Bool(product.active),
//!         _ => Value::Null,
//!     }
//! }
//!
//! let products = vec![
//!     Product { name: "Widget".into(), price: 10, active: true },
//!     Product { name: "Wide lamp".into(), price: 40, active: true },
//!     Product { name: "Widget XL".into(), price: 25, active: false },
//! ];
//!
//! let fields = FieldSet::new(["name", "price", "active"]).search_default(["name"]);
//! let engine = ListEngine::new(fields, accessor);
//!
//! let query = ListQuery::new()
//!     .filter(FilterSpec::new().bool_equals("active", true))
//!     .search(SearchSpec::new("wid"))
//!     .sort(SortSpec::new().desc("price"))
//!     .page(1, 10);
//!
//! let page = engine.run(&products, &query).unwrap();
//! assert_eq!(page.total(), 2);
//! assert_eq!(page.items[0].name, "Wide lamp");
//!
//! let hits = page.search_results.unwrap();
//! assert_eq!((hits[1].highlights[0].start, hits[1].highlights[0].end), (0, 3));
//! ```
//!
//! # Pipeline
//!
//! ```text
//! validate → filter → search (score, drop zero) → sort → paginate
//! ```
//!
//! All field references, operands, page numbers and cursors are validated
//! before any record is evaluated. Errors come back as a [`PipelineError`]
//! naming the stage that failed.
//!
//! # Operators
//!
//! | Operator | Value types |
//! |----------|-------------|
//! | `Equals`, `OneOf` | string, number, timestamp, bool |
//! | `Contains` | string (case-insensitive) |
//! | `GreaterThan`, `LessThan`, `Range` | number, timestamp |
//! | `BoolEquals` | bool |
//!
//! Null field values never match a predicate.

mod config;
mod engine;
mod error;
mod field;
mod filter;
mod op;
mod ordering;
mod pagination;
mod search;
mod value;
mod whitelist;

pub use config::{ConfigError, EngineConfig, ScoringWeights};
pub use engine::{ListEngine, ListQuery, Page};
pub use error::{PipelineError, QueryError, Result, Stage};
pub use field::{FieldPath, FieldResolver, Record, RecordFields};
pub use filter::{CompiledFilter, FilterSpec, Operand, Predicate};
pub use op::Op;
pub use ordering::{compare_values, CompiledSort, Dir, OrderBy, SortSpec};
pub use pagination::{fingerprint, PagePlan, PaginationMetadata, PaginationSpec, Paginator};
pub use search::{Highlight, Hit, Scorer, SearchResult, SearchSpec};
pub use value::{Number, Scalar, Timestamp, Value};
pub use whitelist::{FieldSet, FieldWhitelist, Usage, RELEVANCE_FIELD};
