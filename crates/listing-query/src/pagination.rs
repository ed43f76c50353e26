//! Offset and cursor pagination.
//!
//! Both modes produce the same [`PaginationMetadata`]. Cursor tokens are
//! URL-safe base64 over a small JSON payload:
//!
//! ```text
//! base64({"v":1,"offset":40,"fingerprint":1234567890})
//! ```
//!
//! The fingerprint identifies the filter, sort and search of the query that
//! issued the cursor, so a cursor replayed against a different query is
//! rejected rather than silently resuming at an unrelated position.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{trace, warn};

use crate::config::EngineConfig;
use crate::error::{QueryError, Result};

const CURSOR_VERSION: u8 = 1;

/// Which page to return.
///
/// `page_size: None` uses the engine's default size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PaginationSpec {
    /// Numbered pages, starting at 1.
    Offset {
        page: usize,
        #[serde(default)]
        page_size: Option<usize>,
    },
    /// Sequential pages; `cursor: None` starts at the beginning.
    Cursor {
        #[serde(default)]
        cursor: Option<String>,
        #[serde(default)]
        page_size: Option<usize>,
    },
}

impl Default for PaginationSpec {
    fn default() -> Self {
        PaginationSpec::Offset {
            page: 1,
            page_size: None,
        }
    }
}

impl PaginationSpec {
    pub fn page(page: usize, page_size: usize) -> Self {
        PaginationSpec::Offset {
            page,
            page_size: Some(page_size),
        }
    }

    /// First cursor page.
    pub fn first(page_size: usize) -> Self {
        PaginationSpec::Cursor {
            cursor: None,
            page_size: Some(page_size),
        }
    }

    pub fn after(cursor: impl Into<String>, page_size: usize) -> Self {
        PaginationSpec::Cursor {
            cursor: Some(cursor.into()),
            page_size: Some(page_size),
        }
    }

    fn requested_size(&self) -> Option<usize> {
        match self {
            PaginationSpec::Offset { page_size, .. } | PaginationSpec::Cursor { page_size, .. } => {
                *page_size
            }
        }
    }
}

/// Pagination block returned with every page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMetadata {
    /// Records matching the query, across all pages.
    pub total_items: usize,
    pub total_pages: usize,
    pub page_size: usize,
    /// Set in offset mode.
    pub current_page: Option<usize>,
    /// Set in cursor mode while more records follow.
    pub next_cursor: Option<String>,
    /// Set in cursor mode when the page does not start at the beginning.
    pub previous_cursor: Option<String>,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorToken {
    v: u8,
    offset: usize,
    fingerprint: u64,
}

/// Hashes the parts of a query that determine its result order.
///
/// Cursors issued under one fingerprint are only valid for queries with the
/// same fingerprint. The value is the first eight bytes of a SHA-256 over
/// the query's JSON, so it is stable across builds and releases.
pub fn fingerprint<S: Serialize + ?Sized>(query: &S) -> u64 {
    let digest = Sha256::digest(serde_json::to_vec(query).unwrap_or_default());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

fn encode_cursor(offset: usize, fingerprint: u64) -> String {
    let token = CursorToken {
        v: CURSOR_VERSION,
        offset,
        fingerprint,
    };
    let json = serde_json::to_vec(&token).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

fn decode_cursor(cursor: &str, fingerprint: u64) -> Result<usize> {
    let invalid = |reason: &str| {
        trace!(cursor, reason, "rejected cursor");
        QueryError::InvalidCursor(reason.to_string())
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(cursor.trim())
        .map_err(|_| invalid("not valid base64"))?;
    let token: CursorToken =
        serde_json::from_slice(&bytes).map_err(|_| invalid("malformed cursor payload"))?;

    if token.v != CURSOR_VERSION {
        return Err(invalid("unsupported cursor version"));
    }
    if token.fingerprint != fingerprint {
        return Err(invalid("cursor was issued for a different query"));
    }
    Ok(token.offset)
}

/// A validated pagination request, ready to slice a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePlan {
    mode: PlanMode,
    page_size: usize,
    fingerprint: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanMode {
    Offset { page: usize },
    Cursor { offset: usize },
}

impl PagePlan {
    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

/// Slices ordered results into pages.
#[derive(Debug, Clone)]
pub struct Paginator {
    default_page_size: usize,
    max_page_size: usize,
    strict: bool,
}

impl Paginator {
    pub fn new(config: &EngineConfig) -> Self {
        Paginator {
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
            strict: config.strict_page_size,
        }
    }

    fn page_size(&self, requested: Option<usize>) -> Result<usize> {
        let size = requested.unwrap_or(self.default_page_size);
        if size <= self.max_page_size {
            return Ok(size);
        }
        if self.strict {
            return Err(QueryError::InvalidPagination(format!(
                "page size {size} exceeds the maximum of {}",
                self.max_page_size
            )));
        }
        warn!(requested = size, max = self.max_page_size, "page size clamped");
        Ok(self.max_page_size)
    }

    /// Validates the request and decodes any cursor.
    ///
    /// Runs before the result set exists; a cursor offset is checked
    /// against the result length later, in [`Paginator::paginate`].
    pub fn plan(&self, spec: &PaginationSpec, fingerprint: u64) -> Result<PagePlan> {
        let page_size = self.page_size(spec.requested_size())?;
        let mode = match spec {
            PaginationSpec::Offset { page, .. } => {
                if *page < 1 {
                    return Err(QueryError::InvalidPagination(format!(
                        "page number must be at least 1, got {page}"
                    )));
                }
                PlanMode::Offset { page: *page }
            }
            PaginationSpec::Cursor { cursor, .. } => PlanMode::Cursor {
                offset: match cursor {
                    Some(token) => decode_cursor(token, fingerprint)?,
                    None => 0,
                },
            },
        };
        Ok(PagePlan {
            mode,
            page_size,
            fingerprint,
        })
    }

    /// Returns the requested page of `items` and its metadata.
    pub fn paginate<I>(&self, plan: &PagePlan, items: Vec<I>) -> Result<(Vec<I>, PaginationMetadata)> {
        let total = items.len();
        let size = plan.page_size;
        let total_pages = if size == 0 { 0 } else { total.div_ceil(size) };

        let (start, metadata) = match plan.mode {
            PlanMode::Offset { page } => {
                let start = (page - 1).saturating_mul(size);
                let metadata = PaginationMetadata {
                    total_items: total,
                    total_pages,
                    page_size: size,
                    current_page: Some(page),
                    next_cursor: None,
                    previous_cursor: None,
                    has_next: size > 0 && page < total_pages,
                    has_previous: size > 0 && page > 1,
                };
                (start, metadata)
            }
            PlanMode::Cursor { offset } => {
                if offset > total {
                    trace!(offset, total, "cursor past end of results");
                    return Err(QueryError::InvalidCursor(
                        "cursor points past the end of the results".to_string(),
                    ));
                }
                let end = offset.saturating_add(size).min(total);
                let next_cursor =
                    (size > 0 && end < total).then(|| encode_cursor(end, plan.fingerprint));
                let previous_cursor = (size > 0 && offset > 0)
                    .then(|| encode_cursor(offset.saturating_sub(size), plan.fingerprint));
                let metadata = PaginationMetadata {
                    total_items: total,
                    total_pages,
                    page_size: size,
                    current_page: None,
                    has_next: next_cursor.is_some(),
                    has_previous: previous_cursor.is_some(),
                    next_cursor,
                    previous_cursor,
                };
                (offset, metadata)
            }
        };

        let page = items.into_iter().skip(start).take(size).collect();
        Ok((page, metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paginator() -> Paginator {
        Paginator::new(&EngineConfig::default())
    }

    fn run(spec: PaginationSpec, total: usize) -> Result<(Vec<usize>, PaginationMetadata)> {
        let p = paginator();
        let plan = p.plan(&spec, 7)?;
        p.paginate(&plan, (0..total).collect())
    }

    #[test]
    fn offset_first_page() {
        let (page, meta) = run(PaginationSpec::page(1, 5), 12).unwrap();
        assert_eq!(page, [0, 1, 2, 3, 4]);
        assert_eq!(meta.total_items, 12);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.current_page, Some(1));
        assert!(meta.has_next);
        assert!(!meta.has_previous);
    }

    #[test]
    fn offset_last_partial_page() {
        let (page, meta) = run(PaginationSpec::page(3, 5), 12).unwrap();
        assert_eq!(page, [10, 11]);
        assert!(!meta.has_next);
        assert!(meta.has_previous);
    }

    #[test]
    fn offset_beyond_last_page_is_empty() {
        let (page, meta) = run(PaginationSpec::page(9, 5), 12).unwrap();
        assert!(page.is_empty());
        assert!(!meta.has_next);
        assert_eq!(meta.total_items, 12);
    }

    #[test]
    fn zero_page_size() {
        let (page, meta) = run(PaginationSpec::page(1, 0), 12).unwrap();
        assert!(page.is_empty());
        assert_eq!(meta.total_items, 12);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next);
        assert!(!meta.has_previous);
    }

    #[test]
    fn page_zero_rejected() {
        let err = run(PaginationSpec::page(0, 5), 12).unwrap_err();
        assert!(matches!(err, QueryError::InvalidPagination(_)));
    }

    #[test]
    fn default_and_clamped_sizes() {
        let (page, _) = run(PaginationSpec::default(), 50).unwrap();
        assert_eq!(page.len(), 20);

        let (page, meta) = run(PaginationSpec::page(1, 1000), 500).unwrap();
        assert_eq!(page.len(), 100);
        assert_eq!(meta.page_size, 100);
    }

    #[test]
    fn strict_size_rejects_oversized_page() {
        let config = EngineConfig {
            strict_page_size: true,
            ..EngineConfig::default()
        };
        let err = Paginator::new(&config)
            .plan(&PaginationSpec::page(1, 101), 0)
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidPagination(_)));
    }

    #[test]
    fn cursor_walks_all_pages() {
        let p = paginator();
        let mut spec = PaginationSpec::first(4);
        let mut seen = Vec::new();
        loop {
            let plan = p.plan(&spec, 7).unwrap();
            let (page, meta) = p.paginate(&plan, (0..10).collect::<Vec<_>>()).unwrap();
            assert_eq!(meta.current_page, None);
            seen.extend(page);
            match meta.next_cursor {
                Some(next) => spec = PaginationSpec::after(next, 4),
                None => break,
            }
        }
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn previous_cursor_steps_back() {
        let p = paginator();
        let plan = p.plan(&PaginationSpec::after(encode_cursor(8, 7), 4), 7).unwrap();
        let (page, meta) = p.paginate(&plan, (0..10).collect::<Vec<_>>()).unwrap();
        assert_eq!(page, [8, 9]);
        assert!(meta.next_cursor.is_none());
        assert!(meta.has_previous);

        let back = meta.previous_cursor.unwrap();
        assert_eq!(decode_cursor(&back, 7).unwrap(), 4);
    }

    #[test]
    fn garbage_cursor_rejected() {
        let err = run(PaginationSpec::after("not a cursor!", 5), 10).unwrap_err();
        assert!(matches!(err, QueryError::InvalidCursor(_)));

        let not_json = URL_SAFE_NO_PAD.encode(b"12:34");
        let err = run(PaginationSpec::after(not_json, 5), 10).unwrap_err();
        assert!(matches!(err, QueryError::InvalidCursor(_)));
    }

    #[test]
    fn cursor_from_other_query_rejected() {
        let err = run(PaginationSpec::after(encode_cursor(5, 99), 5), 10).unwrap_err();
        assert_eq!(
            err,
            QueryError::InvalidCursor("cursor was issued for a different query".into())
        );
    }

    #[test]
    fn stale_cursor_past_end_rejected() {
        let err = run(PaginationSpec::after(encode_cursor(30, 7), 5), 10).unwrap_err();
        assert!(matches!(err, QueryError::InvalidCursor(_)));
    }

    #[test]
    fn fingerprint_tracks_query_shape() {
        assert_eq!(fingerprint(&("name", 1)), fingerprint(&("name", 1)));
        assert_ne!(fingerprint(&("name", 1)), fingerprint(&("name", 2)));
    }

    #[test]
    fn fingerprint_is_fixed_across_builds() {
        // SHA-256 of `["name",1]`, first eight bytes big-endian.
        assert_eq!(fingerprint(&("name", 1)), 12_724_698_353_909_032_237);
    }

    #[test]
    fn spec_deserializes_tagged() {
        let spec: PaginationSpec =
            serde_json::from_str(r#"{"mode": "offset", "page": 2, "page_size": 10}"#).unwrap();
        assert_eq!(spec, PaginationSpec::page(2, 10));

        let spec: PaginationSpec = serde_json::from_str(r#"{"mode": "cursor"}"#).unwrap();
        assert_eq!(
            spec,
            PaginationSpec::Cursor {
                cursor: None,
                page_size: None,
            }
        );
    }
}
