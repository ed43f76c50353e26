//! Free-text search: relevance scoring and highlighting.
//!
//! A non-empty query is lowercased and split into tokens on anything that is
//! not alphanumeric. Lowercasing is per character on both the query and the
//! field, and highlights are found in that same lowercased text, so every
//! scoring field yields at least one highlight. Each searchable string field contributes to the score:
//!
//! | Match | Weight (default) |
//! |-------|------------------|
//! | whole field equals the query | `exact_field` (10.0) |
//! | field contains the whole query | `phrase` (4.0) |
//! | a word equals a token | `token_exact` (2.0) |
//! | a word starts with a token | `token_prefix` (1.5) |
//! | field contains a token elsewhere | `token_partial` (1.0) |
//!
//! Records scoring zero are dropped, so an active search also filters.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::ScoringWeights;
use crate::error::{QueryError, Result};
use crate::field::{FieldPath, FieldResolver};
use crate::value::Value;
use crate::whitelist::{FieldWhitelist, Usage};

/// A free-text search request.
///
/// ```
/// use listing_query::SearchSpec;
///
/// let search = SearchSpec::new("blue widget")
///     .fields(["name", "description"])
///     .max_results(50);
/// assert!(search.is_active());
/// assert!(!SearchSpec::new("   ").is_active());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchSpec {
    pub query: String,
    /// Fields to search. `None` falls back to the whitelist's defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    /// Keep at most this many of the most relevant records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
}

impl SearchSpec {
    pub fn new(query: impl Into<String>) -> Self {
        SearchSpec {
            query: query.into(),
            ..SearchSpec::default()
        }
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn max_results(mut self, cap: usize) -> Self {
        self.max_results = Some(cap);
        self
    }

    /// Returns `false` for an empty or whitespace-only query.
    pub fn is_active(&self) -> bool {
        !self.query.trim().is_empty()
    }

    /// Validates the searched fields and prepares the scorer.
    pub fn compile<W>(&self, whitelist: &W, weights: &ScoringWeights) -> Result<Scorer>
    where
        W: FieldWhitelist + ?Sized,
    {
        let names = match &self.fields {
            Some(fields) => fields.clone(),
            None => whitelist.search_fields(),
        };

        let mut fields = Vec::with_capacity(names.len());
        for name in &names {
            let path = FieldPath::parse(name, Usage::Search)?;
            if !whitelist.allows(Usage::Search, path.as_str()) {
                return Err(QueryError::invalid_field(name, Usage::Search));
            }
            fields.push(path);
        }

        let phrase = fold_case(self.query.trim());
        let tokens = tokenize(&phrase);
        let pattern = highlight_pattern(&phrase, &tokens);

        Ok(Scorer {
            phrase,
            tokens,
            fields,
            pattern,
            weights: weights.clone(),
            cap: self.max_results,
        })
    }
}

/// A matched span inside one field's value.
///
/// `start` and `end` are byte offsets into the field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub field: String,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Relevance of one record for the current query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub score: f64,
    pub highlights: Vec<Highlight>,
}

/// A record paired with its search result as it moves through the pipeline.
#[derive(Debug)]
pub struct Hit<'a, T> {
    pub record: &'a T,
    pub result: SearchResult,
}

impl<'a, T> Hit<'a, T> {
    /// A hit that was not scored (no search, or an empty query).
    pub fn unscored(record: &'a T) -> Self {
        Hit {
            record,
            result: SearchResult::default(),
        }
    }
}

/// Lowercased, deduplicated query tokens in query order.
fn tokenize(query: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// Lowercases one character at a time.
///
/// Unlike `str::to_lowercase` there are no context rules (final sigma), so a
/// folded substring always lines up with whole characters of the source.
fn fold_case(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// A field value folded with [`fold_case`], remembering for every folded
/// byte the source character it came from.
struct Folded<'t> {
    source: &'t str,
    text: String,
    origin: Vec<(usize, usize)>,
}

impl<'t> Folded<'t> {
    fn new(source: &'t str) -> Self {
        let mut text = String::with_capacity(source.len());
        let mut origin = Vec::with_capacity(source.len());
        for (start, ch) in source.char_indices() {
            let span = (start, start + ch.len_utf8());
            for lower in ch.to_lowercase() {
                text.push(lower);
                origin.extend(std::iter::repeat(span).take(lower.len_utf8()));
            }
        }
        Folded {
            source,
            text,
            origin,
        }
    }

    /// Maps a non-empty byte range of the folded text to the smallest range
    /// of whole source characters covering it.
    fn source_span(&self, start: usize, end: usize) -> (usize, usize) {
        (self.origin[start].0, self.origin[end - 1].1)
    }
}

/// Alternation of the folded phrase and tokens, longest first so the widest
/// match wins at each position.
fn highlight_pattern(phrase: &str, tokens: &[String]) -> Option<Regex> {
    let mut needles: Vec<&str> = tokens.iter().map(String::as_str).collect();
    if !phrase.is_empty() && !needles.contains(&phrase) {
        needles.push(phrase);
    }
    if needles.is_empty() {
        return None;
    }
    needles.sort_by_key(|n| std::cmp::Reverse(n.len()));

    let alternation = needles
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&alternation).ok()
}

/// Scores records against a compiled query.
#[derive(Debug, Clone)]
pub struct Scorer {
    phrase: String,
    tokens: Vec<String>,
    fields: Vec<FieldPath>,
    pattern: Option<Regex>,
    weights: ScoringWeights,
    cap: Option<usize>,
}

impl Scorer {
    /// Returns `false` when the query is empty and scoring is a no-op.
    pub fn is_active(&self) -> bool {
        !self.tokens.is_empty() || !self.phrase.is_empty()
    }

    /// Scores one record over every searchable field.
    pub fn score<T, R>(&self, record: &T, resolver: &R) -> SearchResult
    where
        T: ?Sized,
        R: FieldResolver<T> + ?Sized,
    {
        let mut result = SearchResult::default();
        if !self.is_active() {
            return result;
        }

        for path in &self.fields {
            let Value::String(text) = resolver.resolve(record, path) else {
                continue;
            };
            let folded = Folded::new(text);
            let contribution = self.score_text(&folded.text);
            if contribution > 0.0 {
                result.score += contribution;
                self.highlight(path, &folded, &mut result.highlights);
            }
        }
        result
    }

    /// Scores already folded text.
    fn score_text(&self, lower: &str) -> f64 {
        let w = &self.weights;
        let mut score = 0.0;

        if lower == self.phrase {
            score += w.exact_field;
        } else if lower.contains(&self.phrase) {
            score += w.phrase;
        }

        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .collect();
        for token in &self.tokens {
            if words.iter().any(|word| word == token) {
                score += w.token_exact;
            } else if words.iter().any(|word| word.starts_with(token.as_str())) {
                score += w.token_prefix;
            } else if lower.contains(token.as_str()) {
                score += w.token_partial;
            }
        }
        score
    }

    /// Marks matches in the folded text, mapped back onto the source.
    ///
    /// Matches that fold into the same source character merge into one span.
    fn highlight(&self, path: &FieldPath, folded: &Folded<'_>, out: &mut Vec<Highlight>) {
        let Some(pattern) = &self.pattern else {
            return;
        };
        let mut spans: Vec<(usize, usize)> = Vec::new();
        for m in pattern.find_iter(&folded.text) {
            if m.start() == m.end() {
                continue;
            }
            let (start, end) = folded.source_span(m.start(), m.end());
            match spans.last_mut() {
                Some(last) if start < last.1 => last.1 = last.1.max(end),
                _ => spans.push((start, end)),
            }
        }
        out.extend(spans.into_iter().map(|(start, end)| Highlight {
            field: path.to_string(),
            start,
            end,
            text: folded.source[start..end].to_string(),
        }));
    }

    /// Scores every record, drops zero scores and applies the result cap.
    ///
    /// Input order is preserved. An inactive scorer passes every record
    /// through with score 0.
    pub fn apply<'a, T, R>(&self, records: Vec<&'a T>, resolver: &R) -> Vec<Hit<'a, T>>
    where
        R: FieldResolver<T> + ?Sized,
    {
        if !self.is_active() {
            return records.into_iter().map(Hit::unscored).collect();
        }

        let hits: Vec<Hit<'a, T>> = records
            .into_iter()
            .map(|record| Hit {
                record,
                result: self.score(record, resolver),
            })
            .filter(|hit| hit.result.score > 0.0)
            .collect();

        match self.cap {
            Some(cap) if hits.len() > cap => {
                trace!(matched = hits.len(), cap, "search results capped");
                keep_most_relevant(hits, cap)
            }
            _ => hits,
        }
    }
}

/// Keeps the `cap` highest-scoring hits, ties broken by input order, and
/// returns them in input order.
fn keep_most_relevant<T>(hits: Vec<Hit<'_, T>>, cap: usize) -> Vec<Hit<'_, T>> {
    let mut ranked: Vec<usize> = (0..hits.len()).collect();
    ranked.sort_by(|&a, &b| hits[b].result.score.total_cmp(&hits[a].result.score));

    let mut keep = vec![false; hits.len()];
    for index in ranked.into_iter().take(cap) {
        keep[index] = true;
    }

    hits.into_iter()
        .zip(keep)
        .filter_map(|(hit, kept)| kept.then_some(hit))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::whitelist::FieldSet;

    fn accessor<'a>(item: &'a (&'static str, &'static str), field: &str) -> Value<'a> {
        match field {
            "name" => Value::String(item.0),
            "notes" => Value::String(item.1),
            _ => Value::Null,
        }
    }

    fn scorer(search: SearchSpec) -> Scorer {
        let fields = FieldSet::new(["name", "notes"]).search_default(["name"]);
        search
            .compile(&fields, &ScoringWeights::default())
            .unwrap()
    }

    #[test]
    fn tokenize_lowercases_and_dedupes() {
        assert_eq!(tokenize("blue widget, blue-ish"), ["blue", "widget", "ish"]);
        assert!(tokenize("  ").is_empty());
    }

    #[test]
    fn prefix_match_scores_and_highlights() {
        let s = scorer(SearchSpec::new("wid"));
        let result = s.score(&("Widget", ""), &accessor);
        assert!(result.score > 0.0);
        assert_eq!(
            result.highlights,
            vec![Highlight {
                field: "name".into(),
                start: 0,
                end: 3,
                text: "Wid".into(),
            }]
        );
    }

    #[test]
    fn expanding_lowercase_still_highlights_source_character() {
        // 'İ' lowercases to "i\u{307}", two characters in three bytes.
        let s = scorer(SearchSpec::new("i"));
        let result = s.score(&("İstanbul", ""), &accessor);
        assert!(result.score > 0.0);
        assert_eq!(
            result.highlights,
            vec![Highlight {
                field: "name".into(),
                start: 0,
                end: 2,
                text: "İ".into(),
            }]
        );
    }

    #[test]
    fn non_ascii_highlights_use_source_byte_offsets() {
        let s = scorer(SearchSpec::new("köln"));
        let result = s.score(&("Straße KÖLN", ""), &accessor);
        assert!(result.score > 0.0);
        let spans: Vec<_> = result
            .highlights
            .iter()
            .map(|h| (h.start, h.end, h.text.as_str()))
            .collect();
        assert_eq!(spans, [(8, 13, "KÖLN")]);
    }

    #[test]
    fn every_scoring_field_has_a_highlight() {
        let s = scorer(SearchSpec::new("ǅ σοφ ﬀ"));
        for name in ["ǄEMAL", "ΣΟΦΙΑ", "İİ", "Ωmega", "ǆungla"] {
            let result = s.score(&(name, ""), &accessor);
            assert_eq!(result.score > 0.0, !result.highlights.is_empty(), "{name}");
            for h in &result.highlights {
                assert_eq!(&name[h.start..h.end], h.text);
            }
        }
    }

    #[test]
    fn exact_field_outranks_partial() {
        let s = scorer(SearchSpec::new("widget"));
        let exact = s.score(&("Widget", ""), &accessor).score;
        let partial = s.score(&("Blue widget stand", ""), &accessor).score;
        let none = s.score(&("Gadget", ""), &accessor).score;
        assert!(exact > partial);
        assert!(partial > 0.0);
        assert_eq!(none, 0.0);
    }

    #[test]
    fn scores_sum_across_fields() {
        let s = scorer(SearchSpec::new("oak").fields(["name", "notes"]));
        let one = s.score(&("Oak table", "pine legs"), &accessor);
        let two = s.score(&("Oak table", "oak legs"), &accessor);
        assert!(two.score > one.score);
        assert_eq!(two.highlights.len(), 2);
        assert_eq!(two.highlights[1].field, "notes");
    }

    #[test]
    fn multiple_tokens_highlight_longest_match() {
        let s = scorer(SearchSpec::new("red red-oak"));
        let result = s.score(&("Red oak chair", ""), &accessor);
        let spans: Vec<_> = result
            .highlights
            .iter()
            .map(|h| (h.start, h.end))
            .collect();
        assert_eq!(spans, [(0, 3), (4, 7)]);
    }

    #[test]
    fn apply_drops_zero_scores() {
        let items = [("Widget", ""), ("Gadget", ""), ("widgets", "")];
        let s = scorer(SearchSpec::new("widget"));
        let hits = s.apply(items.iter().collect(), &accessor);
        let names: Vec<_> = hits.iter().map(|h| h.record.0).collect();
        assert_eq!(names, ["Widget", "widgets"]);
        assert!(hits.iter().all(|h| h.result.score > 0.0));
    }

    #[test]
    fn cap_keeps_most_relevant_in_input_order() {
        let items = [("blue widget", ""), ("widget", ""), ("widgets", "")];
        let s = scorer(SearchSpec::new("widget").max_results(2));
        let hits = s.apply(items.iter().collect(), &accessor);
        let names: Vec<_> = hits.iter().map(|h| h.record.0).collect();
        assert_eq!(names, ["blue widget", "widget"]);
    }

    #[test]
    fn empty_query_passes_everything() {
        let items = [("a", ""), ("b", "")];
        let s = scorer(SearchSpec::new(""));
        assert!(!s.is_active());
        let hits = s.apply(items.iter().collect(), &accessor);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.result.score == 0.0));
    }

    #[test]
    fn unknown_search_field_rejected() {
        let fields = FieldSet::new(["name"]);
        let err = SearchSpec::new("x")
            .fields(["secret"])
            .compile(&fields, &ScoringWeights::default())
            .unwrap_err();
        assert_eq!(err, QueryError::invalid_field("secret", Usage::Search));
    }
}
