//! Three-way hybrid search
//!
//! Fuses BM25 keyword hits with two independent vector channels (cross-modal
//! image-text similarity and pure text-embedding similarity). Each channel is
//! min-max normalized on its own, then merged with availability- and
//! query-aware linear weights. The engine does no neural work; the caller
//! supplies the vector hit lists.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::Result;
use crate::global_db::{ClipResultData, GlobalDb};
use crate::model::{ClipFilters, ClipId, SortBy};
use crate::query::ParsedQuery;

/// Candidate pool fetched from FTS before fusion
const FTS_CANDIDATES: usize = 200;

/// Rank discount for hits contributed only by the expanded query variant
const EXPANDED_QUERY_WEIGHT: f64 = 0.8;

/// Linear fusion weights `(clip, fts, text)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchWeights {
    pub clip: f64,
    pub fts: f64,
    pub text: f64,
}

impl SearchWeights {
    pub const FTS_ONLY: SearchWeights = SearchWeights {
        clip: 0.0,
        fts: 1.0,
        text: 0.0,
    };
    pub const CLIP_ONLY: SearchWeights = SearchWeights {
        clip: 1.0,
        fts: 0.0,
        text: 0.0,
    };
    pub const TEXT_ONLY: SearchWeights = SearchWeights {
        clip: 0.0,
        fts: 0.0,
        text: 1.0,
    };
}

/// How the caller wants channels combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Adaptive weights from availability and query shape
    #[default]
    Auto,
    Hybrid,
    Fts,
    Vector,
}

/// One ranked hit
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub clip_id: ClipId,
    pub score: f64,
    pub data: ClipResultData,
}

/// Everything one search call needs
pub struct SearchRequest<'a> {
    pub parsed: &'a ParsedQuery,
    /// Translated/expanded FTS variant, ranked at a discount when present
    pub expanded_query: Option<&'a str>,
    pub clip_vec_hits: Option<Vec<(ClipId, f32)>>,
    pub text_vec_hits: Option<Vec<(ClipId, f32)>>,
    pub weights: SearchWeights,
    pub folder_filter: Option<HashSet<String>>,
    pub path_prefix: Option<String>,
    pub limit: usize,
}

/// Run the three-way fusion against the global DB
pub fn search(db: &GlobalDb, request: &SearchRequest) -> Result<Vec<SearchResult>> {
    let clip_scores: HashMap<ClipId, f64> = request
        .clip_vec_hits
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|&(id, sim)| (id, f64::from(sim)))
        .collect();
    let text_scores: HashMap<ClipId, f64> = request
        .text_vec_hits
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|&(id, sim)| (id, f64::from(sim)))
        .collect();

    let mut fts_scores: HashMap<ClipId, f64> = HashMap::new();
    if let Some(fts_query) = request.parsed.fts_query() {
        for (id, rank) in db.fts_search(fts_query, FTS_CANDIDATES)? {
            fts_scores.insert(id, rank);
        }
        if let Some(expanded) = request.expanded_query {
            for (id, rank) in db.fts_search(expanded, FTS_CANDIDATES)? {
                // Only fills gaps the primary pass missed, at a discount
                fts_scores
                    .entry(id)
                    .or_insert(rank * EXPANDED_QUERY_WEIGHT);
            }
        }
    }

    // Empty query with no vector input is an empty result, not an error
    if clip_scores.is_empty() && text_scores.is_empty() && fts_scores.is_empty() {
        return Ok(Vec::new());
    }

    let mut all_ids: Vec<ClipId> = clip_scores
        .keys()
        .chain(text_scores.keys())
        .chain(fts_scores.keys())
        .copied()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    all_ids.sort_unstable();

    let result_data = db.hydrate_clips(
        &all_ids,
        request.folder_filter.as_ref(),
        request.path_prefix.as_deref(),
    )?;

    let ranked = fuse_channels(
        &clip_scores,
        &fts_scores,
        &text_scores,
        request.weights,
    );

    let negatives: Vec<String> = request
        .parsed
        .negative_terms
        .iter()
        .map(|t| t.to_lowercase())
        .collect();

    let mut results = Vec::new();
    for (clip_id, score) in ranked {
        let Some(data) = result_data.get(&clip_id) else {
            continue;
        };
        if !negatives.is_empty() && matches_negative(data, &negatives) {
            continue;
        }
        results.push(SearchResult {
            clip_id,
            score,
            data: data.clone(),
        });
        if results.len() >= request.limit {
            break;
        }
    }

    debug!(
        "search '{}' -> {} results ({} candidates)",
        request.parsed.raw_query,
        results.len(),
        all_ids.len()
    );
    Ok(results)
}

/// Image-as-query entry point: no text channels, CLIP weights only
pub fn image_search(
    db: &GlobalDb,
    clip_vec_hits: Vec<(ClipId, f32)>,
    folder_filter: Option<HashSet<String>>,
    path_prefix: Option<String>,
    limit: usize,
) -> Result<Vec<SearchResult>> {
    let empty = crate::query::parse_query("");
    search(
        db,
        &SearchRequest {
            parsed: &empty,
            expanded_query: None,
            clip_vec_hits: Some(clip_vec_hits),
            text_vec_hits: None,
            weights: SearchWeights::CLIP_ONLY,
            folder_filter,
            path_prefix,
            limit,
        },
    )
}

/// Normalize each channel, merge linearly, order deterministically
///
/// Vector channels carry similarities (bigger is better); the FTS channel
/// carries BM25 ranks (negative, smaller is better) and is negated before
/// normalization. Single-entry channels normalize to 1.0, never 0.0.
pub fn fuse_channels(
    clip_scores: &HashMap<ClipId, f64>,
    fts_scores: &HashMap<ClipId, f64>,
    text_scores: &HashMap<ClipId, f64>,
    weights: SearchWeights,
) -> Vec<(ClipId, f64)> {
    let n_clip = min_max_normalize(clip_scores, false);
    let n_fts = min_max_normalize(fts_scores, true);
    let n_text = min_max_normalize(text_scores, false);

    let ids: HashSet<ClipId> = clip_scores
        .keys()
        .chain(fts_scores.keys())
        .chain(text_scores.keys())
        .copied()
        .collect();

    let mut fused: Vec<(ClipId, f64)> = ids
        .into_iter()
        .map(|id| {
            let score = weights.clip * n_clip.get(&id).copied().unwrap_or(0.0)
                + weights.fts * n_fts.get(&id).copied().unwrap_or(0.0)
                + weights.text * n_text.get(&id).copied().unwrap_or(0.0);
            (id, score)
        })
        .collect();

    fused.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    fused
}

/// Min-max to [0,1]; `negate` first for smaller-is-better inputs
fn min_max_normalize(scores: &HashMap<ClipId, f64>, negate: bool) -> HashMap<ClipId, f64> {
    if scores.is_empty() {
        return HashMap::new();
    }
    let values: Vec<f64> = scores
        .values()
        .map(|&v| if negate { -v } else { v })
        .collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    scores
        .iter()
        .map(|(&id, &v)| {
            let v = if negate { -v } else { v };
            // A single hit (or all-equal hits) is a full-strength signal
            let n = if range <= f64::EPSILON {
                1.0
            } else {
                (v - min) / range
            };
            (id, n)
        })
        .collect()
}

fn matches_negative(data: &ClipResultData, negatives: &[String]) -> bool {
    let haystack = format!(
        "{} {} {} {} {}",
        data.scene, data.description, data.transcript, data.tags, data.file_name
    )
    .to_lowercase();
    negatives.iter().any(|term| haystack.contains(term))
}

// ---------------------------------------------------------------- weighting

/// Latin queries read "long" past 10 chars; CJK past 5
fn is_long_query(text: &str) -> bool {
    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    let threshold = if chars.iter().any(|&c| is_cjk(c)) { 5 } else { 10 };
    chars.len() > threshold
}

pub(crate) fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'      // CJK unified
        | '\u{3400}'..='\u{4DBF}'    // CJK extension A
        | '\u{3040}'..='\u{30FF}'    // hiragana + katakana
        | '\u{AC00}'..='\u{D7AF}'    // hangul syllables
    )
}

/// Availability- and query-aware weight table for auto/hybrid mode
pub fn adaptive_weights(has_clip: bool, has_text: bool, parsed: &ParsedQuery) -> SearchWeights {
    let is_quoted = parsed.has_quoted_phrase;
    let is_long = is_long_query(&parsed.positive_text);

    let (clip, fts, text) = match (has_clip, has_text, is_quoted, is_long) {
        (true, true, true, _) => (0.1, 0.8, 0.1),
        (true, true, false, true) => (0.6, 0.1, 0.3),
        (true, true, false, false) => (0.5, 0.2, 0.3),
        (false, true, true, _) => (0.0, 0.8, 0.2),
        (false, true, false, true) => (0.0, 0.2, 0.8),
        (false, true, false, false) => (0.0, 0.4, 0.6),
        (true, false, true, _) => (0.1, 0.9, 0.0),
        (true, false, false, true) => (0.8, 0.2, 0.0),
        (true, false, false, false) => (0.7, 0.3, 0.0),
        (false, false, _, _) => (0.0, 1.0, 0.0),
    };
    SearchWeights { clip, fts, text }
}

/// Resolve the weights an explicit mode forces, or fall back to the table
pub fn weights_for_mode(
    mode: SearchMode,
    has_clip: bool,
    has_text: bool,
    parsed: &ParsedQuery,
) -> SearchWeights {
    match mode {
        SearchMode::Fts => SearchWeights::FTS_ONLY,
        SearchMode::Vector => {
            if has_clip {
                SearchWeights::CLIP_ONLY
            } else if has_text {
                SearchWeights::TEXT_ONLY
            } else {
                SearchWeights::FTS_ONLY
            }
        }
        SearchMode::Auto | SearchMode::Hybrid => adaptive_weights(has_clip, has_text, parsed),
    }
}

// ----------------------------------------------------------- search surface

/// Options for the high-level search surface
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub limit: usize,
    pub offset: usize,
    pub folder: Option<String>,
    pub path_prefix: Option<String>,
    pub filters: ClipFilters,
    pub sort_by: SortBy,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::Auto,
            limit: 20,
            offset: 0,
            folder: None,
            path_prefix: None,
            filters: ClipFilters::default(),
            sort_by: SortBy::Relevance,
        }
    }
}

/// Parse, weigh, fuse, filter, sort, paginate, and log one query
///
/// The binding target for drivers: vector hits come from whatever indices
/// the caller maintains; this function owns everything after that.
pub fn run_search(
    db: &GlobalDb,
    raw_query: &str,
    clip_vec_hits: Option<Vec<(ClipId, f32)>>,
    text_vec_hits: Option<Vec<(ClipId, f32)>>,
    expanded_query: Option<&str>,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>> {
    let parsed = crate::query::parse_query(raw_query);
    let has_clip = clip_vec_hits.as_deref().is_some_and(|h| !h.is_empty());
    let has_text = text_vec_hits.as_deref().is_some_and(|h| !h.is_empty());
    let weights = weights_for_mode(options.mode, has_clip, has_text, &parsed);

    let folder_filter = options
        .folder
        .as_ref()
        .map(|f| std::iter::once(f.clone()).collect());

    // Fetch past the window so offset and post-filters still fill the page
    let fetch = (options.limit.max(1) + options.offset) * 4;
    let mut results = search(
        db,
        &SearchRequest {
            parsed: &parsed,
            expanded_query,
            clip_vec_hits,
            text_vec_hits,
            weights,
            folder_filter,
            path_prefix: options.path_prefix.clone(),
            limit: fetch,
        },
    )?;

    results.retain(|r| passes_filters(&r.data, &options.filters));
    match options.sort_by {
        SortBy::Relevance => {}
        SortBy::Date => results.sort_by(|a, b| {
            b.data
                .created_at
                .cmp(&a.data.created_at)
                .then(a.clip_id.cmp(&b.clip_id))
        }),
        SortBy::Duration => results.sort_by(|a, b| {
            let da = a.data.end_secs - a.data.start_secs;
            let db_ = b.data.end_secs - b.data.start_secs;
            db_.partial_cmp(&da)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.clip_id.cmp(&b.clip_id))
        }),
        SortBy::Rating => results.sort_by(|a, b| {
            b.data
                .rating
                .cmp(&a.data.rating)
                .then(a.clip_id.cmp(&b.clip_id))
        }),
    }

    let page: Vec<SearchResult> = results
        .into_iter()
        .skip(options.offset)
        .take(options.limit.max(1))
        .collect();

    if !raw_query.trim().is_empty() {
        db.add_search_history(raw_query, page.len() as i64)?;
    }
    Ok(page)
}

fn passes_filters(data: &ClipResultData, filters: &ClipFilters) -> bool {
    if let Some(min) = filters.min_rating {
        if data.rating < min {
            return false;
        }
    }
    if !filters.color_labels.is_empty()
        && !data
            .color_label
            .is_some_and(|l| filters.color_labels.contains(&l))
    {
        return false;
    }
    if !filters.shot_types.is_empty() && !filters.shot_types.contains(&data.shot_type) {
        return false;
    }
    if !filters.moods.is_empty() && !filters.moods.contains(&data.mood) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_query;

    #[test]
    fn test_fusion_reference_ordering() {
        // weights (0.5, 0.2, 0.3); FTS {c1:-2, c2:-1}; clip {c2:.9, c3:.8};
        // text {c1:.6, c3:.7} -> c2 (0.5), c3 (0.3), c1 (0.2)
        let fts: HashMap<ClipId, f64> = [(1, -2.0), (2, -1.0)].into();
        let clip: HashMap<ClipId, f64> = [(2, 0.9), (3, 0.8)].into();
        let text: HashMap<ClipId, f64> = [(1, 0.6), (3, 0.7)].into();

        let fused = fuse_channels(
            &clip,
            &fts,
            &text,
            SearchWeights {
                clip: 0.5,
                fts: 0.2,
                text: 0.3,
            },
        );

        let order: Vec<ClipId> = fused.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert!((fused[0].1 - 0.5).abs() < 1e-9);
        assert!((fused[1].1 - 0.3).abs() < 1e-9);
        assert!((fused[2].1 - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_single_hit_channel_normalizes_to_one() {
        let clip: HashMap<ClipId, f64> = [(7, 0.42)].into();
        let empty = HashMap::new();
        let fused = fuse_channels(&clip, &empty, &empty, SearchWeights::CLIP_ONLY);
        assert_eq!(fused, vec![(7, 1.0)]);
    }

    #[test]
    fn test_ties_break_on_clip_id() {
        let clip: HashMap<ClipId, f64> = [(9, 0.5), (3, 0.5)].into();
        let empty = HashMap::new();
        let fused = fuse_channels(&clip, &empty, &empty, SearchWeights::CLIP_ONLY);
        assert_eq!(fused[0].0, 3);
        assert_eq!(fused[1].0, 9);
    }

    #[test]
    fn test_is_long_query_latin_vs_cjk() {
        assert!(!is_long_query("sunset"));
        assert!(is_long_query("sunset over the bay"));
        assert!(!is_long_query("日落"));
        assert!(is_long_query("日落时分的海湾风景"));
    }

    #[test]
    fn test_adaptive_weight_table() {
        let plain = parse_query("cat");
        let quoted = parse_query("\"cat\"");
        let long = parse_query("a cat sleeping on a warm radiator");

        assert_eq!(
            adaptive_weights(true, true, &quoted),
            SearchWeights { clip: 0.1, fts: 0.8, text: 0.1 }
        );
        assert_eq!(
            adaptive_weights(true, true, &long),
            SearchWeights { clip: 0.6, fts: 0.1, text: 0.3 }
        );
        assert_eq!(
            adaptive_weights(true, true, &plain),
            SearchWeights { clip: 0.5, fts: 0.2, text: 0.3 }
        );
        assert_eq!(
            adaptive_weights(false, true, &long),
            SearchWeights { clip: 0.0, fts: 0.2, text: 0.8 }
        );
        assert_eq!(
            adaptive_weights(false, true, &plain),
            SearchWeights { clip: 0.0, fts: 0.4, text: 0.6 }
        );
        assert_eq!(
            adaptive_weights(true, false, &quoted),
            SearchWeights { clip: 0.1, fts: 0.9, text: 0.0 }
        );
        assert_eq!(
            adaptive_weights(true, false, &long),
            SearchWeights { clip: 0.8, fts: 0.2, text: 0.0 }
        );
        assert_eq!(
            adaptive_weights(true, false, &plain),
            SearchWeights { clip: 0.7, fts: 0.3, text: 0.0 }
        );
        assert_eq!(adaptive_weights(false, false, &plain), SearchWeights::FTS_ONLY);
    }

    #[test]
    fn test_mode_overrides() {
        let parsed = parse_query("anything");
        assert_eq!(
            weights_for_mode(SearchMode::Fts, true, true, &parsed),
            SearchWeights::FTS_ONLY
        );
        assert_eq!(
            weights_for_mode(SearchMode::Vector, true, true, &parsed),
            SearchWeights::CLIP_ONLY
        );
        assert_eq!(
            weights_for_mode(SearchMode::Vector, false, true, &parsed),
            SearchWeights::TEXT_ONLY
        );
        assert_eq!(
            weights_for_mode(SearchMode::Vector, false, false, &parsed),
            SearchWeights::FTS_ONLY
        );
    }

    #[test]
    fn test_empty_query_no_vectors_is_empty_result() {
        let db = GlobalDb::in_memory().unwrap();
        let parsed = parse_query("");
        let results = search(
            &db,
            &SearchRequest {
                parsed: &parsed,
                expanded_query: None,
                clip_vec_hits: None,
                text_vec_hits: None,
                weights: SearchWeights::FTS_ONLY,
                folder_filter: None,
                path_prefix: None,
                limit: 10,
            },
        )
        .unwrap();
        assert!(results.is_empty());
    }
}
