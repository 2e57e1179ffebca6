//! Typo-tolerant session search for the sidebar.
//!
//! Each entry is indexed on its agent name, preview text, message contents,
//! model name and personality. A field matches when some substring of it is
//! within `THRESHOLD * query_len` edits of the query (match position is
//! ignored). Entries are ranked by the product of their matched field scores,
//! lower first, and ties keep the input (recency) order.
//!
//! Only the first `MAX_PATTERN_CHARS` characters of a query are matched.
//!
//! The index borrows the log list and must be rebuilt when it changes.

use crate::logs::LogEntry;

/// Maximum normalized edit distance for a field to count as a match
const THRESHOLD: f64 = 0.3;
/// Stand-in for a perfect score so products still rank multi-field hits
const EPSILON: f64 = 1e-10;
/// Longer queries are truncated to this many characters
pub const MAX_PATTERN_CHARS: usize = 32;

/// Lower-cased searchable text of one entry; each field holds one or more values
struct IndexedDoc {
    fields: Vec<Vec<Vec<char>>>,
}

/// A ranked search result
#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    pub entry: &'a LogEntry,
    /// 0.0 is a perfect match
    pub score: f64,
}

pub struct SessionIndex<'a> {
    entries: &'a [LogEntry],
    docs: Vec<IndexedDoc>,
}

impl<'a> SessionIndex<'a> {
    pub fn new(entries: &'a [LogEntry]) -> Self {
        let docs = entries.iter().map(index_entry).collect();
        Self { entries, docs }
    }

    /// Matching entries, best first. An empty query returns everything in
    /// input order.
    pub fn search(&self, query: &str) -> Vec<&'a LogEntry> {
        let query = query.trim();
        if query.is_empty() {
            return self.entries.iter().collect();
        }
        self.ranked(query).into_iter().map(|hit| hit.entry).collect()
    }

    /// Matching entries with their scores; an empty query matches nothing.
    pub fn ranked(&self, query: &str) -> Vec<SearchHit<'a>> {
        let pattern: Vec<char> = query
            .trim()
            .to_lowercase()
            .chars()
            .take(MAX_PATTERN_CHARS)
            .collect();
        if pattern.is_empty() {
            return Vec::new();
        }
        let max_edits = max_edits(pattern.len());

        let mut hits: Vec<SearchHit<'a>> = self
            .entries
            .iter()
            .zip(&self.docs)
            .filter_map(|(entry, doc)| {
                score_doc(&pattern, max_edits, doc).map(|score| SearchHit { entry, score })
            })
            .collect();

        // Stable: equal scores stay in recency order
        hits.sort_by(|a, b| a.score.total_cmp(&b.score));
        hits
    }
}

fn index_entry(entry: &LogEntry) -> IndexedDoc {
    fn chars(s: &str) -> Vec<char> {
        s.to_lowercase().chars().collect()
    }

    let mut fields = vec![vec![chars(&entry.agent_name)]];
    if let Some(preview) = &entry.preview_text {
        fields.push(vec![chars(preview)]);
    }
    let contents: Vec<Vec<char>> = entry
        .messages
        .iter()
        .filter_map(|m| m.content.as_deref())
        .map(chars)
        .collect();
    if !contents.is_empty() {
        fields.push(contents);
    }
    fields.push(vec![chars(&entry.model_name)]);
    if let Some(personality) = &entry.personality {
        fields.push(vec![chars(personality)]);
    }

    IndexedDoc { fields }
}

/// Largest edit count whose normalized distance is within `THRESHOLD`
fn max_edits(pattern_len: usize) -> usize {
    (0..=pattern_len)
        .take_while(|&d| d as f64 / pattern_len as f64 <= THRESHOLD)
        .last()
        .unwrap_or(0)
}

/// Combined score of a document, `None` when no field matches.
fn score_doc(pattern: &[char], max_edits: usize, doc: &IndexedDoc) -> Option<f64> {
    let mut total: Option<f64> = None;

    for values in &doc.fields {
        let best = values
            .iter()
            .filter_map(|v| best_substring_distance(pattern, v, max_edits))
            .min();
        if let Some(edits) = best {
            let score = (edits as f64 / pattern.len() as f64).max(EPSILON);
            total = Some(total.unwrap_or(1.0) * score);
        }
    }

    total
}

/// Minimum edit distance between `pattern` and any substring of `text`, or
/// `None` when every substring needs more than `max` edits.
///
/// One-column DP with a free starting position in `text`. Rows already above
/// `max` are not extended (Ukkonen's cut-off), so a column costs `O(max)`.
fn best_substring_distance(pattern: &[char], text: &[char], max: usize) -> Option<usize> {
    let m = pattern.len();
    let cap = max.saturating_add(1);
    let mut col: Vec<usize> = (0..=m).map(|i| i.min(cap)).collect();
    // Deepest row whose cost is within `max`
    let mut last = max.min(m);
    let mut best = col[m];

    for &tc in text {
        let end = (last + 1).min(m);
        let mut diag = col[0];
        col[0] = 0;
        for i in 1..=end {
            let up = col[i];
            let cost = usize::from(pattern[i - 1] != tc);
            col[i] = (diag + cost).min(up + 1).min(col[i - 1] + 1).min(cap);
            diag = up;
        }

        last = end;
        while last > 0 && col[last] > max {
            last -= 1;
        }

        if end == m {
            best = best.min(col[m]);
            if best == 0 {
                break;
            }
        }
    }

    (best <= max).then_some(best)
}
