//! Fuzzy search over manifest entries.
//!
//! A query matches an entry when its characters appear, in order, in the
//! entry's search text (`id`, description, tags). Matches are ranked in
//! three tiers so that ranking stays predictable:
//!
//! 1. contiguous substring matches,
//! 2. scattered matches that start at a word boundary,
//! 3. any other scattered match.
//!
//! Within a tier, contiguous runs earn a bonus and every skipped character
//! costs a penalty; matches starting inside the `id` rank higher than
//! matches found only in the description or tags.

use tracing::debug;

use crate::models::{Category, Manifest, SkillEntry};

/// Score distance between tiers. Within-tier scores are clamped below it,
/// so a higher tier always outranks a lower one.
const TIER_SPAN: i64 = 100_000;
const TIER_BASE: i64 = TIER_SPAN / 2;

const RUN_BONUS: i64 = 16;
const GAP_PENALTY: i64 = 1;
const WORD_START_BONUS: i64 = 24;
const IN_ID_BONUS: i64 = 32;
const LEADING_BONUS: i64 = 64;
const EXACT_ID_BONUS: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchTier {
    Scattered = 0,
    WordStart = 1,
    Substring = 2,
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit<'a> {
    pub entry: &'a SkillEntry,
    /// Relevance; higher is better. Zero for unranked listings.
    pub score: i64,
}

/// Filter by `category`, then rank by `query`.
///
/// Without a query (or with a blank one) the filtered entries come back in
/// manifest order. With a query, entries that do not contain it as a
/// subsequence are dropped and the rest are ordered by score descending,
/// ties broken by `id` ascending.
pub fn search<'a>(
    manifest: &'a Manifest,
    query: Option<&str>,
    category: Option<Category>,
) -> Vec<SearchHit<'a>> {
    let candidates = manifest
        .skills
        .iter()
        .filter(|s| category.map_or(true, |c| s.category == c));

    let query = query.map(str::trim).filter(|q| !q.is_empty());
    let Some(query) = query else {
        return candidates
            .map(|entry| SearchHit { entry, score: 0 })
            .collect();
    };

    let needle: Vec<char> = query.to_lowercase().chars().collect();
    let mut hits: Vec<SearchHit<'a>> = candidates
        .filter_map(|entry| score_entry(entry, &needle).map(|score| SearchHit { entry, score }))
        .collect();

    hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.entry.id.cmp(&b.entry.id)));

    debug!("Search '{}' matched {} skills", query, hits.len());
    hits
}

/// Up to `limit` ids that best match `query`, for "did you mean" hints.
pub fn suggestions(manifest: &Manifest, query: &str, limit: usize) -> Vec<String> {
    search(manifest, Some(query), None)
        .into_iter()
        .take(limit)
        .map(|hit| hit.entry.id.clone())
        .collect()
}

/// Score `query` against free text; `None` when it is not a subsequence.
pub fn fuzzy_score(text: &str, query: &str) -> Option<i64> {
    let hay: Vec<char> = text.to_lowercase().chars().collect();
    let needle: Vec<char> = query.trim().to_lowercase().chars().collect();
    if needle.is_empty() {
        return None;
    }
    best_alignment(&hay, &needle, 0).map(|(tier, within)| compose(tier, within))
}

fn score_entry(entry: &SkillEntry, needle: &[char]) -> Option<i64> {
    if needle.is_empty() {
        return None;
    }
    let hay: Vec<char> = entry.search_text().chars().collect();
    let id_len = entry.id.chars().count();

    let (tier, mut within) = best_alignment(&hay, needle, id_len)?;

    if needle.len() == id_len && hay[..id_len] == needle[..] {
        within += EXACT_ID_BONUS;
    }

    Some(compose(tier, within))
}

fn compose(tier: MatchTier, within: i64) -> i64 {
    tier as i64 * TIER_SPAN + within.clamp(0, TIER_SPAN - 1)
}

/// Try every position of the first query character and keep the best
/// greedy alignment, compared by tier first, then by within-tier score.
fn best_alignment(hay: &[char], needle: &[char], id_len: usize) -> Option<(MatchTier, i64)> {
    let first = needle[0];
    hay.iter()
        .enumerate()
        .filter(|(_, c)| **c == first)
        .filter_map(|(start, _)| align_from(hay, needle, start, id_len))
        .max()
}

fn align_from(
    hay: &[char],
    needle: &[char],
    start: usize,
    id_len: usize,
) -> Option<(MatchTier, i64)> {
    let mut score = TIER_BASE;
    let mut prev = start;
    let mut contiguous = true;

    for &c in &needle[1..] {
        let offset = hay[prev + 1..].iter().position(|h| *h == c)?;
        let pos = prev + 1 + offset;
        if offset == 0 {
            score += RUN_BONUS;
        } else {
            contiguous = false;
            score -= offset as i64 * GAP_PENALTY;
        }
        prev = pos;
    }

    let word_start = start == 0 || !hay[start - 1].is_alphanumeric();
    if word_start {
        score += WORD_START_BONUS;
    }
    if start < id_len {
        score += IN_ID_BONUS;
    }
    if start == 0 {
        score += LEADING_BONUS;
    }

    let tier = if contiguous {
        MatchTier::Substring
    } else if word_start {
        MatchTier::WordStart
    } else {
        MatchTier::Scattered
    };
    Some((tier, score))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(id: &str, category: Category, description: &str, tags: &[&str]) -> SkillEntry {
        SkillEntry {
            id: id.to_string(),
            name: None,
            category,
            subcategory: None,
            description: description.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            path: format!("{}/{}", category, id),
            files: vec![],
        }
    }

    fn fixture() -> Manifest {
        Manifest::new(vec![
            skill(
                "lamport-distributed-systems",
                Category::Languages,
                "Design distributed systems with logical clocks and formal reasoning",
                &["distributed", "consensus"],
            ),
            skill(
                "pike-simplicity",
                Category::Languages,
                "Write Go the way its authors intended",
                &["go", "concurrency"],
            ),
            skill(
                "google-sre",
                Category::Organizations,
                "Error budgets, SLOs, and toil reduction",
                &["reliability"],
            ),
            skill(
                "netflix-chaos",
                Category::Organizations,
                "Chaos experiments against production systems",
                &["resilience", "chaos"],
            ),
        ])
        .unwrap()
    }

    fn ids<'a>(hits: &[SearchHit<'a>]) -> Vec<&'a str> {
        hits.iter().map(|h| h.entry.id.as_str()).collect()
    }

    #[test]
    fn test_lamport_query_ranks_lamport_first() {
        let manifest = fixture();
        let hits = search(&manifest, Some("lamport"), None);
        assert_eq!(hits[0].entry.id, "lamport-distributed-systems");
        assert!(hits.iter().skip(1).all(|h| h.score < hits[0].score));
    }

    #[test]
    fn test_no_query_lists_in_manifest_order() {
        let manifest = fixture();
        let hits = search(&manifest, None, None);
        assert_eq!(
            ids(&hits),
            vec![
                "lamport-distributed-systems",
                "pike-simplicity",
                "google-sre",
                "netflix-chaos"
            ]
        );
        assert!(hits.iter().all(|h| h.score == 0));

        // A blank query behaves like no query.
        assert_eq!(ids(&search(&manifest, Some("   "), None)), ids(&hits));
    }

    #[test]
    fn test_category_filter_is_exact_and_ordered() {
        let manifest = fixture();
        let hits = search(&manifest, None, Some(Category::Organizations));
        assert_eq!(ids(&hits), vec!["google-sre", "netflix-chaos"]);

        let hits = search(&manifest, Some("systems"), Some(Category::Organizations));
        assert_eq!(ids(&hits), vec!["netflix-chaos"]);

        assert!(search(&manifest, None, Some(Category::Meta)).is_empty());
    }

    #[test]
    fn test_non_subsequence_is_excluded() {
        let manifest = fixture();
        assert!(search(&manifest, Some("kubernetes"), None).is_empty());
    }

    #[test]
    fn test_case_insensitive() {
        let manifest = fixture();
        let upper = search(&manifest, Some("CHAOS"), None);
        let lower = search(&manifest, Some("chaos"), None);
        assert_eq!(upper, lower);
        assert_eq!(upper[0].entry.id, "netflix-chaos");
    }

    #[test]
    fn test_substring_outranks_scattered() {
        let manifest = Manifest::new(vec![
            skill("aaa-scattered", Category::Meta, "s x y s x t e m", &[]),
            skill("zzz-contiguous", Category::Meta, "about systems", &[]),
        ])
        .unwrap();

        let hits = search(&manifest, Some("system"), None);
        assert_eq!(ids(&hits), vec!["zzz-contiguous", "aaa-scattered"]);
        assert!(hits[0].score >= TIER_SPAN * MatchTier::Substring as i64);
        assert!(hits[1].score < TIER_SPAN * MatchTier::Substring as i64);
    }

    #[test]
    fn test_every_substring_match_ranks_above_every_scattered_match() {
        let manifest = fixture();
        for query in ["dis", "sys", "go", "chaos", "dsys", "lmprt", "err"] {
            let hits = search(&manifest, Some(query), None);
            let lowest_substring = hits
                .iter()
                .filter(|h| h.entry.search_text().contains(query))
                .map(|h| h.score)
                .min();
            let highest_scattered = hits
                .iter()
                .filter(|h| !h.entry.search_text().contains(query))
                .map(|h| h.score)
                .max();
            if let (Some(low), Some(high)) = (lowest_substring, highest_scattered) {
                assert!(low >= high, "query '{query}': {low} < {high}");
            }
        }
    }

    #[test]
    fn test_word_start_outranks_mid_word_scatter() {
        let word_start = fuzzy_score("design systems", "dsy").unwrap();
        let mid_word = fuzzy_score("xdxsxy", "dsy").unwrap();
        assert!(word_start > mid_word);
    }

    #[test]
    fn test_id_match_outranks_description_match() {
        let manifest = Manifest::new(vec![
            skill("aaa-other", Category::Meta, "mentions raft consensus", &[]),
            skill("raft-ongaro", Category::Meta, "understandable consensus", &[]),
        ])
        .unwrap();
        let hits = search(&manifest, Some("raft"), None);
        assert_eq!(hits[0].entry.id, "raft-ongaro");
    }

    #[test]
    fn test_exact_id_is_top() {
        let manifest = Manifest::new(vec![
            skill("go", Category::Languages, "go go go", &["go"]),
            skill("go-concurrency", Category::Languages, "go patterns", &[]),
        ])
        .unwrap();
        let hits = search(&manifest, Some("go"), None);
        assert_eq!(hits[0].entry.id, "go");
    }

    #[test]
    fn test_ties_break_by_id() {
        let manifest = Manifest::new(vec![
            skill("beta", Category::Meta, "shared words", &[]),
            skill("alfa", Category::Meta, "shared words", &[]),
        ])
        .unwrap();
        let hits = search(&manifest, Some("shared"), None);
        assert_eq!(hits[0].score, hits[1].score);
        assert_eq!(ids(&hits), vec!["alfa", "beta"]);
    }

    #[test]
    fn test_suggestions() {
        let manifest = fixture();
        let hints = suggestions(&manifest, "lamprt", 3);
        assert_eq!(hints[0], "lamport-distributed-systems");
        assert!(suggestions(&manifest, "qqq", 3).is_empty());
        assert!(suggestions(&manifest, "s", 2).len() <= 2);
    }

    #[test]
    fn test_fuzzy_score_requires_order() {
        assert!(fuzzy_score("abc", "cba").is_none());
        assert!(fuzzy_score("abc", "").is_none());
        assert!(fuzzy_score("a-b-c", "abc").is_some());
    }
}
