use std::collections::HashSet;

use crate::types::ScammerEntity;

/// Queries shorter than this many characters are rejected outright.
pub const MIN_QUERY_CHARS: usize = 3;

/// Knobs for [`search`].
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// Keep matches scoring at least this much, out of 100.
    pub score_threshold: u8,
    /// How many best-scored candidate strings to consider at most,
    /// before the threshold is applied.
    pub max_candidates: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            score_threshold: 60,
            max_candidates: 20,
        }
    }
}

/// What a search came up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The query is shorter than [`MIN_QUERY_CHARS`]. Nothing was scored.
    QueryTooShort,
    /// The registry has no searchable strings at all. Deliberately
    /// distinct from finding no matches.
    NothingToSearch,
    /// Candidates were scored, but none reached the threshold.
    NoMatches { threshold: u8 },
    /// Deduplicated matching entities, best score first; equal scores
    /// keep the registry's own order.
    Matches(Vec<ScammerEntity>),
}

/// Fuzzy-match `query` against every name and alias in the registry.
///
/// Every non-empty name and alias becomes one candidate string tagged
/// with the entity that owns it. Candidates are scored with
/// [`token_sort_ratio`], the best `max_candidates` of them are kept,
/// anything under the threshold is dropped, and whatever survives is
/// deduplicated back to entities. An entity that matched through
/// several of its strings shows up once.
pub fn search(query: &str, entities: &[ScammerEntity], config: &SearchConfig) -> SearchOutcome {
    let query = query.trim().to_lowercase();
    if query.chars().count() < MIN_QUERY_CHARS {
        return SearchOutcome::QueryTooShort;
    }

    let mut candidates: Vec<(String, usize)> = Vec::new();
    for (index, entity) in entities.iter().enumerate() {
        if !entity.name.is_empty() {
            candidates.push((entity.name.to_lowercase(), index));
        }
        for alias in entity.cam4_aliases.iter().chain(&entity.telegram_aliases) {
            candidates.push((alias.to_lowercase(), index));
        }
    }

    if candidates.is_empty() {
        return SearchOutcome::NothingToSearch;
    }

    let mut scored: Vec<(u8, usize)> = candidates
        .iter()
        .map(|(string, index)| (token_sort_ratio(&query, string), *index))
        .collect();

    // The sort is stable, so equal scores stay in registry order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(config.max_candidates);

    // Deduplicate by owning entity. Named entities dedup by their
    // case-insensitive name; an entity with no name never merges with
    // another one.
    let mut seen_names: HashSet<String> = HashSet::new();
    let mut seen_unnamed: HashSet<usize> = HashSet::new();
    let mut matches: Vec<ScammerEntity> = Vec::new();

    for (score, index) in scored {
        if score < config.score_threshold {
            continue;
        }

        let entity = &entities[index];
        let first_sighting = if entity.name.is_empty() {
            seen_unnamed.insert(index)
        } else {
            seen_names.insert(entity.name_key())
        };

        if first_sighting {
            matches.push(entity.clone());
        }
    }

    if matches.is_empty() {
        SearchOutcome::NoMatches {
            threshold: config.score_threshold,
        }
    } else {
        SearchOutcome::Matches(matches)
    }
}

/// Similarity of two strings after alphabetically sorting the
/// whitespace-separated tokens of each, 0 to 100. Word order therefore
/// doesn't matter: "juana pérez" and "pérez juana" score 100 against
/// each other.
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    similarity(&sort_tokens(a), &sort_tokens(b))
}

fn sort_tokens(string: &str) -> String {
    let mut tokens: Vec<&str> = string.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Normalized Levenshtein similarity: 100 means identical, 0 means
/// nothing in common. Two empty strings count as identical.
fn similarity(a: &str, b: &str) -> u8 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 100;
    }

    let distance = levenshtein(a, b);

    // distance never exceeds the longer length, so this fits in u8.
    (100 * (longest - distance) / longest) as u8
}

/// Plain Levenshtein edit distance over characters.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut matrix = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, cell) in matrix[0].iter_mut().enumerate() {
        *cell = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let substitution_cost = usize::from(a[i - 1] != b[j - 1]);

            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + substitution_cost);
        }
    }

    matrix[a.len()][b.len()]
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn entity(name: &str, cam4: &[&str], telegram: &[&str]) -> ScammerEntity {
        ScammerEntity {
            name: name.to_string(),
            cam4_aliases: cam4.iter().map(|x| x.to_string()).collect(),
            telegram_aliases: telegram.iter().map(|x| x.to_string()).collect(),
        }
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("juana", "juana"), 0);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        // Multi-byte characters count as one edit, not several.
        assert_eq!(levenshtein("pérez", "perez"), 1);
    }

    #[test]
    fn token_order_does_not_matter() {
        assert_eq!(token_sort_ratio("juana pérez", "pérez juana"), 100);

        // Even inexact matches score the same both ways around.
        let forwards = token_sort_ratio("juana peres", "juana pérez");
        let backwards = token_sort_ratio("peres juana", "pérez juana");
        assert_eq!(forwards, backwards);
        assert!(forwards > 60);
        assert!(forwards < 100);
    }

    #[test]
    fn empty_strings_are_identical() {
        assert_eq!(token_sort_ratio("", ""), 100);
        assert_eq!(token_sort_ratio("   ", ""), 100);
    }

    #[test]
    fn short_queries_are_rejected() {
        let entities = [entity("Juana Pérez", &["link1"], &["@jp"])];
        let config = SearchConfig::default();

        assert_eq!(
            search("ju", &entities, &config),
            SearchOutcome::QueryTooShort
        );
        // Surrounding whitespace doesn't count towards the length.
        assert_eq!(
            search("  ju  ", &entities, &config),
            SearchOutcome::QueryTooShort
        );
        // Three characters is enough, even when they're not ASCII.
        assert_ne!(
            search("ñañ", &entities, &config),
            SearchOutcome::QueryTooShort
        );
    }

    #[test]
    fn empty_registry_is_not_the_same_as_no_matches() {
        let config = SearchConfig::default();

        assert_eq!(
            search("juana", &[], &config),
            SearchOutcome::NothingToSearch
        );

        // Entities with nothing searchable on them count as nothing
        // to search too.
        let blank = [entity("", &[], &[])];
        assert_eq!(
            search("juana", &blank, &config),
            SearchOutcome::NothingToSearch
        );

        let entities = [entity("Juana Pérez", &[], &[])];
        assert_eq!(
            search("zzzzzzzz", &entities, &config),
            SearchOutcome::NoMatches { threshold: 60 }
        );
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        // "juana" vs "juasa" is one edit out of five characters: 80.
        assert_eq!(token_sort_ratio("juana", "juasa"), 80);

        let entities = [entity("juasa", &[], &[])];

        let at = SearchConfig {
            score_threshold: 80,
            ..SearchConfig::default()
        };
        let SearchOutcome::Matches(matches) = search("juana", &entities, &at) else {
            panic!("a candidate scoring exactly at the threshold must match");
        };
        assert_eq!(matches.len(), 1);

        let above = SearchConfig {
            score_threshold: 81,
            ..SearchConfig::default()
        };
        assert_eq!(
            search("juana", &entities, &above),
            SearchOutcome::NoMatches { threshold: 81 }
        );
    }

    #[test]
    fn matches_dedup_back_to_one_entity() {
        // Name and both aliases all match the query; the entity must
        // come back exactly once.
        let entities = [entity(
            "Juana Pérez",
            &["juana pérez"],
            &["juana  pérez"],
        )];

        let SearchOutcome::Matches(matches) =
            search("pérez juana", &entities, &SearchConfig::default())
        else {
            panic!("expected matches");
        };
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "Juana Pérez");
    }

    #[test]
    fn ranked_by_score_with_registry_order_ties() {
        let entities = [
            entity("Juan Peres", &[], &[]),
            entity("Juana Pérez", &[], &[]),
            // Same searchable string as the fourth entity.
            entity("", &["shared alias"], &[]),
            entity("Somebody Else", &["shared alias"], &[]),
        ];

        let SearchOutcome::Matches(matches) =
            search("juana pérez", &entities, &SearchConfig::default())
        else {
            panic!("expected matches");
        };

        // The exact match outranks the close one despite coming later
        // in the registry.
        assert_eq!(matches[0].name, "Juana Pérez");
        assert_eq!(matches[1].name, "Juan Peres");

        let SearchOutcome::Matches(matches) =
            search("shared alias", &entities, &SearchConfig::default())
        else {
            panic!("expected matches");
        };

        // Both entities own an identical alias: both match, in
        // registry order, with the unnamed one not deduplicated away.
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].name, "");
        assert_eq!(matches[1].name, "Somebody Else");
    }

    #[test]
    fn candidate_cap_applies_before_the_threshold() {
        let entities = [
            entity("juana pérez", &[], &[]),
            entity("juana peres", &[], &[]),
        ];

        let config = SearchConfig {
            score_threshold: 60,
            max_candidates: 1,
        };
        let SearchOutcome::Matches(matches) = search("juana pérez", &entities, &config) else {
            panic!("expected matches");
        };

        // Both candidates clear the threshold, but only the single
        // best one was considered at all.
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "juana pérez");
    }
}
