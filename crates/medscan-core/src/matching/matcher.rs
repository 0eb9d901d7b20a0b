//! Catalog matching for extracted names.
//!
//! Precedence, first hit wins:
//! 1. exact match on the canonical name
//! 2. whole-word containment, in either direction
//!    ("Fasting Glucose Level" -> "Glucose", "Amoxicilline" -> "Amoxicilline 1g")
//!
//! Comparison ignores case and surrounding whitespace. Matching is permissive
//! on purpose: every extracted item goes through human review anyway.

use strsim::jaro_winkler;

use crate::models::CatalogEntry;

/// How a catalog entry was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    WordContainment,
}

/// A catalog entry selected for an extracted name.
#[derive(Debug, Clone, Copy)]
pub struct CatalogMatch<'a, E> {
    pub entry: &'a E,
    pub kind: MatchKind,
}

/// Find the catalog entry an extracted name refers to.
pub fn match_entity<'a, E: CatalogEntry>(extracted: &str, catalog: &'a [E]) -> Option<&'a E> {
    find_match(extracted, catalog).map(|m| m.entry)
}

/// Like [`match_entity`], also reporting which rule matched.
///
/// Several containment candidates are ranked by canonical name length
/// (more specific first), then Jaro-Winkler similarity, then catalog order.
pub fn find_match<'a, E: CatalogEntry>(
    extracted: &str,
    catalog: &'a [E],
) -> Option<CatalogMatch<'a, E>> {
    let query = normalize_name(extracted);
    if query.is_empty() {
        return None;
    }

    let names: Vec<String> = catalog
        .iter()
        .map(|entry| normalize_name(entry.canonical_name()))
        .collect();

    if let Some(index) = names.iter().position(|name| !name.is_empty() && *name == query) {
        return Some(CatalogMatch {
            entry: &catalog[index],
            kind: MatchKind::Exact,
        });
    }

    let mut best: Option<(usize, usize, f64)> = None;
    for (index, name) in names.iter().enumerate() {
        if name.is_empty() || !(contains_word(&query, name) || contains_word(name, &query)) {
            continue;
        }

        let length = name.chars().count();
        let similarity = jaro_winkler(&query, name);
        let better = match best {
            None => true,
            Some((_, best_len, best_sim)) => {
                length > best_len || (length == best_len && similarity > best_sim)
            }
        };
        if better {
            best = Some((index, length, similarity));
        }
    }

    best.map(|(index, _, _)| CatalogMatch {
        entry: &catalog[index],
        kind: MatchKind::WordContainment,
    })
}

/// Lowercase, trim and collapse inner whitespace.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `needle` occurs in `haystack` bounded by non-alphanumeric
/// characters (or the ends of the string) on both sides.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }

    haystack.match_indices(needle).any(|(start, matched)| {
        let end = start + matched.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
