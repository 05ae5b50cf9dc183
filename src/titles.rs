//! Search-string expansion for provider lookups.
//!
//! Provider catalogs rarely use the same name as the metadata catalog, so a
//! single entry is searched under every name it is known by plus a few
//! mechanical rewrites of those names.

use crate::types::CanonicalTitles;

const SEASON: &str = "Season ";
const PART: &str = "Part ";
const COLON: &str = ":";

/// Expand canonical titles into the ordered list of strings to search for.
///
/// Romaji and English come first, then synonyms in catalog order. Each of
/// those names is then rewritten (season marker, season and part markers,
/// part marker, colon) and the rewrites are appended. Duplicates are kept,
/// rewrites that leave nothing searchable are not.
pub fn generate_variants(titles: &CanonicalTitles) -> Vec<String> {
    let mut variants: Vec<String> = titles
        .romaji
        .iter()
        .chain(titles.english.iter())
        .chain(titles.synonyms.iter())
        .filter(|title| !title.trim().is_empty())
        .cloned()
        .collect();

    let originals = variants.len();
    for idx in 0..originals {
        let rewrites = rewrite(&variants[idx]);
        variants.extend(rewrites.into_iter().filter(|r| !r.trim().is_empty()));
    }
    variants
}

fn rewrite(title: &str) -> Vec<String> {
    let mut out = Vec::new();
    let has_season = title.contains(SEASON);
    let has_part = title.contains(PART);

    if has_season {
        out.push(remove_first(title, SEASON));
    }
    if has_season && has_part {
        out.push(remove_first(&remove_first(title, SEASON), PART));
    }
    if has_part {
        out.push(remove_first(title, PART));
    }
    if title.contains(COLON) {
        out.push(remove_first(title, COLON));
    }
    out
}

fn remove_first(title: &str, needle: &str) -> String {
    title.replacen(needle, "", 1)
}
