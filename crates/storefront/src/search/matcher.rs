//! Fuzzy title matching.
//!
//! Inclusion is boolean; there is no score. A candidate title matches when,
//! compared case-insensitively, the query is
//!
//! 1. a substring of the title, or
//! 2. a prefix of the title, or
//! 3. (queries longer than two characters only) at least 70% of the query's
//!    characters, counted one by one with repeats, occur anywhere in the title.
//!
//! Queries starting with `cour` only consider courses and queries starting
//! with `coi` only consider coins. This is a routing shortcut kept for
//! compatibility: it applies even when the user meant something else
//! ("coil", "courier").

use super::{SearchCategory, SearchEntry};

/// Overlap threshold as a fraction of the query's characters: 7/10.
const OVERLAP_NUMERATOR: usize = 7;
const OVERLAP_DENOMINATOR: usize = 10;

/// Queries at or below this many characters never use overlap matching.
const MIN_OVERLAP_QUERY_LEN: usize = 2;

/// Category a query is restricted to by its prefix, if any.
#[must_use]
pub fn category_restriction(query: &str) -> Option<SearchCategory> {
    let query = query.trim().to_lowercase();
    if query.starts_with("cour") {
        Some(SearchCategory::Course)
    } else if query.starts_with("coi") {
        Some(SearchCategory::Coin)
    } else {
        None
    }
}

/// Whether `title` matches `query`. Blank queries match nothing.
#[must_use]
pub fn matches(query: &str, title: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return false;
    }
    let title = title.to_lowercase();

    if title.contains(&query) || title.starts_with(&query) {
        return true;
    }

    let query_len = query.chars().count();
    if query_len <= MIN_OVERLAP_QUERY_LEN {
        return false;
    }

    let found = query.chars().filter(|c| title.contains(*c)).count();
    found * OVERLAP_DENOMINATOR >= query_len * OVERLAP_NUMERATOR
}

/// Entries matching `query`, in catalog order.
#[must_use]
pub fn filter<'a>(query: &str, entries: &'a [SearchEntry]) -> Vec<&'a SearchEntry> {
    let restriction = category_restriction(query);
    entries
        .iter()
        .filter(|entry| restriction.is_none_or(|category| entry.category == category))
        .filter(|entry| matches(query, &entry.title))
        .collect()
}

/// Route of the first entry matching `query`.
#[must_use]
pub fn resolve_route<'a>(query: &str, entries: &'a [SearchEntry]) -> Option<&'a str> {
    filter(query, entries)
        .first()
        .map(|entry| entry.route.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, category: SearchCategory, route: &str) -> SearchEntry {
        SearchEntry {
            title: title.to_string(),
            category,
            route: route.to_string(),
        }
    }

    fn catalog() -> Vec<SearchEntry> {
        vec![
            entry(
                "Ancient Coin Authentication",
                SearchCategory::Course,
                "/courses/ancient-coin-authentication",
            ),
            entry(
                "1854 Gold Double Eagle",
                SearchCategory::Coin,
                "/marketplace/1854",
            ),
            entry(
                "Very Rare",
                SearchCategory::Category,
                "/marketplace?rarity=Very%20Rare",
            ),
            entry("About Us", SearchCategory::Page, "/about"),
        ]
    }

    #[test]
    fn test_every_substring_matches() {
        let title = "1854 Gold Double Eagle";
        for start in 0..title.len() {
            for end in (start + 1)..=title.len() {
                let needle = &title[start..end];
                if needle.trim().is_empty() {
                    continue;
                }
                assert!(matches(needle, title), "{needle:?} should match");
            }
        }
    }

    #[test]
    fn test_case_insensitive() {
        assert!(matches("GOLD double", "1854 Gold Double Eagle"));
        assert!(matches("about", "About Us"));
    }

    #[test]
    fn test_overlap_threshold() {
        // 'd','o','u','b','l' present, 'x','z','q' absent: 5/8 < 70%
        assert!(!matches("doublxzq", "1854 Gold Double Eagle"));
        // 'e','a','g','l' present, 'z' absent: 4/5 >= 70%
        assert!(matches("eaglz", "1854 Gold Double Eagle"));
        // reordered characters still overlap
        assert!(matches("elgae", "1854 Gold Double Eagle"));
    }

    #[test]
    fn test_short_queries_skip_overlap() {
        // "gx" is neither substring nor prefix; two characters never overlap-match.
        assert!(!matches("gx", "1854 Gold Double Eagle"));
        assert!(!matches("", "1854 Gold Double Eagle"));
        assert!(!matches("   ", "1854 Gold Double Eagle"));
    }

    #[test]
    fn test_cour_prefix_restricts_to_courses() {
        let entries = catalog();
        let results = filter("cour", &entries);
        assert!(!results.is_empty());
        assert!(
            results
                .iter()
                .all(|e| e.category == SearchCategory::Course)
        );
        assert_eq!(results[0].title, "Ancient Coin Authentication");
    }

    #[test]
    fn test_coi_prefix_restricts_to_coins() {
        let entries = catalog();
        // "coin" is a substring of the course title but courses are excluded.
        let results = filter("coin", &entries);
        assert!(results.iter().all(|e| e.category == SearchCategory::Coin));
    }

    #[test]
    fn test_results_keep_catalog_order() {
        let entries = catalog();
        let results = filter("a", &entries);
        let titles: Vec<&str> = results.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Ancient Coin Authentication",
                "1854 Gold Double Eagle",
                "Very Rare",
                "About Us"
            ]
        );
    }

    #[test]
    fn test_resolve_route() {
        let entries = catalog();
        assert_eq!(resolve_route("double eagle", &entries), Some("/marketplace/1854"));
        assert_eq!(
            resolve_route("very rare", &entries),
            Some("/marketplace?rarity=Very%20Rare")
        );
        assert_eq!(resolve_route("zzzz", &entries), None);
    }
}
