//! Site-wide quick search.
//!
//! A small fixed catalog of titles (courses, featured coins, rarity
//! categories, static pages) filtered by the fuzzy [`matcher`]. The app
//! starts with a catalog built from content and static entries; a background
//! task adds featured coin titles from live listings and swaps the catalog in
//! when ready.

mod indexer;
pub mod matcher;

use std::sync::{Arc, RwLock};

use numisma_core::Rarity;
use serde::Serialize;

use crate::content::CourseCatalog;

pub use indexer::{build_catalog, build_catalog_async};
pub use matcher::{filter, matches, resolve_route};

/// Kind of thing a search entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchCategory {
    Course,
    Coin,
    Category,
    Page,
}

/// One searchable title and where it navigates to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchEntry {
    pub title: String,
    pub category: SearchCategory,
    pub route: String,
}

/// Static pages, in catalog order.
const PAGES: &[(&str, &str)] = &[
    ("Marketplace", "/marketplace"),
    ("Courses", "/courses"),
    ("Coin Verification", "/verify"),
    ("About Us", "/about"),
    ("Contact", "/contact"),
];

/// Rarity categories in catalog order.
const CATEGORIES: [Rarity; 5] = [
    Rarity::Common,
    Rarity::Uncommon,
    Rarity::Rare,
    Rarity::VeryRare,
    Rarity::ExtremelyRare,
];

/// Catalog order: courses, coins, categories, pages.
#[derive(Debug, Clone, Default)]
pub struct SearchCatalog {
    entries: Vec<SearchEntry>,
}

impl SearchCatalog {
    /// Build the catalog from courses and featured coin `(title, route)` pairs.
    #[must_use]
    pub fn build(courses: &CourseCatalog, coins: &[(String, String)]) -> Self {
        let mut entries: Vec<SearchEntry> = courses
            .all()
            .map(|course| SearchEntry {
                title: course.meta.title.clone(),
                category: SearchCategory::Course,
                route: course.route(),
            })
            .collect();

        entries.extend(coins.iter().map(|(title, route)| SearchEntry {
            title: title.clone(),
            category: SearchCategory::Coin,
            route: route.clone(),
        }));

        entries.extend(CATEGORIES.iter().map(|rarity| SearchEntry {
            title: rarity.label().to_string(),
            category: SearchCategory::Category,
            route: format!("/marketplace?rarity={}", urlencoding::encode(rarity.label())),
        }));

        entries.extend(PAGES.iter().map(|(title, route)| SearchEntry {
            title: (*title).to_string(),
            category: SearchCategory::Page,
            route: (*route).to_string(),
        }));

        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[SearchEntry] {
        &self.entries
    }

    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&SearchEntry> {
        filter(query, &self.entries)
    }

    #[must_use]
    pub fn resolve(&self, query: &str) -> Option<&str> {
        resolve_route(query, &self.entries)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shared, swappable search catalog.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    inner: Arc<RwLock<Arc<SearchCatalog>>>,
}

impl SearchIndex {
    #[must_use]
    pub fn new(catalog: SearchCatalog) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(catalog))),
        }
    }

    /// Current catalog. A poisoned lock yields an empty catalog.
    #[must_use]
    pub fn catalog(&self) -> Arc<SearchCatalog> {
        self.inner
            .read()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_default()
    }

    /// Replace the catalog.
    pub fn replace(&self, catalog: SearchCatalog) {
        match self.inner.write() {
            Ok(mut guard) => *guard = Arc::new(catalog),
            Err(e) => tracing::error!(error = %e, "Search catalog lock poisoned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order() {
        let coins = vec![(
            "1854 Gold Double Eagle".to_string(),
            "/marketplace/abc".to_string(),
        )];
        let catalog = SearchCatalog::build(&CourseCatalog::default(), &coins);
        let categories: Vec<SearchCategory> =
            catalog.entries().iter().map(|e| e.category).collect();
        assert_eq!(categories.first(), Some(&SearchCategory::Coin));
        assert_eq!(categories.last(), Some(&SearchCategory::Page));
        assert_eq!(catalog.len(), 1 + CATEGORIES.len() + PAGES.len());
    }

    #[test]
    fn test_category_route_is_encoded() {
        let catalog = SearchCatalog::build(&CourseCatalog::default(), &[]);
        assert_eq!(
            catalog.resolve("extremely"),
            Some("/marketplace?rarity=Extremely%20Rare")
        );
    }

    #[test]
    fn test_index_replace() {
        let index = SearchIndex::default();
        assert!(index.catalog().is_empty());
        index.replace(SearchCatalog::build(&CourseCatalog::default(), &[]));
        assert!(!index.catalog().is_empty());
    }
}
