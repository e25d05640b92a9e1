//! Try a query against the global search catalog.
//!
//! Courses and static pages come from the content directory. With
//! `--listings` the newest marketplace coins are fetched from the backend
//! as well, exactly as the storefront does at startup.

use std::path::Path;

use numisma_storefront::content::CourseCatalog;
use numisma_storefront::search::{SearchCatalog, build_catalog};
use tracing::info;

/// Matches for `query` as `(title, category, route)` lines, then the route
/// the search bar would navigate to.
#[must_use]
pub fn report(catalog: &SearchCatalog, query: &str) -> (Vec<String>, Option<String>) {
    let lines = catalog
        .search(query)
        .into_iter()
        .map(|entry| {
            let category = format!("{:?}", entry.category);
            format!("{category:<8} {}  ->  {}", entry.title, entry.route)
        })
        .collect();
    (lines, catalog.resolve(query).map(str::to_string))
}

/// Load the catalog and log what `query` matches.
///
/// # Errors
///
/// Returns an error if the content directory cannot be read or, with
/// `with_listings`, the backend cannot be reached.
pub async fn run(
    query: &str,
    content_dir: &Path,
    with_listings: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let courses = CourseCatalog::load(content_dir)?;
    let catalog = if with_listings {
        let repos = super::connect()?;
        build_catalog(repos.listings.as_ref(), &courses).await?
    } else {
        SearchCatalog::build(&courses, &[])
    };
    info!(entries = catalog.len(), "Search catalog loaded");

    let (lines, route) = report(&catalog, query);
    if lines.is_empty() {
        info!("No matches for {query:?}");
        return Ok(());
    }
    info!("{} matches for {query:?}:", lines.len());
    for line in &lines {
        info!("  {line}");
    }
    if let Some(route) = route {
        info!("Enter navigates to {route}");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn catalog() -> SearchCatalog {
        SearchCatalog::build(
            &CourseCatalog::default(),
            &[(
                "1854 Gold Double Eagle".to_string(),
                "/marketplace/eagle".to_string(),
            )],
        )
    }

    #[test]
    fn test_report_resolves_first_match() {
        let (lines, route) = report(&catalog(), "eagle");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("1854 Gold Double Eagle"));
        assert_eq!(route.as_deref(), Some("/marketplace/eagle"));
    }

    #[test]
    fn test_blank_query_matches_nothing() {
        let (lines, route) = report(&catalog(), "   ");
        assert!(lines.is_empty());
        assert_eq!(route, None);
    }
}
