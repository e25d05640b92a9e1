//! Seed the marketplace with coin listings from a YAML file.
//!
//! ```yaml
//! seller_email: curator@example.com   # optional
//! listings:
//!   - title: Mughal Silver Rupee of Akbar
//!     region: India
//!     value: 18500
//!     rarity: Very Rare
//!     metal: Silver
//!     stock_quantity: 1
//! ```
//!
//! The whole file is validated before anything is written.

use std::path::Path;

use numisma_backend::models::NewCoinListing;
use numisma_backend::{Repositories, RepositoryError};
use numisma_core::{Email, EmailError};
use numisma_storefront::services::marketplace::MAX_LISTING_IMAGES;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} validation errors found")]
    Invalid(usize),

    #[error("invalid seller email: {0}")]
    SellerEmail(#[from] EmailError),

    #[error("no account with email {0}")]
    UnknownSeller(Email),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Contents of a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    /// Account the listings are attributed to when they name no seller.
    #[serde(default)]
    pub seller_email: Option<String>,
    pub listings: Vec<NewCoinListing>,
}

/// What a seed run did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub failed: usize,
}

/// Parse a seed file.
///
/// # Errors
///
/// Returns `SeedError::Yaml` if the content does not match [`SeedFile`].
pub fn parse(content: &str) -> Result<SeedFile, SeedError> {
    Ok(serde_yaml::from_str(content)?)
}

/// Problems with the listings, one message per problem.
#[must_use]
pub fn validate(file: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();
    if file.listings.is_empty() {
        errors.push("file contains no listings".to_string());
    }
    for (index, listing) in file.listings.iter().enumerate() {
        let n = index + 1;
        if listing.title.trim().is_empty() {
            errors.push(format!("listing {n}: title is blank"));
        }
        if listing.value.amount() == 0 {
            errors.push(format!("listing {n}: value must be above zero"));
        }
        if listing.images.len() > MAX_LISTING_IMAGES {
            errors.push(format!(
                "listing {n}: at most {MAX_LISTING_IMAGES} images (got {})",
                listing.images.len()
            ));
        }
    }
    errors
}

/// Insert every listing, attributing unowned ones to `file.seller_email`.
///
/// A failed insert is logged and counted; the rest still go in.
///
/// # Errors
///
/// Returns an error if the seller cannot be resolved.
pub async fn seed(repos: &Repositories, file: SeedFile) -> Result<SeedReport, SeedError> {
    let seller_id = match file.seller_email.as_deref() {
        Some(raw) => {
            let email = Email::parse(raw)?;
            let profile = repos
                .profiles
                .get_by_email(&email)
                .await?
                .ok_or(SeedError::UnknownSeller(email))?;
            Some(profile.id)
        }
        None => None,
    };

    let mut report = SeedReport::default();
    for mut listing in file.listings {
        if listing.seller_id.is_none() {
            listing.seller_id = seller_id;
        }
        match repos.listings.create(&listing).await {
            Ok(created) => {
                info!("  + {} ({})", created.title, created.id);
                report.inserted += 1;
            }
            Err(e) => {
                warn!("  ! {}: {e}", listing.title);
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

/// Validate a seed file and, unless `dry_run`, write it to the backend.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or the backend is unreachable.
pub async fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    info!(path = %path.display(), "Loading listings from file");
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Read {
            path: path.display().to_string(),
            source,
        })?;
    let file = parse(&content)?;
    info!(listings = file.listings.len(), "Parsed seed file");

    let errors = validate(&file);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(SeedError::Invalid(errors.len()).into());
    }
    info!("Seed file validated successfully");

    if dry_run {
        info!("Dry run, nothing written");
        return Ok(());
    }

    let repos = super::connect()?;
    let report = seed(&repos, file).await?;
    info!("Seeding complete!");
    info!("  Listings inserted: {}", report.inserted);
    if report.failed > 0 {
        error!("  Listings failed: {}", report.failed);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use numisma_backend::InMemoryBackend;
    use numisma_backend::models::NewProfile;
    use numisma_core::{ProfileId, Rarity};

    use super::*;

    const SAMPLE: &str = r"
seller_email: curator@example.com
listings:
  - title: Mughal Silver Rupee of Akbar
    region: India
    value: 18500
    rarity: Very Rare
    metal: Silver
    stock_quantity: 1
  - title: 1862 Victoria Half Anna
    value: 950
    rarity: Common
    stock_quantity: 4
";

    #[test]
    fn test_parse_sample() {
        let file = parse(SAMPLE).unwrap();
        assert_eq!(file.listings.len(), 2);
        assert_eq!(file.listings[0].rarity, Rarity::VeryRare);
        assert_eq!(file.listings[1].region, None);
        assert!(validate(&file).is_empty());
    }

    #[test]
    fn test_validate_reports_each_problem() {
        let mut file = parse(SAMPLE).unwrap();
        file.listings[0].title = "  ".to_string();
        file.listings[1].images = vec!["x.jpg".to_string(); MAX_LISTING_IMAGES + 1];
        let errors = validate(&file);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("listing 1"));
        assert!(errors[1].starts_with("listing 2"));
    }

    #[tokio::test]
    async fn test_seed_attributes_seller() {
        let repos = InMemoryBackend::new().repositories();
        let seller = ProfileId::generate();
        repos
            .profiles
            .create(&NewProfile {
                id: seller,
                full_name: None,
                email: Some(Email::parse("curator@example.com").unwrap()),
                phone: None,
                avatar_url: None,
            })
            .await
            .unwrap();

        let report = seed(&repos, parse(SAMPLE).unwrap()).await.unwrap();
        assert_eq!(report, SeedReport { inserted: 2, failed: 0 });
        assert_eq!(repos.listings.count(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_seller() {
        let repos = InMemoryBackend::new().repositories();
        assert!(matches!(
            seed(&repos, parse(SAMPLE).unwrap()).await,
            Err(SeedError::UnknownSeller(_))
        ));
    }
}
