//! Coin listings (`coin_listings`).

use chrono::{DateTime, Utc};
use numisma_core::{CoinId, Price, ProfileId, Rarity};
use serde::{Deserialize, Serialize};

/// A coin offered for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoinListing {
    pub id: CoinId,
    pub title: String,
    pub description: Option<String>,
    pub mint_date: Option<String>,
    pub region: Option<String>,
    pub value: Price,
    pub rarity: Rarity,
    pub metal: Option<String>,
    pub dynasty: Option<String>,
    pub ruler: Option<String>,
    pub condition: Option<String>,
    /// Photo URLs, primary first.
    pub images: Vec<String>,
    pub stock_quantity: u32,
    pub verified: bool,
    pub seller_id: Option<ProfileId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CoinListing {
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Whether the free-text search matches title, description or region.
    #[must_use]
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [Some(&self.title), self.description.as_ref(), self.region.as_ref()]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Stored shape of a listing. `value` and `stock_quantity` are signed
/// integer columns.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinListingRow {
    pub id: CoinId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mint_date: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub value: i64,
    pub rarity: String,
    #[serde(default)]
    pub metal: Option<String>,
    #[serde(default)]
    pub dynasty: Option<String>,
    #[serde(default)]
    pub ruler: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub seller_id: Option<ProfileId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CoinListingRow> for CoinListing {
    type Error = String;

    fn try_from(row: CoinListingRow) -> Result<Self, Self::Error> {
        let value = u64::try_from(row.value)
            .map_err(|_| format!("negative value {} on listing {}", row.value, row.id))?;
        let stock_quantity = u32::try_from(row.stock_quantity.max(0))
            .map_err(|_| format!("stock out of range on listing {}", row.id))?;
        let rarity = row
            .rarity
            .parse::<Rarity>()
            .map_err(|e| format!("{e} on listing {}", row.id))?;

        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            mint_date: row.mint_date,
            region: row.region,
            value: Price::new(value),
            rarity,
            metal: row.metal,
            dynasty: row.dynasty,
            ruler: row.ruler,
            condition: row.condition,
            images: row.images.unwrap_or_default(),
            stock_quantity,
            verified: row.verified,
            seller_id: row.seller_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A listing as submitted by a seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCoinListing {
    pub title: String,
    pub description: Option<String>,
    pub mint_date: Option<String>,
    pub region: Option<String>,
    pub value: Price,
    pub rarity: Rarity,
    pub metal: Option<String>,
    pub dynasty: Option<String>,
    pub ruler: Option<String>,
    pub condition: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub stock_quantity: u32,
    pub seller_id: Option<ProfileId>,
}

/// Partial listing update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Price>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

impl ListingUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.value.is_none()
            && self.images.is_none()
            && self.stock_quantity.is_none()
            && self.verified.is_none()
    }
}

/// Sort order for browsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingSort {
    #[default]
    Newest,
    PriceLowHigh,
    PriceHighLow,
    Title,
}

/// Browse filters. Zero-stock listings are always excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingFilters {
    /// Substring across title, description and region.
    pub search: Option<String>,
    pub region: Option<String>,
    pub rarity: Option<Rarity>,
    pub min_value: Option<Price>,
    pub max_value: Option<Price>,
    pub verified: Option<bool>,
    pub seller_id: Option<ProfileId>,
    pub sort: ListingSort,
}

impl ListingFilters {
    /// Search text with surrounding whitespace removed, `None` if blank.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Region with surrounding whitespace removed, `None` if blank.
    #[must_use]
    pub fn region_term(&self) -> Option<&str> {
        self.region.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// In-process evaluation of the same predicate the REST query applies.
    #[must_use]
    pub fn matches(&self, listing: &CoinListing) -> bool {
        listing.in_stock()
            && self.search_term().is_none_or(|s| listing.matches_search(s))
            && self.region_term().is_none_or(|r| {
                listing
                    .region
                    .as_deref()
                    .is_some_and(|lr| lr.eq_ignore_ascii_case(r))
            })
            && self.rarity.is_none_or(|r| listing.rarity == r)
            && self.min_value.is_none_or(|v| listing.value >= v)
            && self.max_value.is_none_or(|v| listing.value <= v)
            && self.verified.is_none_or(|v| listing.verified == v)
            && self.seller_id.is_none_or(|s| listing.seller_id == Some(s))
    }

    /// In-process ordering matching [`ListingSort`].
    pub fn sort(&self, listings: &mut [CoinListing]) {
        match self.sort {
            ListingSort::Newest => listings.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ListingSort::PriceLowHigh => listings.sort_by_key(|l| l.value),
            ListingSort::PriceHighLow => listings.sort_by(|a, b| b.value.cmp(&a.value)),
            ListingSort::Title => listings.sort_by(|a, b| a.title.cmp(&b.title)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn listing(title: &str, value: u64, stock: u32) -> CoinListing {
        CoinListing {
            id: CoinId::generate(),
            title: title.to_string(),
            description: None,
            mint_date: None,
            region: Some("India".to_string()),
            value: Price::new(value),
            rarity: Rarity::Rare,
            metal: Some("Gold".to_string()),
            dynasty: None,
            ruler: None,
            condition: None,
            images: Vec::new(),
            stock_quantity: stock,
            verified: false,
            seller_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_zero_stock_never_matches() {
        let filters = ListingFilters::default();
        assert!(filters.matches(&listing("Mohur", 100, 1)));
        assert!(!filters.matches(&listing("Mohur", 100, 0)));
    }

    #[test]
    fn test_search_and_range() {
        let filters = ListingFilters {
            search: Some("  mohur ".to_string()),
            min_value: Some(Price::new(50)),
            max_value: Some(Price::new(150)),
            ..ListingFilters::default()
        };
        assert!(filters.matches(&listing("Gold Mohur", 100, 1)));
        assert!(!filters.matches(&listing("Gold Mohur", 200, 1)));
        assert!(!filters.matches(&listing("Silver Rupee", 100, 1)));
    }

    #[test]
    fn test_region_is_case_insensitive() {
        let filters = ListingFilters {
            region: Some("india".to_string()),
            ..ListingFilters::default()
        };
        assert!(filters.matches(&listing("Pagoda", 10, 3)));
    }

    #[test]
    fn test_row_validation() {
        let row: CoinListingRow = serde_json::from_value(serde_json::json!({
            "id": "0b5f4f1e-8a3c-4e7e-9d2e-6f1f3c1a2b3c",
            "title": "1854 Gold Double Eagle",
            "value": 2500,
            "rarity": "Very Rare",
            "images": null,
            "stock_quantity": 2,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        let listing = CoinListing::try_from(row.clone()).unwrap();
        assert_eq!(listing.rarity, Rarity::VeryRare);
        assert!(listing.images.is_empty());

        let mut bad = row;
        bad.value = -1;
        assert!(CoinListing::try_from(bad).is_err());
    }

    #[test]
    fn test_sort_price() {
        let mut listings = vec![listing("a", 30, 1), listing("b", 10, 1), listing("c", 20, 1)];
        let filters = ListingFilters {
            sort: ListingSort::PriceHighLow,
            ..ListingFilters::default()
        };
        filters.sort(&mut listings);
        let values: Vec<u64> = listings.iter().map(|l| l.value.amount()).collect();
        assert_eq!(values, vec![30, 20, 10]);
    }
}
