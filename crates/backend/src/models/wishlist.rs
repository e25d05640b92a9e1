//! Saved coins (`wishlist_items`).

use chrono::{DateTime, Utc};
use numisma_core::{CoinId, ProfileId, WishlistItemId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: WishlistItemId,
    pub user_id: ProfileId,
    pub coin_id: CoinId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWishlistItem {
    pub user_id: ProfileId,
    pub coin_id: CoinId,
}
