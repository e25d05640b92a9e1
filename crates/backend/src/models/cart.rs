//! Cart lines (`cart_items`).

use chrono::{DateTime, Utc};
use numisma_core::{CartItemId, CoinId, ProfileId};
use serde::{Deserialize, Serialize};

/// One coin in a user's cart. `(user_id, coin_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: ProfileId,
    pub coin_id: CoinId,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartItem {
    pub user_id: ProfileId,
    pub coin_id: CoinId,
    pub quantity: u32,
}
