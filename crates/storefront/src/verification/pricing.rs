//! Verification pricing.
//!
//! Each paid coin costs [`BASE_PRICE`]. Paying for [`BONUS_THRESHOLD`] or more
//! coins adds one free bonus slot: one more coin to photograph, same price.

use numisma_core::Price;
use serde::Serialize;
use thiserror::Error;

/// Price per paid coin.
pub const BASE_PRICE: Price = Price::new(20);

/// Fewest coins per submission.
pub const MIN_COINS: u8 = 1;

/// Most paid coins per submission.
pub const MAX_COINS: u8 = 6;

/// Paid coin count at which the bonus slot is granted.
pub const BONUS_THRESHOLD: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("coin count must be between {MIN_COINS} and {MAX_COINS} (got {0})")]
pub struct CoinCountError(pub i64);

/// Price breakdown for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Paid coins.
    pub coin_count: u8,
    /// Slots to photograph, bonus included.
    pub total_coins_to_upload: u8,
    /// Free slots (0 or 1).
    pub bonus_slots: u8,
    pub base_price: Price,
    pub total_price: Price,
}

impl Quote {
    /// Quote `coin_count` paid coins.
    ///
    /// # Errors
    ///
    /// Returns [`CoinCountError`] outside `MIN_COINS..=MAX_COINS`.
    pub fn new(coin_count: i64) -> Result<Self, CoinCountError> {
        let count = u8::try_from(coin_count)
            .ok()
            .filter(|c| (MIN_COINS..=MAX_COINS).contains(c))
            .ok_or(CoinCountError(coin_count))?;

        let bonus_slots = u8::from(count >= BONUS_THRESHOLD);
        Ok(Self {
            coin_count: count,
            total_coins_to_upload: count + bonus_slots,
            bonus_slots,
            base_price: BASE_PRICE,
            total_price: BASE_PRICE.times(u32::from(count)),
        })
    }

    /// Whether `slot` (1-based) is the free bonus slot.
    #[must_use]
    pub const fn is_bonus_slot(&self, slot: u8) -> bool {
        self.bonus_slots > 0 && slot == self.total_coins_to_upload
    }

    /// Slot numbers to photograph, 1-based.
    pub fn slots(&self) -> impl Iterator<Item = u8> {
        1..=self.total_coins_to_upload
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_price_is_linear() {
        for count in 1..=6 {
            let quote = Quote::new(count).unwrap();
            assert_eq!(quote.total_price, Price::new(20 * count.unsigned_abs()));
        }
    }

    #[test]
    fn test_bonus_from_five() {
        for count in 1..=4 {
            let quote = Quote::new(count).unwrap();
            assert_eq!(i64::from(quote.total_coins_to_upload), count);
            assert_eq!(quote.bonus_slots, 0);
        }
        for count in 5..=6 {
            let quote = Quote::new(count).unwrap();
            assert_eq!(i64::from(quote.total_coins_to_upload), count + 1);
            assert_eq!(quote.bonus_slots, 1);
        }
    }

    #[test]
    fn test_five_coins() {
        let quote = Quote::new(5).unwrap();
        assert_eq!(quote.total_price, Price::new(100));
        assert_eq!(quote.total_coins_to_upload, 6);
        assert_eq!(quote.bonus_slots, 1);
        assert!(quote.is_bonus_slot(6));
        assert!(!quote.is_bonus_slot(5));
        assert_eq!(quote.slots().count(), 6);
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(Quote::new(0), Err(CoinCountError(0)));
        assert_eq!(Quote::new(7), Err(CoinCountError(7)));
        assert_eq!(Quote::new(-3), Err(CoinCountError(-3)));
        assert_eq!(Quote::new(300), Err(CoinCountError(300)));
    }
}
