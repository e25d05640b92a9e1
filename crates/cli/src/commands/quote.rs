//! Price a verification submission the way the wizard does.

use numisma_storefront::verification::pricing::{CoinCountError, Quote};
use tracing::info;

/// Quote `coin_count` coins and log the breakdown.
///
/// # Errors
///
/// Returns [`CoinCountError`] for a count the wizard would reject.
pub fn run(coin_count: i64) -> Result<Quote, CoinCountError> {
    let quote = Quote::new(coin_count)?;

    info!("Coins paid for:    {}", quote.coin_count);
    info!("Price per coin:    ₹{}", quote.base_price.amount());
    info!("Total:             ₹{}", quote.total_price.amount());
    if quote.bonus_slots > 0 {
        info!("Bonus slots:       {} (free)", quote.bonus_slots);
    }
    for slot in quote.slots() {
        let label = if quote.is_bonus_slot(slot) { " (bonus)" } else { "" };
        info!("  slot {slot}: obverse + reverse{label}");
    }
    Ok(quote)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bonus_quote() {
        let quote = run(5).unwrap();
        assert_eq!(quote.total_price.amount(), 100);
        assert_eq!(quote.total_coins_to_upload, 6);
        assert!(quote.is_bonus_slot(6));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(run(0), Err(CoinCountError(0)));
        assert_eq!(run(7), Err(CoinCountError(7)));
    }
}
