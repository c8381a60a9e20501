use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const CODE_LENGTH: usize = 6;

/// Generates a discount code: six characters drawn independently and
/// uniformly from `[A-Z0-9]`. Uniqueness, if required, is the redemption
/// system's responsibility.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Draws the negotiator's opening counter-offer: the list price reduced by a
/// percentage sampled uniformly from `[min_pct, max_pct]` at a resolution of
/// a hundredth of a percent, rounded to two decimals.
pub fn opening_offer<R: Rng + ?Sized>(
    actual_price: Decimal,
    min_pct: Decimal,
    max_pct: Decimal,
    rng: &mut R,
) -> Decimal {
    // Config validation guarantees 0 <= min_pct <= max_pct < 100.
    let lo = (min_pct * Decimal::ONE_HUNDRED).trunc().to_i64().unwrap_or(0);
    let hi = (max_pct * Decimal::ONE_HUNDRED).trunc().to_i64().unwrap_or(0).max(lo);

    let basis = rng.gen_range(lo..=hi);
    let fraction = Decimal::new(basis, 4);
    ((Decimal::ONE - fraction) * actual_price).round_dp(2)
}
