use rust_decimal::Decimal;

/// Relative closeness test: `|offer - anchor| <= tolerance * anchor`.
/// The boundary is inclusive, so at 2% an anchor of 1500 accepts 1530.00
/// and refuses 1530.15.
pub fn within_tolerance(offer: Decimal, anchor: Decimal, tolerance: Decimal) -> bool {
    if anchor <= Decimal::ZERO {
        return false;
    }

    (offer - anchor).abs() <= tolerance * anchor
}

/// Hard server-side floor: offers below the configured minimum are never
/// auto-accepted, regardless of numeric proximity.
pub fn meets_floor(offer: Decimal, min_price: Decimal) -> bool {
    offer >= min_price
}

/// Counter-offers the negotiator produces are never recorded below the
/// floor; a drifting generator gets clamped, not trusted.
pub fn clamp_to_floor(offer: Decimal, min_price: Decimal) -> Decimal {
    offer.max(min_price)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{clamp_to_floor, meets_floor, within_tolerance};

    fn dec(value: &str) -> Decimal {
        value.parse().expect("test literal parses")
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let anchor = dec("1500");
        let tolerance = dec("0.02");

        assert!(within_tolerance(dec("1530.00"), anchor, tolerance));
        assert!(within_tolerance(dec("1470.00"), anchor, tolerance));
        assert!(!within_tolerance(dec("1530.15"), anchor, tolerance));
        assert!(!within_tolerance(dec("1469.99"), anchor, tolerance));
    }

    #[test]
    fn non_positive_anchor_never_matches() {
        assert!(!within_tolerance(dec("0"), dec("0"), dec("0.02")));
        assert!(!within_tolerance(dec("10"), dec("-5"), dec("0.02")));
    }

    #[test]
    fn floor_checks() {
        let min_price = dec("1200");
        assert!(meets_floor(dec("1200"), min_price));
        assert!(!meets_floor(dec("1199.99"), min_price));
        assert_eq!(clamp_to_floor(dec("1100"), min_price), min_price);
        assert_eq!(clamp_to_floor(dec("1350"), min_price), dec("1350"));
    }
}
