//! Pure odds conversions and sizing math.
//!
//! American odds are integer quotes: positive = profit on a 100 stake,
//! negative = stake required for 100 profit. All functions operate on
//! IEEE-754 doubles and apply no rounding; callers present already-coerced
//! types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum OddsError {
    /// Two-way probabilities must sum to a positive value before the
    /// bookmaker margin can be normalized out.
    #[error("invalid input: two-way probabilities must have a positive sum")]
    InvalidInput,
}

/// Convert an American price to decimal odds (total return per unit staked).
pub fn american_to_decimal(american: i32) -> f64 {
    if american > 0 {
        (american as f64 / 100.0) + 1.0
    } else {
        (100.0 / american.abs() as f64) + 1.0
    }
}

/// Implied probability of decimal odds.
pub fn decimal_to_implied_prob(decimal_odds: f64) -> f64 {
    1.0 / decimal_odds
}

/// Implied probability of an American price.
pub fn american_to_implied_prob(american: i32) -> f64 {
    decimal_to_implied_prob(american_to_decimal(american))
}

/// Normalize a two-way pair of implied probabilities so they sum to 1.0,
/// removing the bookmaker margin (vig).
pub fn remove_vig_two_way(prob_a: f64, prob_b: f64) -> Result<(f64, f64), OddsError> {
    let total = prob_a + prob_b;
    if total <= 0.0 {
        return Err(OddsError::InvalidInput);
    }
    Ok((prob_a / total, prob_b / total))
}

/// Expected value as a fraction of stake: `p*d − 1`.
pub fn ev_percent(model_probability: f64, decimal_odds: f64) -> f64 {
    (model_probability * decimal_odds) - 1.0
}

/// Full Kelly stake fraction for decimal odds `d` and win probability `p`:
/// `(p·d − 1) / (d − 1)`.
pub fn full_kelly(p: f64, decimal_odds: f64) -> f64 {
    (p * decimal_odds - 1.0) / (decimal_odds - 1.0)
}

/// Quarter Kelly, floored at zero — we never short a book.
pub fn quarter_kelly(p: f64, decimal_odds: f64) -> f64 {
    (full_kelly(p, decimal_odds) * 0.25).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_american_conversions() {
        assert_relative_eq!(american_to_decimal(150), 2.5, epsilon = 1e-9);
        assert_relative_eq!(american_to_decimal(-110), 1.909_090_909, epsilon = 1e-6);
        assert_relative_eq!(decimal_to_implied_prob(2.5), 0.4, epsilon = 1e-9);
        assert_relative_eq!(american_to_implied_prob(-110), 0.523_809_523, epsilon = 1e-6);
        assert_relative_eq!(american_to_implied_prob(100), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_conversion_round_trip() {
        // decimal_to_implied_prob ∘ american_to_decimal == american_to_implied_prob
        for price in [-450, -110, -105, -100, 100, 120, 250, 900] {
            assert_relative_eq!(
                decimal_to_implied_prob(american_to_decimal(price)),
                american_to_implied_prob(price),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_remove_vig_sums_to_one() {
        let (home, away) =
            remove_vig_two_way(american_to_implied_prob(-110), american_to_implied_prob(100))
                .unwrap();
        assert_relative_eq!(home + away, 1.0, epsilon = 1e-12);
        assert!(home > away);
    }

    #[test]
    fn test_remove_vig_invalid_input() {
        assert_eq!(remove_vig_two_way(0.0, 0.0), Err(OddsError::InvalidInput));
        assert_eq!(remove_vig_two_way(-0.6, 0.2), Err(OddsError::InvalidInput));
    }

    #[test]
    fn test_ev_and_kelly_exact() {
        let p = 0.55;
        let odds = 1.91;
        assert_relative_eq!(ev_percent(p, odds), 0.0505, epsilon = 1e-9);
        assert_relative_eq!(
            quarter_kelly(p, odds),
            ((p * odds - 1.0) / (odds - 1.0)) * 0.25,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_quarter_kelly_floor() {
        // Negative-EV bets size to zero, never negative
        assert_relative_eq!(quarter_kelly(0.3, 1.8), 0.0, epsilon = 1e-12);
        assert!(quarter_kelly(0.5, 2.2) >= 0.0);
        assert!(quarter_kelly(0.9, 1.2) >= 0.0);
    }
}
