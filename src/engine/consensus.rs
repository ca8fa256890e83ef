//! Cross-book market consensus.
//!
//! Aggregates per-book two-way prices into a single de-vigged probability,
//! guarded by freshness, book-count and outlier checks. Consensus is
//! computed independently of event identity; the caller pairs the result
//! with an event when persisting it.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::db::models::Side;

use super::odds::{american_to_implied_prob, remove_vig_two_way};

/// One bookmaker quote as seen by the consensus builder and the pick
/// selection logic. `snapshot_id` references the persisted odds snapshot
/// backing the quote.
#[derive(Debug, Clone)]
pub struct QuoteLine {
    pub book: String,
    pub market: String,
    pub side: Side,
    pub price: i32,
    pub timestamp: DateTime<Utc>,
    pub is_stale: bool,
    pub snapshot_id: i64,
}

/// De-vigged weighted mean probabilities across the retained book panel.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusResult {
    pub home_prob: f64,
    pub away_prob: f64,
    pub books_used: usize,
}

/// Outcome of a consensus attempt: either a result or the reason none
/// could be formed.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusDecision {
    pub result: Option<ConsensusResult>,
    pub missing_reason: Option<&'static str>,
}

impl ConsensusDecision {
    fn missing(reason: &'static str) -> Self {
        ConsensusDecision {
            result: None,
            missing_reason: Some(reason),
        }
    }
}

/// Knobs for a consensus attempt. Weights default to 1.0 per book;
/// overrides are keyed by book name.
#[derive(Debug, Clone, Default)]
pub struct ConsensusOptions<'a> {
    pub min_books: usize,
    pub trim_outliers: bool,
    pub book_weights: Option<&'a HashMap<String, f64>>,
}

/// Build a de-vigged consensus over the given lines.
///
/// Stale lines are dropped first; books missing either side of the two-way
/// market are excluded; when enabled and at least six books remain, the
/// single lowest and highest probability are trimmed from each side
/// independently before the weighted mean.
pub fn build_market_consensus(lines: &[QuoteLine], opts: &ConsensusOptions) -> ConsensusDecision {
    // Per-book side → implied probability, books kept in first-seen order.
    // A later quote for the same (book, side) overrides the earlier one.
    let mut book_order: Vec<&str> = Vec::new();
    let mut by_book: HashMap<&str, HashMap<Side, f64>> = HashMap::new();
    for line in lines.iter().filter(|l| !l.is_stale) {
        let entry = by_book.entry(line.book.as_str()).or_insert_with(|| {
            book_order.push(line.book.as_str());
            HashMap::new()
        });
        entry.insert(line.side, american_to_implied_prob(line.price));
    }

    if book_order.len() < opts.min_books {
        return ConsensusDecision::missing("INSUFFICIENT_BOOKS");
    }

    // Retain only books quoting both sides; de-vig each book's pair.
    let mut usable_books: Vec<&str> = Vec::new();
    let mut home_probs: Vec<f64> = Vec::new();
    let mut away_probs: Vec<f64> = Vec::new();
    for &book in &book_order {
        let two_way = &by_book[book];
        let (Some(&home_raw), Some(&away_raw)) = (two_way.get(&Side::Home), two_way.get(&Side::Away))
        else {
            continue;
        };
        // American quotes always imply positive probabilities, so the
        // normalization cannot fail here; skip the book if it somehow does.
        let Ok((home, away)) = remove_vig_two_way(home_raw, away_raw) else {
            continue;
        };
        usable_books.push(book);
        home_probs.push(home);
        away_probs.push(away);
    }

    if usable_books.len() < opts.min_books {
        return ConsensusDecision::missing("INCOMPLETE_TWO_WAY_MARKET");
    }

    // Outlier trim is inert below six books: with the usual 3-5 book panel
    // every quote is kept.
    if opts.trim_outliers && home_probs.len() >= 6 {
        home_probs = trim_extremes(home_probs);
        away_probs = trim_extremes(away_probs);
    }

    // Weights align to the first home_probs.len() retained books.
    let weights: Vec<f64> = usable_books
        .iter()
        .take(home_probs.len())
        .map(|book| {
            opts.book_weights
                .and_then(|w| w.get(*book).copied())
                .unwrap_or(1.0)
        })
        .collect();
    let weight_sum: f64 = weights.iter().sum();
    if weight_sum <= 0.0 {
        return ConsensusDecision::missing("INVALID_BOOK_WEIGHTS");
    }

    let home_prob = weighted_mean(&home_probs, &weights, weight_sum);
    let away_prob = weighted_mean(&away_probs, &weights, weight_sum);

    ConsensusDecision {
        result: Some(ConsensusResult {
            home_prob,
            away_prob,
            books_used: home_probs.len(),
        }),
        missing_reason: None,
    }
}

/// Sort ascending and drop the single lowest and highest entry.
fn trim_extremes(mut probs: Vec<f64>) -> Vec<f64> {
    probs.sort_by(f64::total_cmp);
    probs[1..probs.len() - 1].to_vec()
}

fn weighted_mean(values: &[f64], weights: &[f64], weight_sum: f64) -> f64 {
    values
        .iter()
        .zip(weights)
        .map(|(v, w)| v * w)
        .sum::<f64>()
        / weight_sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(book: &str, side: Side, price: i32) -> QuoteLine {
        QuoteLine {
            book: book.into(),
            market: "moneyline".into(),
            side,
            price,
            timestamp: Utc::now(),
            is_stale: false,
            snapshot_id: 0,
        }
    }

    fn stale_line(book: &str, side: Side, price: i32) -> QuoteLine {
        QuoteLine {
            is_stale: true,
            ..line(book, side, price)
        }
    }

    fn opts(min_books: usize) -> ConsensusOptions<'static> {
        ConsensusOptions {
            min_books,
            trim_outliers: true,
            book_weights: None,
        }
    }

    #[test]
    fn test_two_book_consensus_devigged() {
        let lines = vec![
            line("book_a", Side::Home, -110),
            line("book_a", Side::Away, 100),
            line("book_b", Side::Home, -105),
            line("book_b", Side::Away, -105),
        ];
        let decision = build_market_consensus(&lines, &opts(2));
        let result = decision.result.expect("consensus should form");
        assert!(result.home_prob > 0.49 && result.home_prob < 0.53);
        assert_relative_eq!(result.home_prob + result.away_prob, 1.0, epsilon = 1e-9);
        assert_eq!(result.books_used, 2);
    }

    #[test]
    fn test_insufficient_books() {
        let lines = vec![
            line("book_a", Side::Home, -110),
            line("book_a", Side::Away, 100),
        ];
        let decision = build_market_consensus(&lines, &opts(3));
        assert!(decision.result.is_none());
        assert_eq!(decision.missing_reason, Some("INSUFFICIENT_BOOKS"));
    }

    #[test]
    fn test_incomplete_two_way_market() {
        // Three distinct books, but only one quotes both sides.
        let lines = vec![
            line("book_a", Side::Home, -110),
            line("book_a", Side::Away, 100),
            line("book_b", Side::Home, -105),
            line("book_c", Side::Away, -105),
        ];
        let decision = build_market_consensus(&lines, &opts(2));
        assert!(decision.result.is_none());
        assert_eq!(decision.missing_reason, Some("INCOMPLETE_TWO_WAY_MARKET"));
    }

    #[test]
    fn test_stale_lines_dropped() {
        let lines = vec![
            line("book_a", Side::Home, -110),
            line("book_a", Side::Away, 100),
            stale_line("book_b", Side::Home, -105),
            stale_line("book_b", Side::Away, -105),
        ];
        let decision = build_market_consensus(&lines, &opts(2));
        assert!(decision.result.is_none());
        assert_eq!(decision.missing_reason, Some("INSUFFICIENT_BOOKS"));
    }

    #[test]
    fn test_trim_inert_below_six_books() {
        // Five books, one a wild outlier: nothing gets trimmed.
        let mut lines = Vec::new();
        for book in ["a", "b", "c", "d"] {
            lines.push(line(book, Side::Home, -110));
            lines.push(line(book, Side::Away, -110));
        }
        lines.push(line("e", Side::Home, -400));
        lines.push(line("e", Side::Away, 300));
        let result = build_market_consensus(&lines, &opts(3)).result.unwrap();
        assert_eq!(result.books_used, 5);
        // Mean is dragged up by the outlier.
        assert!(result.home_prob > 0.5);
    }

    #[test]
    fn test_trim_drops_extremes_at_six_books() {
        // Four balanced books plus one heavy favorite and one heavy dog
        // quote; the trim removes both extremes, leaving the balanced mean.
        let mut lines = Vec::new();
        for book in ["a", "b", "c", "d"] {
            lines.push(line(book, Side::Home, -110));
            lines.push(line(book, Side::Away, -110));
        }
        lines.push(line("e", Side::Home, -400));
        lines.push(line("e", Side::Away, 300));
        lines.push(line("f", Side::Home, 300));
        lines.push(line("f", Side::Away, -400));
        let result = build_market_consensus(&lines, &opts(3)).result.unwrap();
        assert_eq!(result.books_used, 4);
        assert_relative_eq!(result.home_prob, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_adding_mean_book_preserves_mean() {
        let mut lines = vec![
            line("a", Side::Home, -110),
            line("a", Side::Away, -110),
            line("b", Side::Home, -110),
            line("b", Side::Away, -110),
        ];
        let before = build_market_consensus(&lines, &opts(2)).result.unwrap();
        // A third book whose de-vigged home probability equals the mean.
        lines.push(line("c", Side::Home, -110));
        lines.push(line("c", Side::Away, -110));
        let after = build_market_consensus(&lines, &opts(2)).result.unwrap();
        assert_relative_eq!(before.home_prob, after.home_prob, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_book_weights() {
        let lines = vec![
            line("book_a", Side::Home, -110),
            line("book_a", Side::Away, 100),
            line("book_b", Side::Home, -105),
            line("book_b", Side::Away, -105),
        ];
        let weights: HashMap<String, f64> =
            [("book_a".to_string(), 0.0), ("book_b".to_string(), 0.0)].into();
        let decision = build_market_consensus(
            &lines,
            &ConsensusOptions {
                min_books: 2,
                trim_outliers: true,
                book_weights: Some(&weights),
            },
        );
        assert!(decision.result.is_none());
        assert_eq!(decision.missing_reason, Some("INVALID_BOOK_WEIGHTS"));
    }

    #[test]
    fn test_book_weight_override() {
        // Zero-weighting book_b leaves book_a's de-vigged probability.
        let lines = vec![
            line("book_a", Side::Home, -200),
            line("book_a", Side::Away, 170),
            line("book_b", Side::Home, 100),
            line("book_b", Side::Away, -120),
        ];
        let weights: HashMap<String, f64> = [("book_b".to_string(), 0.0)].into();
        let result = build_market_consensus(
            &lines,
            &ConsensusOptions {
                min_books: 2,
                trim_outliers: false,
                book_weights: Some(&weights),
            },
        )
        .result
        .unwrap();
        let (expected_home, _) =
            remove_vig_two_way(american_to_implied_prob(-200), american_to_implied_prob(170))
                .unwrap();
        assert_relative_eq!(result.home_prob, expected_home, epsilon = 1e-12);
    }
}
