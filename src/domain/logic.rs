// src/domain/logic.rs

/// Rounds an average review score to the half-star shown on cards and popups.
///
/// Averages below 0.25 show no stars and below 0.75 show half a star; everything above rounds to the
/// nearest half.
pub fn round_rating(average: f64) -> f32 {
    if !average.is_finite() || average < 0.25 {
        return 0.0;
    }
    if average < 0.75 {
        return 0.5;
    }
    ((average * 2.0).round() / 2.0) as f32
}

/// Mean of the given review scores, rounded with [`round_rating`]. No reviews means no rating.
pub fn aggregate_rating(scores: &[u8]) -> (f32, u32) {
    if scores.is_empty() {
        return (0.0, 0);
    }
    let total: u32 = scores.iter().map(|s| u32::from(*s)).sum();
    let average = f64::from(total) / scores.len() as f64;
    (round_rating(average), scores.len() as u32)
}

/// `8000` with symbol `₱` becomes `₱8,000`.
pub fn format_price(price: u64, symbol: &str) -> String {
    let digits = price.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{symbol}{grouped}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_rounds_to_half_stars() {
        assert_eq!(round_rating(0.1), 0.0);
        assert_eq!(round_rating(0.5), 0.5);
        assert_eq!(round_rating(4.2), 4.0);
        assert_eq!(round_rating(4.3), 4.5);
        assert_eq!(round_rating(4.76), 5.0);
    }

    #[test]
    fn aggregate_of_reviews() {
        assert_eq!(aggregate_rating(&[]), (0.0, 0));
        assert_eq!(aggregate_rating(&[5, 4]), (4.5, 2));
        assert_eq!(aggregate_rating(&[3]), (3.0, 1));
    }

    #[test]
    fn price_grouping() {
        assert_eq!(format_price(0, "₱"), "₱0");
        assert_eq!(format_price(950, "₱"), "₱950");
        assert_eq!(format_price(8000, "₱"), "₱8,000");
        assert_eq!(format_price(1234567, "$"), "$1,234,567");
    }
}
