//! Numeric coercion shared by every normalizer
//!
//! Raw extracts carry blanks, suppression markers and the occasional negative
//! sentinel. The rules: trim, parse, clip negatives to zero, treat anything
//! unparseable as absent.

/// Parse a count; negative → 0, blank or unparseable → `None`
pub fn parse_count(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(n.max(0));
    }

    // Extracts sometimes write integral counts as "123.0"
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v.max(0.0).round() as i64),
        _ => None,
    }
}

/// Round to four decimal places
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// `numerator / denominator` rounded to 4 decimals, `None` when the denominator is 0
pub fn ratio(numerator: i64, denominator: i64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(round4(numerator as f64 / denominator as f64))
    }
}

/// Youth share from counts; undefined when total is absent or zero
pub fn youth_share(total_pop: Option<i64>, pop_18_29: Option<i64>) -> Option<f64> {
    match (total_pop, pop_18_29) {
        (Some(total), Some(youth)) if total > 0 => ratio(youth, total),
        _ => None,
    }
}

/// Sum of the youth variables that are present; `None` if none are
pub fn sum_present(values: impl IntoIterator<Item = Option<i64>>) -> Option<i64> {
    values
        .into_iter()
        .flatten()
        .fold(None, |acc, v| Some(acc.unwrap_or(0) + v))
}

/// Vote shares for a tally: `(dem_pct, dem_margin)`
pub fn vote_shares(dem: i64, rep: i64, total: i64) -> (Option<f64>, Option<f64>) {
    (ratio(dem, total), ratio(dem - rep, total))
}
