//! Money parsing and rendering for statement and invoice totals.
//!
//! Totals arrive as free text (`"£1,234.50"`, `"1234.5"`, `"ERROR"`) from
//! both the supplier statement and the extraction output. Anything that is
//! not a plain decimal after stripping currency noise counts as zero.

/// Totals closer than this are considered equal.
pub const AMOUNT_TOLERANCE: f64 = 0.01;

const CURRENCY_NOISE: [char; 5] = ['Â', '£', '$', '€', ','];

/// Parse a loosely formatted amount. Unparseable input yields `0.0`.
#[must_use]
pub fn parse_amount(raw: &str) -> f64 {
    let cleaned: String = raw.chars().filter(|c| !CURRENCY_NOISE.contains(c)).collect();
    let cleaned = cleaned.trim();
    let digits = cleaned.strip_prefix('-').unwrap_or(cleaned);

    let mut seen_digit = false;
    let mut seen_dot = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return 0.0,
        }
    }
    if !seen_digit {
        return 0.0;
    }
    cleaned.parse::<f64>().unwrap_or(0.0)
}

/// Render an amount the way result files show it: `£12.30`, `£-5.00`.
#[must_use]
pub fn format_money(amount: f64) -> String {
    // Avoid rendering `£-0.00` for a negated zero.
    let amount = if amount == 0.0 { 0.0 } else { amount };
    format!("£{amount:.2}")
}

/// `true` when two totals are equal within [`AMOUNT_TOLERANCE`].
#[must_use]
pub fn amounts_match(expected: f64, extracted: f64) -> bool {
    (expected - extracted).abs() <= AMOUNT_TOLERANCE
}

#[cfg(test)]
#[path = "money_test.rs"]
mod tests;
