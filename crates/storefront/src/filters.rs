//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Renders a 0-5 rating as five filled or empty stars, rounding to the
/// nearest whole star.
///
/// Usage in templates: `{{ summary.average|stars }}`
#[askama::filter_fn]
pub fn stars(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(star_string(&value.to_string()))
}

fn star_string(value: &str) -> String {
    let rating = value.trim().parse::<f64>().unwrap_or(0.0).clamp(0.0, 5.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = rating.round() as usize;
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_string() {
        assert_eq!(star_string("4.6"), "★★★★★");
        assert_eq!(star_string("4.4"), "★★★★☆");
        assert_eq!(star_string("0"), "☆☆☆☆☆");
        assert_eq!(star_string("nope"), "☆☆☆☆☆");
        assert_eq!(star_string("9"), "★★★★★");
    }
}
