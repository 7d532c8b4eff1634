//! G-code number formatting
//!
//! Every number written back into a rewritten stream goes through
//! [`format_number`] so that output is stable and diffable between runs:
//! fixed precision, leading and trailing zeros trimmed, and the literal
//! `0.000` for zero.

/// Decimal places used for X/Y/Z coordinates and speeds
pub const POSITION_PRECISION: usize = 3;

/// Decimal places used for extrusion amounts
pub const EXTRUSION_PRECISION: usize = 5;

const ZERO: &str = "0.000";

/// Format a value with a fixed number of decimals, trimming zeros
///
/// * `value` - Value to format
/// * `precision` - Number of decimal places before trimming
///
/// `0.8` at precision 5 becomes `.8`, `10.0` at precision 3 becomes `10.`.
pub fn format_number(value: f64, precision: usize) -> String {
    if value == 0.0 {
        return ZERO.to_string();
    }

    let fixed = format!("{:.*}", precision, value);

    // Rounds to zero at this precision
    if fixed
        .trim_start_matches('-')
        .chars()
        .all(|c| c == '0' || c == '.')
    {
        return ZERO.to_string();
    }

    fixed.trim_matches('0').to_string()
}

/// Format an X/Y/Z coordinate
pub fn format_position(value: f64) -> String {
    format_number(value, POSITION_PRECISION)
}

/// Format an extrusion amount
pub fn format_extrusion(value: f64) -> String {
    format_number(value, EXTRUSION_PRECISION)
}

/// Format a feed rate (mm/min) as an integer
pub fn format_feed_rate(value: f64) -> String {
    format!("{}", value.trunc() as i64)
}
