//! Numeric coercion for heterogeneous table cells
//!
//! Profit and quantity columns arrive as a mix of numbers, blanks and
//! currency-formatted text (`₺1.250,00`, `350 TL`). Every derived total in
//! the workbench goes through [`coerce`] so that a malformed cell can never
//! abort a computation.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::Cell;

const CURRENCY_GLYPH: char = '₺';
const CURRENCY_CODE: &str = "TL";

/// Coerce a cell to a finite real, falling back to `default`
pub fn coerce(cell: &Cell, default: f64) -> f64 {
    coerce_opt(cell).unwrap_or(default)
}

/// Coerce a cell to a finite real; `None` wherever [`coerce`] would use its default
pub fn coerce_opt(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Missing => None,
        Cell::Number(n) => n.is_finite().then_some(*n),
        Cell::Text(s) => parse_amount(s),
    }
}

/// Parse a currency-formatted amount.
///
/// The lira glyph and the `TL` code are stripped along with surrounding
/// whitespace, then separators are normalized: when both `.` and `,` appear
/// the dots are thousand separators (`1.250,00`), otherwise a comma is the
/// decimal point. Whitespace inside the number is not a separator.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let without_currency = raw
        .trim()
        .replace(CURRENCY_GLYPH, "")
        .replace(CURRENCY_CODE, "");
    let cleaned = without_currency.trim();

    if cleaned.is_empty() {
        return None;
    }

    let normalized = if cleaned.contains('.') && cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned.replace(',', ".")
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Round a monetary amount to two decimals (banker's rounding)
pub fn round_money(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven))
        .and_then(|d| d.to_f64())
        // Outside Decimal's range an f64 has no fractional digits left.
        .unwrap_or(value)
}

/// Render an amount the way the dashboard shows it: `₺1.250,00`
pub fn format_currency(value: f64) -> String {
    let rounded = round_money(value);
    let (negative, plain) = match Decimal::from_f64(rounded) {
        Some(d) => (d.is_sign_negative() && !d.is_zero(), format!("{:.2}", d.abs())),
        None => (rounded < 0.0, format!("{:.2}", rounded.abs())),
    };
    let sign = if negative { "-" } else { "" };
    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("{}{}{},{}", sign, CURRENCY_GLYPH, grouped, frac_part)
}
