use rust_decimal::Decimal;

/// Render a raw minor-unit amount as a human-readable decimal string.
///
/// The raw amount is divided by `10^decimal_places` (skipped when zero) and
/// rendered with exactly `decimal_places` fractional digits, then the unit
/// is appended after a space when non-empty.
///
/// Arithmetic is exact decimal: `Decimal` holds any `i64` without rounding,
/// which binary floating point does not above 2^53.
///
/// ```
/// use tally_model::format_amount;
///
/// assert_eq!(format_amount(12345, 2, "EUR"), "123.45 EUR");
/// assert_eq!(format_amount(500, 0, ""), "500");
/// ```
pub fn format_amount(raw: i64, decimal_places: u32, unit: &str) -> String {
    // Decimal::new scales by 10^-decimal_places and Display keeps the scale,
    // so rendering already has exactly `decimal_places` fractional digits.
    // Past Decimal's scale cap the digits are placed directly instead;
    // there is no error condition for any `decimal_places`.
    let scaled = if decimal_places <= MAX_DECIMAL_SCALE {
        Decimal::new(raw, decimal_places).to_string()
    } else {
        scale_by_digits(raw, decimal_places)
    };
    if unit.is_empty() {
        scaled
    } else {
        format!("{scaled} {unit}")
    }
}

/// Largest scale `Decimal::new` accepts before panicking.
const MAX_DECIMAL_SCALE: u32 = 28;

/// Render `raw * 10^-decimal_places` by digit placement.
///
/// An `i64` has at most 19 digits, so every scale above the `Decimal` cap
/// yields a pure fraction, but the split handles any scale.
fn scale_by_digits(raw: i64, decimal_places: u32) -> String {
    let digits = raw.unsigned_abs().to_string();
    let places = decimal_places as usize;
    let sign = if raw < 0 { "-" } else { "" };
    if digits.len() > places {
        let (int_part, frac) = digits.split_at(digits.len() - places);
        format!("{sign}{int_part}.{frac}")
    } else {
        format!("{sign}0.{}{digits}", "0".repeat(places - digits.len()))
    }
}
