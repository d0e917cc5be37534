//! Number formatting for report output
//!
//! Amounts are shown with two decimals (banker's rounding) and `,` as the
//! thousands separator. Ratios and rates are shown as percentages.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round to two decimals, half to even
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Core formatting function with full control over output.
///
/// # Arguments
/// * `value` - The decimal value to format
/// * `width` - Minimum width for padding (0 for no padding, right-aligned)
///
/// # Examples
/// ```
/// use tally::utils::format_amount_with_width;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_amount_with_width(dec!(1234.56), 0), "1,234.56");
/// assert_eq!(format_amount_with_width(dec!(1234), 12), "    1,234.00");
/// ```
pub fn format_amount_with_width(value: Decimal, width: usize) -> String {
    let rounded = round_amount(value);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };

    let formatted = format!("{:.2}", rounded.abs());
    let (integer_part, decimal_part) = formatted
        .split_once('.')
        .unwrap_or((formatted.as_str(), "00"));

    let digits: Vec<char> = integer_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    let result = format!("{}{}.{}", sign, grouped, decimal_part);
    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

/// Format an amount: "1,234.56"
///
/// # Examples
/// ```
/// use tally::utils::format_amount;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_amount(dec!(1234.56)), "1,234.56");
/// assert_eq!(format_amount(dec!(-500)), "-500.00");
/// ```
pub fn format_amount(value: Decimal) -> String {
    format_amount_with_width(value, 0)
}

/// Format a ratio as a percentage with two decimals: 0.1234 -> "12.34%"
///
/// # Examples
/// ```
/// use tally::utils::format_percent;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_percent(dec!(0.1234)), "12.34%");
/// assert_eq!(format_percent(dec!(-0.05)), "-5.00%");
/// ```
pub fn format_percent(ratio: Decimal) -> String {
    let rounded = round_amount(ratio * Decimal::ONE_HUNDRED);
    if rounded.is_zero() {
        return "0.00%".to_string();
    }
    format!("{:.2}%", rounded)
}

/// Quantities keep their own precision, without trailing zeros
pub fn format_quantity(value: Decimal) -> String {
    value.normalize().to_string()
}
