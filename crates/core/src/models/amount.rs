//! Native-currency amount rendering.
//!
//! Amounts travel as integers in the smallest currency unit. These helpers
//! only exist to label market annotations and activity items; they never
//! feed back into any computation.

/// Decimals of every native currency the marketplace is deployed on.
pub const NATIVE_DECIMALS: u32 = 18;

/// Render an integer amount with `decimals` fractional digits.
///
/// Trailing zeros are trimmed but at least one fractional digit is kept,
/// so one whole unit renders as `"1.0"` and half a unit as `"0.5"`.
pub fn format_units(amount: u128, decimals: u32) -> String {
    if decimals == 0 {
        return format!("{amount}.0");
    }

    let width = decimals as usize;
    let (whole, digits) = match 10u128.checked_pow(decimals) {
        Some(base) => (amount / base, format!("{:0>width$}", amount % base)),
        // More than 38 decimals: every u128 is below one unit.
        None => (0, format!("{:0>width$}", amount)),
    };
    let digits = digits.trim_end_matches('0');

    if digits.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{digits}")
    }
}

/// Render an amount of the native currency (18 decimals).
pub fn format_native(amount: u128) -> String {
    format_units(amount, NATIVE_DECIMALS)
}

/// Render an amount of the native currency followed by its symbol.
pub fn format_with_symbol(amount: u128, symbol: &str) -> String {
    format!("{} {}", format_native(amount), symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn test_whole_and_fractional_amounts() {
        assert_eq!(format_native(ONE), "1.0");
        assert_eq!(format_native(ONE / 2), "0.5");
        assert_eq!(format_native(ONE / 5), "0.2");
        assert_eq!(format_native(12 * ONE + ONE / 4), "12.25");
    }

    #[test]
    fn test_zero_and_dust() {
        assert_eq!(format_native(0), "0.0");
        assert_eq!(format_native(1), "0.000000000000000001");
    }

    #[test]
    fn test_large_amounts_do_not_overflow() {
        let rendered = format_native(u128::MAX);
        assert!(rendered.starts_with("340282366920938463463.374607431768211455"));
    }

    #[test]
    fn test_other_decimals() {
        assert_eq!(format_units(1_500_000, 6), "1.5");
        assert_eq!(format_units(7, 0), "7.0");
    }

    #[test]
    fn test_symbol_suffix() {
        assert_eq!(format_with_symbol(ONE, "SEI"), "1.0 SEI");
    }
}
