//! ZIP code join keys.
//!
//! ZCTA identifiers are five-digit strings. Leading zeros matter, so every
//! table is keyed by the normalized string form and never by a number.

/// Normalizes a raw ZIP/ZCTA cell into its canonical five-digit form.
///
/// Trims whitespace, drops a trailing `.0` left behind by numeric coercion in
/// upstream tools, and left-pads short all-digit codes with zeros. Anything
/// that is not purely digits is returned trimmed but otherwise unchanged.
pub fn normalize_zip(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix(".0").unwrap_or(trimmed);

    if !trimmed.is_empty() && trimmed.len() < 5 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        format!("{trimmed:0>5}")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_five_digit_codes() {
        assert_eq!(normalize_zip("90001"), "90001");
        assert_eq!(normalize_zip(" 90001 "), "90001");
    }

    #[test]
    fn restores_leading_zeros() {
        assert_eq!(normalize_zip("1001"), "01001");
        assert_eq!(normalize_zip("601"), "00601");
    }

    #[test]
    fn strips_float_suffix() {
        assert_eq!(normalize_zip("90210.0"), "90210");
        assert_eq!(normalize_zip("2108.0"), "02108");
    }

    #[test]
    fn leaves_non_numeric_values_alone() {
        assert_eq!(normalize_zip("nan"), "nan");
        assert_eq!(normalize_zip(""), "");
    }
}
