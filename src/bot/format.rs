//! Pure display helpers for byte counts, dates and currencies.

use chrono::DateTime;

/// Convert a byte count to gigabytes, rounded to two decimals.
pub fn bytes_to_gb(bytes: u64) -> f64 {
    let gb = bytes as f64 / (1024.0 * 1024.0 * 1024.0);
    (gb * 100.0).round() / 100.0
}

/// Format a Unix timestamp as a UTC calendar date (`YYYY-MM-DD`).
pub fn format_date(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// Format a Unix timestamp as Beijing (UTC+8) wall-clock time.
///
/// Adds the offset the absolute-time parser subtracted, so a parsed
/// input string round-trips through this formatter unchanged.
pub fn format_beijing(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp + 8 * 3600, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// Display symbol for a currency code.
pub fn currency_symbol(code: &str) -> &str {
    match code {
        "USD" => "$",
        "EUR" => "€",
        "CAD" => "C$",
        "CNY" => "¥",
        other => other,
    }
}

/// Chinese display name for a currency code.
pub fn currency_name(code: &str) -> &str {
    match code {
        "USD" => "美元",
        "EUR" => "欧元",
        "CAD" => "加元",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_gb_exact() {
        assert_eq!(bytes_to_gb(1024 * 1024 * 1024), 1.0);
        assert_eq!(bytes_to_gb(10 * 1024 * 1024 * 1024), 10.0);
    }

    #[test]
    fn test_bytes_to_gb_rounds_to_two_decimals() {
        // 1.5 GiB exactly
        assert_eq!(bytes_to_gb(1024 * 1024 * 1024 * 3 / 2), 1.5);
        // 1 GB (decimal) is 0.9313... GiB, rounds to 0.93
        assert_eq!(bytes_to_gb(1_000_000_000), 0.93);
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(0), "1970-01-01");
        assert_eq!(format_date(1_704_067_200), "2024-01-01");
    }

    #[test]
    fn test_format_beijing_adds_offset() {
        assert_eq!(format_beijing(0), "1970-01-01 08:00");
        // 2024-01-01 00:00 UTC is 08:00 in Beijing
        assert_eq!(format_beijing(1_704_067_200), "2024-01-01 08:00");
    }

    #[test]
    fn test_currency_symbols() {
        assert_eq!(currency_symbol("USD"), "$");
        assert_eq!(currency_symbol("EUR"), "€");
        assert_eq!(currency_symbol("CAD"), "C$");
        assert_eq!(currency_symbol("CNY"), "¥");
        assert_eq!(currency_symbol("GBP"), "GBP");
    }

    #[test]
    fn test_currency_names() {
        assert_eq!(currency_name("USD"), "美元");
        assert_eq!(currency_name("JPY"), "JPY");
    }
}
