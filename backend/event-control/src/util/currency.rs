//! ISO-4217 currency validation and normalization.

/// Currencies the payment gateway accepts for hosted checkout. Codes are
/// matched case-insensitively and normalized to uppercase.
const SUPPORTED: &[&str] = &[
    "AED", "AUD", "BGN", "BRL", "CAD", "CHF", "CNY", "CZK", "DKK", "EUR", "GBP", "HKD", "HUF",
    "IDR", "ILS", "INR", "JPY", "KES", "KRW", "MXN", "MYR", "NGN", "NOK", "NZD", "PHP", "PLN",
    "RON", "SAR", "SEK", "SGD", "THB", "TRY", "TWD", "USD", "VND", "ZAR",
];

/// Normalizes a currency code to uppercase ISO-4217, rejecting unknown codes.
pub fn normalize(code: &str) -> Option<String> {
    let trimmed = code.trim();
    if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let upper = trimmed.to_ascii_uppercase();
    SUPPORTED.contains(&upper.as_str()).then_some(upper)
}
