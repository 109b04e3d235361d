//! Canonical weekday handling.
//!
//! The scheduling UI and the external store carry weekday names in Portuguese
//! or English, with or without diacritics, and occasionally as numeric day
//! codes (0 and 7 both mean Sunday). Everything funnels through
//! [`canonical_weekday`] so the rest of the cell only ever compares canonical
//! English tokens.

use chrono::Weekday;

/// Canonical tokens in Monday-first order, matching the store's display order.
pub const CANONICAL_WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Map any supported weekday representation to its canonical English token.
///
/// Unrecognized input comes back as the cleaned key unchanged; callers that
/// need a hard guarantee should check [`is_known_weekday`] first. Idempotent:
/// canonical tokens map to themselves.
pub fn canonical_weekday(raw: &str) -> String {
    let cleaned = clean_key(raw);
    match lookup(&cleaned) {
        Some(token) => token.to_string(),
        None => cleaned,
    }
}

/// Whether the input maps to one of the seven canonical tokens.
pub fn is_known_weekday(raw: &str) -> bool {
    lookup(&clean_key(raw)).is_some()
}

/// Canonical token for a calendar weekday.
pub fn weekday_token(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Position of a canonical token in Monday-first order; unknown tokens sort last.
pub fn weekday_order(token: &str) -> usize {
    CANONICAL_WEEKDAYS
        .iter()
        .position(|candidate| *candidate == token)
        .unwrap_or(CANONICAL_WEEKDAYS.len())
}

fn clean_key(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(fold_diacritic)
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        _ => c,
    }
}

fn lookup(cleaned: &str) -> Option<&'static str> {
    let token = match cleaned {
        "segunda" | "segundafeira" | "monday" | "1" => "monday",
        "terca" | "tercafeira" | "tuesday" | "2" => "tuesday",
        "quarta" | "quartafeira" | "wednesday" | "3" => "wednesday",
        "quinta" | "quintafeira" | "thursday" | "4" => "thursday",
        "sexta" | "sextafeira" | "friday" | "5" => "friday",
        "sabado" | "saturday" | "6" => "saturday",
        "domingo" | "sunday" | "0" | "7" => "sunday",
        _ => return None,
    };
    Some(token)
}
