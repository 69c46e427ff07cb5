//! Identifier normalization for phone numbers and email addresses.
//!
//! Messages.db stores handle ids inconsistently (with/without country code,
//! with/without `+`), so matching works on a candidate set instead of a single
//! canonical string.
//!
//! CHANGELOG:
//! - 10/19/2026 - Candidate phone forms, phone query classification

use regex::Regex;
use std::sync::OnceLock;

/// Minimum digit count for a usable phone number.
pub const MIN_PHONE_DIGITS: usize = 10;

/// Strip everything except ASCII digits.
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Expand a raw phone number into every form the store might use.
///
/// Returns an empty list when fewer than [`MIN_PHONE_DIGITS`] digits remain.
/// Order is `digits`, `+digits`, `+1digits`, duplicates removed.
pub fn normalize_phone(raw: &str) -> Vec<String> {
    let digits = digits_only(raw);
    if digits.len() < MIN_PHONE_DIGITS {
        return Vec::new();
    }

    let mut forms = vec![
        digits.clone(),
        format!("+{}", digits),
        format!("+1{}", digits),
    ];
    if digits.len() == MIN_PHONE_DIGITS {
        forms.push(format!("+1{}", digits));
    }

    let mut seen = std::collections::HashSet::new();
    forms.retain(|f| seen.insert(f.clone()));
    forms
}

/// Canonical email identifier: trimmed and lowercased.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn phone_query_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?\d+$").expect("static regex"))
}

/// Whether a free-form query should be treated as a phone number.
///
/// Common separators (spaces, dashes, dots, parentheses) are ignored, so
/// `+1 (555) 123-4567` counts as a phone query.
pub fn looks_like_phone(query: &str) -> bool {
    let compact: String = query
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    phone_query_re().is_match(&compact)
}
