//! Sensitive-data masking for logged payloads.
//!
//! Every request/response body is rewritten through a fixed, ordered rule
//! list before it is handed to any tracing sink. Masking runs
//! unconditionally -- the masked string is built before the log macro sees
//! it, so a token can never leak through a later-attached subscriber.

use std::sync::LazyLock;

use regex::{Captures, Regex};

const MASK: &str = "***MASKED***";

static FIELD_RULES: LazyLock<Vec<(Regex, String)>> = LazyLock::new(|| {
    // Vendor responses use SCREAMING_CASE keys, our own records snake_case.
    [
        "TOKEN",
        "PASSWORD",
        "password",
        "phone",
        "code",
        "access_token",
        "push_token",
        "authid",
        "authId",
    ]
    .iter()
    .map(|field| {
        let pattern = Regex::new(&format!(r#""{field}"\s*:\s*"[^"]*""#))
            .expect("static regex is valid");
        (pattern, format!(r#""{field}": "{MASK}""#))
    })
    .collect()
});

static BEARER_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Bearer\s+[A-Za-z0-9\-._~+/]+=*").expect("static regex is valid")
});

static USER_ID_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(USER_ID|user_id)"\s*:\s*"?(\d{3,})"?"#).expect("static regex is valid")
});

/// Rewrite `text` so that tokens, passwords, phone numbers, confirmation
/// codes and bearer values are unreadable, and user ids keep only their
/// last two digits.
pub fn mask_sensitive(text: &str) -> String {
    let mut masked = text.to_string();
    for (pattern, replacement) in FIELD_RULES.iter() {
        masked = pattern
            .replace_all(&masked, replacement.as_str())
            .into_owned();
    }
    masked = BEARER_RULE
        .replace_all(&masked, format!("Bearer {MASK}"))
        .into_owned();
    USER_ID_RULE
        .replace_all(&masked, |caps: &Captures<'_>| {
            let digits = &caps[2];
            let tail = &digits[digits.len().saturating_sub(2)..];
            format!(r#""{}": "***{tail}""#, &caps[1])
        })
        .into_owned()
}
