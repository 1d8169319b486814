//! Extraction of profile fields from the model's preference delta.
//!
//! The delta arrives as loose "label: value" lines. Each extractor matches
//! independently, so one malformed line never costs the others.

use std::sync::LazyLock;

use regex::Regex;

use crate::profile::PreferenceUpdate;

static BIRTH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)birth\s*date[:\s]+([0-9]{4}[-/.][0-9]{1,2}[-/.][0-9]{1,2})")
        .expect("valid regex")
});

static BIRTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:birth\s*year[:\s]+|born\s+in\s+)([0-9]{4})").expect("valid regex")
});

static GENDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)gender[:\s]+([^\n,;.]+)").expect("valid regex"));

static PERSONALITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)personality[:\s]+([^\n]+)").expect("valid regex"));

static IDENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)identity[:\s]+([^\n]+)").expect("valid regex"));

static OCCUPATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)occupation[:\s]+([^\n]+)").expect("valid regex"));

static AI_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ai\s*style[:\s]+([^\n]+)").expect("valid regex"));

fn captured(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .map(|cap| cap[1].trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Pull every recognized profile field out of `text`.
pub(crate) fn extract_preferences(text: &str) -> PreferenceUpdate {
    let mut update = PreferenceUpdate::new();
    update.birth_date = captured(&BIRTH_DATE, text);
    update.birth_year = captured(&BIRTH_YEAR, text).and_then(|year| year.parse().ok());
    update.gender = captured(&GENDER, text);
    update.personality = captured(&PERSONALITY, text);
    update.identity = captured(&IDENTITY, text);
    update.occupation = captured(&OCCUPATION, text);
    update.ai_style = captured(&AI_STYLE, text);
    update
}
