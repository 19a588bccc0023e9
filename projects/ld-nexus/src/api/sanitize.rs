//! Cleanup of user-supplied free text before it is stored.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::error::{AppError, AppResult};

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<[^>]*>").expect("Invalid regex")
});

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+").expect("Invalid regex")
});

/// Maximum entries kept from a list field (skills, tags, ...).
pub const MAX_LIST_ITEMS: usize = 50;

/// Multi-line text: tags and control characters removed, newlines and tabs kept.
pub fn text(input: &str) -> String {
    let stripped = HTML_TAG.replace_all(input, "");
    stripped
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Single-line text: like [`text`], with every whitespace run collapsed to one space.
pub fn line(input: &str) -> String {
    WHITESPACE_RUN.replace_all(&text(input), " ").into_owned()
}

/// Optional single-line field; blank becomes `None`.
pub fn optional(input: Option<&str>) -> Option<String> {
    input.map(line).filter(|s| !s.is_empty())
}

/// Clean each entry, drop blanks and case-insensitive duplicates, cap the length.
pub fn list(items: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(|s| line(s))
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .take(MAX_LIST_ITEMS)
        .collect()
}

/// Sanitized required field: 400 when empty or longer than `max` characters.
pub fn required(field: &str, input: &str, max: usize, multiline: bool) -> AppResult<String> {
    let value = if multiline { text(input) } else { line(input) };
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} cannot be empty", field)));
    }
    check_len(field, &value, max)?;
    Ok(value)
}

pub fn check_len(field: &str, value: &str, max: usize) -> AppResult<()> {
    let len = value.chars().count();
    if len > max {
        return Err(AppError::Validation(format!(
            "{} exceeds {} characters (got {})",
            field, max, len
        )));
    }
    Ok(())
}
