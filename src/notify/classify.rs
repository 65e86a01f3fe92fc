//! Statement classification for change tracking.
//!
//! A statement is a mutation when its leading keyword is on the allow-list
//! below. Leading whitespace, opening parentheses and SQL comments are
//! skipped. Anything else (SELECT, WITH, PRAGMA, BEGIN/COMMIT, ...) is not a
//! mutation, even if it would write.

use regex::Regex;
use std::sync::LazyLock;

pub const MUTATION_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "REPLACE", "CREATE", "ALTER", "DROP", "TRUNCATE", "RENAME",
];

static LEADING_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^(?:\s|\(|--[^\n]*(?:\n|$)|/\*.*?\*/)*([a-z]+)")
        .expect("leading keyword pattern")
});

static TARGET_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(?:INTO|UPDATE|FROM|TABLE|INDEX)\s+(?:OR\s+[a-z]+\s+)?(?:IF\s+(?:NOT\s+)?EXISTS\s+)?["`\[]?([a-z_][a-z0-9_]*)"#,
    )
    .expect("target table pattern")
});

/// First keyword of the statement, upper-cased.
pub fn leading_keyword(sql: &str) -> Option<String> {
    LEADING_KEYWORD
        .captures(sql)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
}

pub fn is_mutation(sql: &str) -> bool {
    leading_keyword(sql).is_some_and(|kw| MUTATION_KEYWORDS.contains(&kw.as_str()))
}

/// Row-level statements. SQLite leaves its change counter untouched for
/// schema statements, so only these report a meaningful row count.
pub const ROW_KEYWORDS: &[&str] = &["INSERT", "UPDATE", "DELETE", "REPLACE"];

pub fn reports_row_changes(sql: &str) -> bool {
    leading_keyword(sql).is_some_and(|kw| ROW_KEYWORDS.contains(&kw.as_str()))
}

/// Short human-readable reason for a mutation, e.g. `insert customers`.
pub fn describe(sql: &str) -> String {
    let kw = leading_keyword(sql)
        .map(|k| k.to_ascii_lowercase())
        .unwrap_or_else(|| "statement".to_string());
    match TARGET_TABLE.captures(sql).and_then(|c| c.get(1)) {
        Some(t) => format!("{} {}", kw, t.as_str()),
        None => kw,
    }
}
