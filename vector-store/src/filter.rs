use log::warn;
use serde::{Deserialize, Serialize};

/// A single equality predicate on a payload field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub field: String,
    pub value: String,
}

/// Backend-neutral filter AST shared by point search and scroll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// The condition must match
    Must(FieldCondition),
    /// The condition must not match
    MustNot(FieldCondition),
    /// At least one condition must match
    Any(Vec<FieldCondition>),
}

impl Filter {
    /// Evaluate the filter against a payload, where `lookup` resolves a
    /// field name to its canonical string value (None when absent).
    pub fn matches<F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        let check = |condition: &FieldCondition| {
            lookup(&condition.field).is_some_and(|value| value == condition.value)
        };
        match self {
            Filter::Must(condition) => check(condition),
            Filter::MustNot(condition) => !check(condition),
            Filter::Any(conditions) => conditions.iter().any(check),
        }
    }
}

/// Parse a filter expression into the filter AST.
///
/// Recognized forms (keywords case-insensitive, values optionally single- or
/// double-quoted):
///
/// - `field in [v1, v2, ...]`
/// - `field == value`
/// - `field != value`
///
/// Anything else yields `None` with a warning; an unparseable filter is
/// never an error, the search just runs unfiltered.
pub fn parse_filter(expr: &str) -> Option<Filter> {
    let filter = try_parse(expr.trim());
    if filter.is_none() && !expr.trim().is_empty() {
        warn!("unrecognized filter expression '{expr}'; searching without a filter");
    }
    filter
}

fn try_parse(expr: &str) -> Option<Filter> {
    if let Some(index) = expr.find("!=") {
        let condition = parse_comparison(&expr[..index], &expr[index + 2..])?;
        return Some(Filter::MustNot(condition));
    }
    if let Some(index) = expr.find("==") {
        let condition = parse_comparison(&expr[..index], &expr[index + 2..])?;
        return Some(Filter::Must(condition));
    }
    parse_membership(expr)
}

fn parse_comparison(field: &str, value: &str) -> Option<FieldCondition> {
    let field = parse_field(field)?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some(FieldCondition {
        field,
        value: unquote(value),
    })
}

/// `field in [v1, v2, ...]`
fn parse_membership(expr: &str) -> Option<Filter> {
    let mut parts = expr.splitn(3, char::is_whitespace);
    let field = parse_field(parts.next()?)?;
    if !parts.next()?.eq_ignore_ascii_case("in") {
        return None;
    }
    let list = parts.next()?.trim();
    let inner = list.strip_prefix('[')?.strip_suffix(']')?;

    let values: Vec<String> = inner
        .split(',')
        .map(|value| unquote(value.trim()))
        .filter(|value| !value.is_empty())
        .collect();
    if values.is_empty() {
        return None;
    }

    Some(Filter::Any(
        values
            .into_iter()
            .map(|value| FieldCondition {
                field: field.clone(),
                value,
            })
            .collect(),
    ))
}

/// Field names match `[A-Za-z_][A-Za-z0-9_]*`
fn parse_field(raw: &str) -> Option<String> {
    let field = raw.trim();
    let mut chars = field.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Some(field.to_string())
    } else {
        None
    }
}

/// Strip one layer of matching single or double quotes
fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if value.len() >= 2 {
        let first = bytes[0];
        let last = bytes[value.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn condition(field: &str, value: &str) -> FieldCondition {
        FieldCondition {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_membership_list() {
        let filter = parse_filter("fileExtension in [\".ts\", \".py\"]").unwrap();
        assert_eq!(
            filter,
            Filter::Any(vec![
                condition("fileExtension", ".ts"),
                condition("fileExtension", ".py"),
            ])
        );
    }

    #[test]
    fn test_membership_keyword_is_case_insensitive() {
        let filter = parse_filter("language IN ['rust']").unwrap();
        assert_eq!(filter, Filter::Any(vec![condition("language", "rust")]));
    }

    #[test]
    fn test_equality() {
        let filter = parse_filter("status == \"active\"").unwrap();
        assert_eq!(filter, Filter::Must(condition("status", "active")));

        let unspaced = parse_filter("status==active").unwrap();
        assert_eq!(unspaced, Filter::Must(condition("status", "active")));
    }

    #[test]
    fn test_negated_equality() {
        let filter = parse_filter("status != \"archived\"").unwrap();
        assert_eq!(filter, Filter::MustNot(condition("status", "archived")));
    }

    #[test]
    fn test_single_quotes() {
        let filter = parse_filter("lang == 'rust'").unwrap();
        assert_eq!(filter, Filter::Must(condition("lang", "rust")));
    }

    #[test]
    fn test_garbage_yields_none() {
        assert_eq!(parse_filter("garbage expression"), None);
        assert_eq!(parse_filter(""), None);
        assert_eq!(parse_filter("in [1, 2]"), None);
        assert_eq!(parse_filter("1field == x"), None);
    }

    #[test]
    fn test_empty_list_yields_none() {
        assert_eq!(parse_filter("ext in []"), None);
    }

    #[test]
    fn test_matches_must() {
        let filter = parse_filter("fileExtension == .rs").unwrap();
        assert!(filter.matches(|field| match field {
            "fileExtension" => Some(".rs".to_string()),
            _ => None,
        }));
        assert!(!filter.matches(|_| None));
    }

    #[test]
    fn test_matches_must_not() {
        let filter = parse_filter("status != archived").unwrap();
        assert!(filter.matches(|_| Some("active".to_string())));
        assert!(!filter.matches(|_| Some("archived".to_string())));
        // Absent field cannot equal the value, so the negation holds
        assert!(filter.matches(|_| None));
    }

    #[test]
    fn test_matches_any() {
        let filter = parse_filter("ext in [.ts, .py]").unwrap();
        assert!(filter.matches(|_| Some(".py".to_string())));
        assert!(!filter.matches(|_| Some(".rs".to_string())));
    }
}
