//! Quoting helpers for building PostgreSQL text.

use crate::error::QueryError;

const RESERVED_WORDS: &[&str] = &[
    "all",
    "analyse",
    "analyze",
    "and",
    "any",
    "array",
    "as",
    "asc",
    "asymmetric",
    "both",
    "case",
    "cast",
    "check",
    "collate",
    "column",
    "constraint",
    "create",
    "current_catalog",
    "current_date",
    "current_role",
    "current_time",
    "current_timestamp",
    "current_user",
    "default",
    "deferrable",
    "desc",
    "distinct",
    "do",
    "else",
    "end",
    "except",
    "false",
    "fetch",
    "for",
    "foreign",
    "from",
    "grant",
    "group",
    "having",
    "in",
    "initially",
    "intersect",
    "into",
    "lateral",
    "leading",
    "limit",
    "localtime",
    "localtimestamp",
    "not",
    "null",
    "offset",
    "on",
    "only",
    "or",
    "order",
    "placing",
    "primary",
    "references",
    "returning",
    "select",
    "session_user",
    "some",
    "symmetric",
    "table",
    "then",
    "to",
    "trailing",
    "true",
    "union",
    "unique",
    "user",
    "using",
    "variadic",
    "when",
    "where",
    "window",
    "with",
];

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$')
}

/// Quotes an identifier unless it can be written bare.
pub fn quote_ident(name: &str) -> String {
    if is_plain_identifier(name) && !RESERVED_WORDS.contains(&name) {
        return name.to_string();
    }
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes a string literal, switching to the `E''` form when backslashes occur.
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\'', "''");
    if escaped.contains('\\') {
        format!("E'{}'", escaped.replace('\\', "\\\\"))
    } else {
        format!("'{escaped}'")
    }
}

pub fn number(value: f64) -> Result<String, QueryError> {
    if !value.is_finite() {
        return Err(QueryError::NonFiniteNumber(value));
    }
    Ok(format!("{value}"))
}

/// Renders a `table` parameter. Lowercase `table` or `schema.table` names go
/// through [`quote_ident`] part by part; anything else is a query fragment and
/// is kept as written.
pub fn table_reference(table: &str) -> String {
    let trimmed = table.trim();
    let parts: Vec<&str> = trimmed.split('.').collect();
    let is_name = parts.len() <= 2 && parts.iter().all(|part| is_plain_identifier(part));
    if !is_name {
        return table.to_string();
    }
    parts
        .iter()
        .map(|part| quote_ident(part))
        .collect::<Vec<_>>()
        .join(".")
}
