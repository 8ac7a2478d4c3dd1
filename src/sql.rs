// src/sql.rs
//
// Statement text for the load. Values are inlined as literals, so every
// value goes through `encode_value` and every identifier through
// `quote_ident`; nothing else in the crate builds SQL.

use std::borrow::Cow;

/// Double-quote an identifier, doubling any embedded `"`.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Render one cell as a SQL literal: `NULL` for a missing value,
/// otherwise a single-quoted string with embedded `'` doubled.
pub fn encode_value(value: Option<&str>) -> Cow<'static, str> {
    match value {
        None => Cow::Borrowed("NULL"),
        Some(v) => Cow::Owned(format!("'{}'", v.replace('\'', "''"))),
    }
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(table))
}

pub fn create_table(table: &str, columns: &[String]) -> String {
    let defs = columns
        .iter()
        .map(|c| format!("{} TEXT", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", quote_ident(table), defs)
}

/// One multi-row INSERT for `rows`. Callers never pass an empty batch.
pub fn insert_batch(table: &str, columns: &[String], rows: &[Vec<Option<String>>]) -> String {
    let cols = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!("INSERT INTO {} ({}) VALUES ", quote_ident(table), cols);
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for (j, value) in row.iter().enumerate() {
            if j > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&encode_value(value.as_deref()));
        }
        sql.push(')');
    }
    sql
}
