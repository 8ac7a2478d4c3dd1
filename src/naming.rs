// src/naming.rs

use std::path::Path;

const STRIP_PREFIX: &str = "olist_";
const STRIP_SUFFIX: &str = "_dataset";
const TABLE_SUFFIX: &str = "_table";

/// Map a source file name to its target table name:
/// `olist_orders_dataset.csv` → `orders_table`.
pub fn table_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let mut base = stem.to_lowercase();

    if let Some(rest) = base.strip_prefix(STRIP_PREFIX) {
        base = rest.to_string();
    }
    if let Some(rest) = base.strip_suffix(STRIP_SUFFIX) {
        base = rest.to_string();
    }
    base.push_str(TABLE_SUFFIX);
    base
}
