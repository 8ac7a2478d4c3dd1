// src/source.rs

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use encoding_rs::{UTF_8, WINDOWS_1252};
use std::{
    borrow::Cow,
    collections::HashSet,
    fs,
    io::Cursor,
    path::Path,
};
use tracing::{debug, warn};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Cell texts read as missing, in addition to the empty string. Matched
/// exactly, case-sensitive.
const NA_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_missing(cell: &str) -> bool {
    cell.is_empty() || NA_TOKENS.contains(&cell)
}

/// One parsed CSV file, all values kept as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTable {
    pub file_name: String,
    /// Column names in header order, made unique.
    pub headers: Vec<String>,
    /// Data rows, each exactly `headers.len()` long. Empty cells are `None`.
    pub rows: Vec<Vec<Option<String>>>,
}

/// Read a CSV file from disk. UTF-8 is tried first; if the bytes are not
/// valid UTF-8 the file is decoded once more as Windows-1252.
#[tracing::instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_source<P: AsRef<Path>>(path: P) -> Result<SourceTable> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let text = decode(&bytes, &file_name);
    parse_csv(&file_name, &text)
}

fn decode<'a>(bytes: &'a [u8], file_name: &str) -> Cow<'a, str> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(body) {
        return text;
    }
    warn!(file = file_name, "not valid UTF-8, retrying as windows-1252");
    let (text, _had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
    text
}

/// Parse CSV text with a header row.
pub fn parse_csv(file_name: &str, text: &str) -> Result<SourceTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(text.as_bytes()));
    let mut records = rdr.records();

    let header = match records.next() {
        Some(rec) => rec.with_context(|| format!("CSV parse error in {} at header", file_name))?,
        None => bail!("No columns to parse from file {}", file_name),
    };
    let headers = unique_headers(header.iter());
    let width = headers.len();

    let mut rows = Vec::new();
    for (idx, result) in records.enumerate() {
        let record = result
            .with_context(|| format!("CSV parse error in {} at record {}", file_name, idx + 1))?;
        if record.len() > width {
            bail!(
                "Error tokenizing data in {}: expected {} fields in record {}, saw {}",
                file_name,
                width,
                idx + 1,
                record.len()
            );
        }
        let mut row: Vec<Option<String>> = record
            .iter()
            .map(|v| (!is_missing(v)).then(|| v.to_string()))
            .collect();
        row.resize(width, None);
        rows.push(row);
    }

    debug!(file = file_name, columns = width, rows = rows.len(), "parsed");
    Ok(SourceTable {
        file_name: file_name.to_string(),
        headers,
        rows,
    })
}

/// Name blank headers `Unnamed: <i>` and suffix repeats with `.1`, `.2`, ...
fn unique_headers<'a, I: Iterator<Item = &'a str>>(raw: I) -> Vec<String> {
    let names: Vec<String> = raw
        .enumerate()
        .map(|(i, h)| {
            if h.trim().is_empty() {
                format!("Unnamed: {}", i)
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut seen: HashSet<String> = HashSet::with_capacity(names.len());
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.clone();
        let mut n = 0;
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{}.{}", name, n);
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}
