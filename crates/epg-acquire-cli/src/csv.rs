//! Minimal CSV reader for the channel directory exports (quotes, CRLF and
//! a UTF-8 BOM tolerated).

use std::collections::HashMap;
use std::mem::take;

/// Split `text` into rows of fields. Blank lines are dropped.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if matches!(chars.peek(), Some('"')) {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                push_row(&mut rows, take(&mut row));
            }
            _ => field.push(ch),
        }
    }

    // Trailing row without a final newline, even if a quote was left open.
    row.push(field);
    push_row(&mut rows, row);
    rows
}

fn push_row(rows: &mut Vec<Vec<String>>, row: Vec<String>) {
    if !(row.len() == 1 && row[0].is_empty()) {
        rows.push(row);
    }
}

/// Header-keyed records, like a dict reader. Short rows yield missing keys.
pub fn parse_records(text: &str) -> Vec<HashMap<String, String>> {
    let mut rows = parse_rows(text).into_iter();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let header: Vec<String> = header.into_iter().map(|h| h.trim().to_string()).collect();
    rows.map(|row| header.iter().cloned().zip(row).collect())
        .collect()
}
