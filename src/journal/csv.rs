//! Minimal CSV framing for the event log.
//!
//! Fields containing a comma, quote, or line break are wrapped in double
//! quotes with embedded quotes doubled. Rows end with `\n`; `\r\n` is accepted
//! when reading.

/// Encode one row, terminator included.
pub(super) fn encode_row(fields: &[&str]) -> String {
    let mut row = String::new();
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            row.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            row.push('"');
            row.push_str(&field.replace('"', "\"\""));
            row.push('"');
        } else {
            row.push_str(field);
        }
    }
    row.push('\n');
    row
}

/// Split a whole file into rows of fields.
///
/// Blank lines are skipped. A quoted field left open at end of input keeps
/// whatever text it collected.
pub(super) fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(ch),
            }
            continue;
        }
        match ch {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => finish_row(&mut rows, &mut row, &mut field),
            _ => field.push(ch),
        }
    }
    finish_row(&mut rows, &mut row, &mut field);
    rows
}

fn finish_row(rows: &mut Vec<Vec<String>>, row: &mut Vec<String>, field: &mut String) {
    if row.is_empty() && field.is_empty() {
        return;
    }
    row.push(std::mem::take(field));
    rows.push(std::mem::take(row));
}
