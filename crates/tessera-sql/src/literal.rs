//! Assignment and value-list parsing.
//!
//! Both parsers split on top-level commas only: commas inside quoted literals
//! or inside parentheses (function calls) never start a new item.

use lazy_static::lazy_static;
use regex::Regex;

use tessera_contracts::value::{FieldMap, FieldValue};

use crate::binds::unescape_string;

lazy_static! {
    static ref ASSIGNMENT: Regex = Regex::new(r"(?s)^`?(\w+)`?\s*=\s*(.+)$").unwrap();
    static ref NULLARY_CALL: Regex = Regex::new(r"^\w+\(\)$").unwrap();
    static ref HEX_LITERAL: Regex = Regex::new(r"^[xX]'((?:[0-9a-fA-F]{2})*)'$").unwrap();
}

/// Split `input` on commas that sit outside quotes and parentheses.
///
/// Items are trimmed. Backslash escapes inside a quoted literal are honoured,
/// so `'a\',b'` stays one item.
pub fn split_top_level(input: &str) -> Vec<String> {
    let input = input.replace("\r\n", "\n").replace('\r', "\n");
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth: i32 = 0;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                '(' => {
                    depth += 1;
                    current.push(c);
                }
                ')' => {
                    depth -= 1;
                    current.push(c);
                }
                ',' if depth == 0 => {
                    parts.push(current.trim().to_string());
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }

    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Characters of `sql` that sit outside quoted literals and backticked
/// identifiers, with their byte offsets. Quote characters are not yielded.
fn unquoted_chars(sql: &str) -> impl Iterator<Item = (usize, char)> + '_ {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    sql.char_indices().filter(move |&(_, c)| {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q != '`' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            return false;
        }
        if matches!(c, '\'' | '"' | '`') {
            quote = Some(c);
            return false;
        }
        true
    })
}

/// Byte offsets of the `?` placeholders outside quoted literals.
pub fn placeholder_offsets(sql: &str) -> Vec<usize> {
    unquoted_chars(sql).filter(|&(_, c)| c == '?').map(|(i, _)| i).collect()
}

/// Byte offset of the first whole-word `keyword` outside quoted literals,
/// matched case-insensitively.
pub fn find_unquoted_keyword(sql: &str, keyword: &str) -> Option<usize> {
    let bytes = sql.as_bytes();
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    unquoted_chars(sql).map(|(i, _)| i).find(|&i| {
        let end = i + keyword.len();
        sql.get(i..end).is_some_and(|w| w.eq_ignore_ascii_case(keyword))
            && (i == 0 || !is_word(bytes[i - 1]))
            && bytes.get(end).map_or(true, |&b| !is_word(b))
    })
}

/// Interpret one literal from SQL text.
///
/// `NULL` (any case) is null, a zero-argument call such as `NOW()` is kept
/// verbatim, `X'..'` hex literals become binary, and a single- or
/// double-quoted literal loses its quotes. Anything else is returned as-is.
pub fn parse_value_literal(raw: &str) -> FieldValue {
    let value = raw.trim();
    if value.eq_ignore_ascii_case("NULL") {
        return FieldValue::Null;
    }
    if NULLARY_CALL.is_match(value) {
        return FieldValue::text(value);
    }
    if let Some(caps) = HEX_LITERAL.captures(value) {
        if let Ok(bytes) = hex::decode(&caps[1]) {
            return FieldValue::Binary(bytes);
        }
    }
    if is_quoted(value) {
        return FieldValue::Text(unescape_string(&value[1..value.len() - 1]));
    }
    FieldValue::text(value)
}

fn is_quoted(value: &str) -> bool {
    value.len() >= 2
        && ((value.starts_with('\'') && value.ends_with('\''))
            || (value.starts_with('"') && value.ends_with('"')))
}

/// Parse `col = value, col2 = value2` into an ordered column map.
///
/// Parts that are not `column = value` are skipped.
pub fn parse_set_clause(set_clause: &str) -> FieldMap {
    let mut values = FieldMap::new();
    for part in split_top_level(set_clause) {
        if let Some(caps) = ASSIGNMENT.captures(&part) {
            let column = caps[1].trim_matches(|c| matches!(c, '`' | '\'' | '"' | ' '));
            values.insert(column.to_string(), parse_value_literal(&caps[2]));
        }
    }
    values
}

/// Parse the body of a `VALUES (...)` list into positional values.
pub fn parse_values_list(values: &str) -> Vec<FieldValue> {
    split_top_level(values)
        .iter()
        .map(|v| parse_value_literal(v))
        .collect()
}

/// Parse an insert column list, stripping quotes and backticks.
pub fn parse_column_list(columns: &str) -> Vec<String> {
    columns
        .split(',')
        .map(|c| c.trim_matches(|ch| matches!(ch, '`' | '\'' | '"' | ' ' | '\n' | '\t')).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── split_top_level ──────────────────────────────────────────────────────

    #[test]
    fn commas_inside_quotes_do_not_split() {
        let parts = split_top_level("a = 'x, y', b = \"1,2\", c = 3");
        assert_eq!(parts, vec!["a = 'x, y'", "b = \"1,2\"", "c = 3"]);
    }

    #[test]
    fn commas_inside_calls_do_not_split() {
        let parts = split_top_level("CONCAT('a', 'b'), NOW(), 5");
        assert_eq!(parts, vec!["CONCAT('a', 'b')", "NOW()", "5"]);
    }

    #[test]
    fn escaped_quote_stays_inside_literal() {
        let parts = split_top_level(r"'it\'s, fine', 2");
        assert_eq!(parts, vec![r"'it\'s, fine'", "2"]);
    }

    // ── unquoted scanning ────────────────────────────────────────────────────

    #[test]
    fn placeholders_inside_literals_are_not_counted() {
        let sql = r"SET body = 'Is BP ok?', note = 'it\'s ?', `we?ird` = ?, pid = ?";
        let offsets = placeholder_offsets(sql);
        assert_eq!(offsets.len(), 2);
        assert!(offsets.iter().all(|&i| &sql[i..i + 1] == "?"));
        assert_eq!(placeholder_offsets("a = 'x?' AND b = \"y?\""), Vec::<usize>::new());
    }

    #[test]
    fn keyword_search_skips_literals_and_longer_words() {
        let sql = "note = 'see WHERE below', nowhere = 1 where id = 2";
        let at = find_unquoted_keyword(sql, "WHERE").unwrap();
        assert_eq!(&sql[at..], "where id = 2");
        assert_eq!(find_unquoted_keyword("a = 'WHERE'", "WHERE"), None);
    }

    // ── literals ─────────────────────────────────────────────────────────────

    #[test]
    fn literal_kinds() {
        assert_eq!(parse_value_literal("null"), FieldValue::Null);
        assert_eq!(parse_value_literal("NOW()"), FieldValue::text("NOW()"));
        assert_eq!(parse_value_literal("'Jane'"), FieldValue::text("Jane"));
        assert_eq!(parse_value_literal("\"Jane\""), FieldValue::text("Jane"));
        assert_eq!(parse_value_literal("42"), FieldValue::text("42"));
        assert_eq!(parse_value_literal("X'00FF'"), FieldValue::Binary(vec![0x00, 0xff]));
        assert_eq!(parse_value_literal(r"'O\'Brien'"), FieldValue::text("O'Brien"));
        assert_eq!(parse_value_literal("''"), FieldValue::text(""));
    }

    #[test]
    fn calls_with_arguments_are_not_verbatim_calls() {
        // Only zero-argument calls are treated specially; others pass through raw.
        assert_eq!(parse_value_literal("DATE('2024-01-01')"), FieldValue::text("DATE('2024-01-01')"));
    }

    // ── set clause ───────────────────────────────────────────────────────────

    #[test]
    fn set_clause_keeps_order_and_strips_backticks() {
        let map = parse_set_clause("`fname` = 'Jane', lname='Doe, Jr.', mname = NULL, date = NOW()");
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["fname", "lname", "mname", "date"]);
        assert_eq!(map["lname"], FieldValue::text("Doe, Jr."));
        assert_eq!(map["mname"], FieldValue::Null);
        assert_eq!(map["date"], FieldValue::text("NOW()"));
    }

    #[test]
    fn malformed_parts_are_skipped() {
        let map = parse_set_clause("fname = 'Jane', garbage, = 3");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn values_list_and_columns() {
        let values = parse_values_list("'Clinic A', NULL, CONCAT('a', 'b'), 12");
        assert_eq!(values.len(), 4);
        assert_eq!(values[0], FieldValue::text("Clinic A"));
        assert_eq!(values[1], FieldValue::Null);
        assert_eq!(values[2], FieldValue::text("CONCAT('a', 'b')"));
        assert_eq!(parse_column_list("`name`, 'npi' , id"), vec!["name", "npi", "id"]);
    }
}
