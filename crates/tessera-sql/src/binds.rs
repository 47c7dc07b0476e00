//! Positional bind substitution.

use tessera_contracts::value::SqlValue;

use crate::literal::placeholder_offsets;

/// Replace each `?` in `sql` with the literal form of the matching bind.
///
/// Empty strings become `''`, nulls `NULL`, numeric values are inserted
/// bare, blobs as `X'..'` hex literals, and everything else is quoted with
/// MySQL-style backslash escaping. A `?` inside a quoted literal is text,
/// not a placeholder. Placeholders beyond the end of `binds` are left as `?`.
pub fn apply_binds(sql: &str, binds: &[SqlValue]) -> String {
    if binds.is_empty() {
        return sql.to_string();
    }

    let mut out = String::with_capacity(sql.len() + binds.len() * 8);
    let mut copied = 0;
    for (offset, value) in placeholder_offsets(sql).into_iter().zip(binds) {
        out.push_str(&sql[copied..offset]);
        out.push_str(&render(value));
        copied = offset + 1;
    }
    out.push_str(&sql[copied..]);
    out
}

fn render(value: &SqlValue) -> String {
    match value {
        SqlValue::Text(s) if s.is_empty() => "''".to_string(),
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Text(s) if value.is_numeric() => s.trim().to_string(),
        SqlValue::Text(s) => format!("'{}'", escape_string(s)),
        other => other.to_string(),
    }
}

/// Escape a string for inclusion between single quotes.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out
}

/// Reverse `escape_string` on the body of a quoted literal.
pub(crate) fn unescape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('Z') => out.push('\x1a'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_render_by_type() {
        let sql = "INSERT INTO t (a, b, c, d, e) VALUES (?, ?, ?, ?, ?)";
        let binds = [
            SqlValue::from(""),
            SqlValue::Null,
            SqlValue::from("42"),
            SqlValue::Integer(7),
            SqlValue::from("O'Brien"),
        ];
        assert_eq!(
            apply_binds(sql, &binds),
            r"INSERT INTO t (a, b, c, d, e) VALUES ('', NULL, 42, 7, 'O\'Brien')"
        );
    }

    #[test]
    fn blob_binds_render_as_hex_literal() {
        let out = apply_binds("UPDATE t SET uuid = ?", &[SqlValue::Blob(vec![0xde, 0xad])]);
        assert_eq!(out, "UPDATE t SET uuid = X'DEAD'");
    }

    #[test]
    fn surplus_placeholders_are_kept() {
        assert_eq!(apply_binds("a = ? AND b = ?", &[SqlValue::Integer(1)]), "a = 1 AND b = ?");
        assert_eq!(apply_binds("a = ?", &[]), "a = ?");
    }

    #[test]
    fn question_marks_in_literals_are_not_placeholders() {
        let out = apply_binds(
            "INSERT INTO pnotes SET body = 'Is BP ok?', title = \"why?\", pid = ?",
            &[SqlValue::Integer(42)],
        );
        assert_eq!(out, "INSERT INTO pnotes SET body = 'Is BP ok?', title = \"why?\", pid = 42");
    }

    #[test]
    fn bound_values_containing_question_marks_are_not_rebound() {
        let out = apply_binds("UPDATE t SET a = ?, b = ?", &[SqlValue::from("who?"), SqlValue::Integer(1)]);
        assert_eq!(out, "UPDATE t SET a = 'who?', b = 1");
    }

    #[test]
    fn escape_round_trips() {
        let raw = "line1\nit's \"quoted\" \\ done";
        assert_eq!(unescape_string(&escape_string(raw)), raw);
    }
}
