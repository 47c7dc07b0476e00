//! Before/after image normalisation.
//!
//! Values from known binary columns, and text containing control characters
//! other than whitespace, are stored as `FieldValue::Binary` so the JSON
//! payload stays valid whatever bytes the column held.

use tessera_contracts::value::{FieldMap, FieldValue, Row, SqlValue};

/// Columns whose contents are always binary.
pub const BINARY_COLUMNS: [&str; 2] = ["uuid", "drive_uuid"];

/// Convert a database row into an image, marking binary values.
pub fn fields_from_row(row: &Row) -> FieldMap {
    row.iter()
        .map(|(column, value)| {
            let field = match value {
                SqlValue::Null => FieldValue::Null,
                SqlValue::Blob(bytes) => FieldValue::Binary(bytes.clone()),
                other => FieldValue::Text(other.to_string()),
            };
            (column.clone(), field)
        })
        .map(|(column, field)| {
            let field = mark_binary(&column, field);
            (column, field)
        })
        .collect()
}

/// Mark binary-looking values of a parsed image in place.
pub fn mark_binary_fields(image: &mut FieldMap) {
    for (column, value) in image.iter_mut() {
        let current = std::mem::replace(value, FieldValue::Null);
        *value = mark_binary(column, current);
    }
}

fn mark_binary(column: &str, value: FieldValue) -> FieldValue {
    match value {
        FieldValue::Text(s) if BINARY_COLUMNS.contains(&column) || looks_binary(&s) => {
            FieldValue::Binary(s.into_bytes())
        }
        other => other,
    }
}

/// True when `s` holds a control character that is not whitespace.
pub fn looks_binary(s: &str) -> bool {
    s.chars().any(|c| c.is_control() && !c.is_whitespace())
}
