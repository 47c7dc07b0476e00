//! # tessera-sql
//!
//! Best-effort parsing of the SQL text an application hands to its database.
//!
//! - `statement_kind` / `classify`: statement kind and target table
//! - `apply_binds`: positional `?` substitution, run before any parsing
//! - `parse_set_clause` / `parse_values_list`: quote- and paren-aware splits
//! - `parse_update` / `parse_insert`: structural pieces for before/after images
//!
//! Nothing in this crate returns an error. Results carry a `ParseConfidence`
//! so callers can decide how much to trust them.

pub mod binds;
pub mod image;
pub mod literal;
pub mod statement;

pub use binds::apply_binds;
pub use image::{fields_from_row, mark_binary_fields};
pub use literal::{parse_set_clause, parse_values_list};
pub use statement::{
    classify, parse_insert, parse_update, statement_kind, Classification, InsertImage, UpdateParts,
};

/// How much of a statement the parser understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParseConfidence {
    /// Nothing recognisable; the table is empty.
    Unparsed,
    /// Table name only, no column data.
    TableOnly,
    /// Structure matched but no assignment could be read.
    Partial,
    /// Table and assignments were parsed.
    Full,
}
