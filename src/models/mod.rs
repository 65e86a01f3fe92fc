//! Domain rows. Column mapping lives next to each type.

pub mod customer;
pub mod item;
pub mod lookup;
pub mod project;
pub mod role;
pub mod task;
pub mod time_record;
pub mod user;

/// Conversion failure for a TEXT column holding an unknown enum value.
pub(crate) fn bad_enum(column: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        format!("invalid {column}: {value}").into(),
    )
}
