use std::convert::TryFrom;

/// Read a non-negative INTEGER column as `usize`.
pub fn to_usize(value: i64, column: usize) -> rusqlite::Result<usize> {
    usize::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(column, value))
}
