//! Policy-free data access. Every function takes a `&Connection` so callers
//! can compose several of them inside one [`Database::with_tx`](crate::Database::with_tx).

pub mod banned;
pub mod exchange;
pub mod participants;

use anyhow::Result;

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
