use thiserror::Error;

use haulrate_core::errors::CatalogError;

pub mod memory;
pub mod rate;

pub use memory::InMemoryRateCatalog;
pub use rate::SqlRateCatalog;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for CatalogError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => CatalogError::Unavailable(error.to_string()),
            RepositoryError::Decode(message) => CatalogError::Decode(message),
        }
    }
}
