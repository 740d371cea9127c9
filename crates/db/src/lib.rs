pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use fixtures::{FareSeedDataset, SeedMasterInfo, SeedResult, VerificationResult};
pub use repositories::{InMemoryRateCatalog, RepositoryError, SqlRateCatalog};
