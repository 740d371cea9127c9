use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::parser::ParsedImport;
use super::{ImportError, ImportMode};
use crate::domain::rate::{NewRateMaster, RateMasterId};
use crate::errors::CatalogError;
use crate::fare::catalog::RateCatalogAdmin;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub mode: ImportMode,
    pub total_rows: usize,
    /// Rates that passed every check (and were written, in commit mode).
    pub accepted: usize,
    pub rejected: usize,
    pub errors: Vec<ImportError>,
    pub created_master_ids: Vec<RateMasterId>,
}

impl ImportReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

pub struct RateImporter<'a, C> {
    catalog: &'a C,
    actor: Option<String>,
}

impl<'a, C: RateCatalogAdmin> RateImporter<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog, actor: None }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Checks parsed rates against existing keys and, in commit mode, creates
    /// each accepted master with its lines in one write. Only store outages
    /// abort the run.
    pub async fn run(&self, parsed: ParsedImport, mode: ImportMode) -> Result<ImportReport, CatalogError> {
        let ParsedImport { records, mut errors, row_count } = parsed;
        let mut rejected = errors.iter().filter(|error| counts_as_rejection(error)).count();
        let mut accepted = 0;
        let mut created_master_ids = Vec::new();

        for record in records {
            let row = record.first_row();
            if self.catalog.find_master_by_key(&record.center_name, record.tonnage).await?.is_some() {
                errors.push(ImportError::DuplicateKey {
                    row,
                    center_name: record.center_name,
                    tonnage: record.tonnage,
                });
                rejected += 1;
                continue;
            }

            if mode == ImportMode::Simulate {
                accepted += 1;
                continue;
            }

            let master = NewRateMaster {
                center_name: record.center_name.clone(),
                tonnage: record.tonnage,
                created_by: self.actor.clone(),
            };
            match self.catalog.create_master(master, record.details).await {
                Ok(created) => {
                    accepted += 1;
                    created_master_ids.push(created.id);
                }
                Err(CatalogError::DuplicateKey { center_name, tonnage }) => {
                    errors.push(ImportError::DuplicateKey { row, center_name, tonnage });
                    rejected += 1;
                }
                Err(CatalogError::Domain(error)) => {
                    errors.push(ImportError::InvalidRow { row, column: None, message: error.to_string() });
                    rejected += 1;
                }
                Err(error) => {
                    warn!(
                        event_name = "import.commit.aborted",
                        created = created_master_ids.len(),
                        error = %error,
                        "import stopped on catalog failure"
                    );
                    return Err(error);
                }
            }
        }

        info!(
            event_name = "import.run.completed",
            mode = %mode,
            total_rows = row_count,
            accepted,
            rejected,
            error_count = errors.len(),
            "rate import finished"
        );

        Ok(ImportReport { mode, total_rows: row_count, accepted, rejected, errors, created_master_ids })
    }
}

/// `rejected` counts whole rates turned away. Bad rows that never formed a
/// rate are only listed in `errors`.
fn counts_as_rejection(error: &ImportError) -> bool {
    matches!(error, ImportError::IncompleteRate { .. } | ImportError::DuplicateKey { .. })
}
