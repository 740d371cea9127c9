use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use haulrate_core::domain::rate::{
    NewRateDetail, NewRateMaster, RateDetail, RateMaster, RateMasterId,
};
use haulrate_core::errors::CatalogError;
use haulrate_core::fare::catalog::{validate_detail_set, RateCatalog, RateCatalogAdmin};
use haulrate_core::fare::suggestion::{suggest, RateSuggestions};

#[derive(Default)]
struct CatalogState {
    masters: HashMap<String, RateMaster>,
    details: HashMap<String, Vec<RateDetail>>,
}

impl CatalogState {
    fn find_by_key(&self, center_name: &str, tonnage: Decimal) -> Option<&RateMaster> {
        self.masters.values().find(|master| master.matches_key(center_name, tonnage))
    }

    fn suggestions(&self) -> RateSuggestions {
        let masters = self.masters.values().cloned().collect::<Vec<_>>();
        suggest(&masters)
    }
}

/// Process-local catalog with the same contract as the SQLite one. A single
/// lock guards masters and lines, so a replace is never observed half done.
#[derive(Default)]
pub struct InMemoryRateCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryRateCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateCatalog for InMemoryRateCatalog {
    async fn find_active_master(
        &self,
        center_name: &str,
        tonnage: Decimal,
    ) -> Result<Option<RateMaster>, CatalogError> {
        let state = self.state.read().await;
        Ok(state.find_by_key(center_name, tonnage).filter(|master| master.active).cloned())
    }

    async fn list_valid_details(
        &self,
        master_id: &RateMasterId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<RateDetail>, CatalogError> {
        let state = self.state.read().await;
        Ok(state
            .details
            .get(&master_id.0)
            .map(|details| {
                details.iter().filter(|detail| detail.is_valid_as_of(as_of)).cloned().collect()
            })
            .unwrap_or_default())
    }

    async fn list_active_centers(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.state.read().await.suggestions().available_centers)
    }

    async fn list_active_tonnages(&self) -> Result<Vec<Decimal>, CatalogError> {
        Ok(self.state.read().await.suggestions().available_tonnages)
    }
}

#[async_trait]
impl RateCatalogAdmin for InMemoryRateCatalog {
    async fn find_master_by_key(
        &self,
        center_name: &str,
        tonnage: Decimal,
    ) -> Result<Option<RateMaster>, CatalogError> {
        let state = self.state.read().await;
        Ok(state.find_by_key(center_name, tonnage).cloned())
    }

    async fn create_master(
        &self,
        master: NewRateMaster,
        details: Vec<NewRateDetail>,
    ) -> Result<RateMaster, CatalogError> {
        master.validate()?;
        validate_detail_set(&details)?;

        let mut state = self.state.write().await;
        if state.find_by_key(&master.center_name, master.tonnage).is_some() {
            return Err(CatalogError::DuplicateKey {
                center_name: master.center_name.trim().to_string(),
                tonnage: master.tonnage.normalize(),
            });
        }

        let now = Utc::now();
        let created = RateMaster {
            id: RateMasterId::generate(),
            center_name: master.center_name.trim().to_string(),
            tonnage: master.tonnage.normalize(),
            active: true,
            created_by: master.created_by,
            created_at: now,
            updated_at: now,
        };
        let lines = details
            .into_iter()
            .enumerate()
            .map(|(position, detail)| detail.into_detail(&created.id, position as u32))
            .collect();

        state.details.insert(created.id.0.clone(), lines);
        state.masters.insert(created.id.0.clone(), created.clone());
        Ok(created)
    }

    async fn replace_details(
        &self,
        master_id: &RateMasterId,
        details: Vec<NewRateDetail>,
    ) -> Result<Vec<RateDetail>, CatalogError> {
        validate_detail_set(&details)?;

        let mut state = self.state.write().await;
        let master = state
            .masters
            .get_mut(&master_id.0)
            .ok_or_else(|| CatalogError::MasterNotFound(master_id.clone()))?;
        master.updated_at = Utc::now();

        let lines = details
            .into_iter()
            .enumerate()
            .map(|(position, detail)| detail.into_detail(master_id, position as u32))
            .collect::<Vec<_>>();
        state.details.insert(master_id.0.clone(), lines.clone());
        Ok(lines)
    }

    async fn set_master_active(
        &self,
        master_id: &RateMasterId,
        active: bool,
    ) -> Result<RateMaster, CatalogError> {
        let mut state = self.state.write().await;
        let master = state
            .masters
            .get_mut(&master_id.0)
            .ok_or_else(|| CatalogError::MasterNotFound(master_id.clone()))?;
        master.active = active;
        master.updated_at = Utc::now();
        Ok(master.clone())
    }

    async fn delete_master(&self, master_id: &RateMasterId) -> Result<bool, CatalogError> {
        let mut state = self.state.write().await;
        state.details.remove(&master_id.0);
        Ok(state.masters.remove(&master_id.0).is_some())
    }

    async fn list_details(
        &self,
        master_id: &RateMasterId,
    ) -> Result<Vec<RateDetail>, CatalogError> {
        let state = self.state.read().await;
        Ok(state.details.get(&master_id.0).cloned().unwrap_or_default())
    }
}
