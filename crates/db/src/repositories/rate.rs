use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};
use tracing::info;

use haulrate_core::domain::rate::{
    center_key, NewRateDetail, NewRateMaster, RateDetail, RateDetailId, RateKind, RateMaster,
    RateMasterId,
};
use haulrate_core::errors::CatalogError;
use haulrate_core::fare::catalog::{validate_detail_set, RateCatalog, RateCatalogAdmin};

use super::RepositoryError;
use crate::DbPool;

const MASTER_COLUMNS: &str =
    "id, center_name, tonnage, active, created_by, created_at, updated_at";
const DETAIL_COLUMNS: &str = "id, rate_master_id, kind, region, amount, conditions, active, \
                              valid_from, valid_to, position";

/// SQLite rate catalog.
///
/// Decimals are stored as normalized text and timestamps as fixed-width UTC
/// text, so equality and range filters can run in SQL.
#[derive(Clone)]
pub struct SqlRateCatalog {
    pool: DbPool,
}

impl SqlRateCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn fetch_master(
        &self,
        center_name: &str,
        tonnage: Decimal,
        active_only: bool,
    ) -> Result<Option<RateMaster>, RepositoryError> {
        let active_clause = if active_only { " AND active = 1" } else { "" };
        let row = sqlx::query(&format!(
            "SELECT {MASTER_COLUMNS} FROM rate_master
             WHERE center_key = ? AND tonnage = ?{active_clause}"
        ))
        .bind(center_key(center_name))
        .bind(tonnage_text(tonnage))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_master).transpose()
    }

    async fn fetch_master_by_id(
        &self,
        master_id: &RateMasterId,
    ) -> Result<Option<RateMaster>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {MASTER_COLUMNS} FROM rate_master WHERE id = ?"))
            .bind(&master_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_master).transpose()
    }

    async fn fetch_details(
        &self,
        master_id: &RateMasterId,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<RateDetail>, RepositoryError> {
        let rows = match as_of {
            Some(as_of) => {
                sqlx::query(&format!(
                    "SELECT {DETAIL_COLUMNS} FROM rate_detail
                     WHERE rate_master_id = ?1
                       AND active = 1
                       AND (valid_from IS NULL OR valid_from <= ?2)
                       AND (valid_to IS NULL OR valid_to >= ?2)
                     ORDER BY position ASC"
                ))
                .bind(&master_id.0)
                .bind(timestamp_text(as_of))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {DETAIL_COLUMNS} FROM rate_detail
                     WHERE rate_master_id = ?
                     ORDER BY position ASC"
                ))
                .bind(&master_id.0)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(row_to_detail).collect()
    }

    async fn insert_master_with_details(
        &self,
        master: &RateMaster,
        details: &[RateDetail],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO rate_master
                 (id, center_name, center_key, tonnage, active, created_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&master.id.0)
        .bind(&master.center_name)
        .bind(center_key(&master.center_name))
        .bind(tonnage_text(master.tonnage))
        .bind(master.active)
        .bind(&master.created_by)
        .bind(timestamp_text(master.created_at))
        .bind(timestamp_text(master.updated_at))
        .execute(&mut *tx)
        .await?;

        let created_at = timestamp_text(master.created_at);
        for detail in details {
            insert_detail(&mut *tx, detail, &created_at).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// `None` when the master does not exist; nothing is written in that case.
    async fn swap_details(
        &self,
        master_id: &RateMasterId,
        details: &[RateDetail],
    ) -> Result<Option<()>, RepositoryError> {
        let now = timestamp_text(Utc::now());
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query("UPDATE rate_master SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(&master_id.0)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query("DELETE FROM rate_detail WHERE rate_master_id = ?")
            .bind(&master_id.0)
            .execute(&mut *tx)
            .await?;
        for detail in details {
            insert_detail(&mut *tx, detail, &now).await?;
        }

        tx.commit().await?;
        Ok(Some(()))
    }
}

async fn insert_detail(
    conn: &mut SqliteConnection,
    detail: &RateDetail,
    created_at: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO rate_detail
             (id, rate_master_id, kind, region, amount, conditions, active,
              valid_from, valid_to, position, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&detail.id.0)
    .bind(&detail.rate_master_id.0)
    .bind(detail.kind.as_str())
    .bind(&detail.region)
    .bind(detail.amount.to_string())
    .bind(&detail.conditions)
    .bind(detail.active)
    .bind(detail.valid_from.map(timestamp_text))
    .bind(detail.valid_to.map(timestamp_text))
    .bind(i64::from(detail.position))
    .bind(created_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl RateCatalog for SqlRateCatalog {
    async fn find_active_master(
        &self,
        center_name: &str,
        tonnage: Decimal,
    ) -> Result<Option<RateMaster>, CatalogError> {
        Ok(self.fetch_master(center_name, tonnage, true).await?)
    }

    async fn list_valid_details(
        &self,
        master_id: &RateMasterId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<RateDetail>, CatalogError> {
        Ok(self.fetch_details(master_id, Some(as_of)).await?)
    }

    async fn list_active_centers(&self) -> Result<Vec<String>, CatalogError> {
        let centers = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT center_name FROM rate_master WHERE active = 1 ORDER BY center_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(centers)
    }

    async fn list_active_tonnages(&self) -> Result<Vec<Decimal>, CatalogError> {
        let raw = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT tonnage FROM rate_master WHERE active = 1",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        // Text order would put "11" before "2.5".
        let mut tonnages =
            raw.iter().map(|value| parse_decimal("tonnage", value)).collect::<Result<Vec<_>, _>>()?;
        tonnages.sort();
        tonnages.dedup();
        Ok(tonnages)
    }
}

#[async_trait]
impl RateCatalogAdmin for SqlRateCatalog {
    async fn find_master_by_key(
        &self,
        center_name: &str,
        tonnage: Decimal,
    ) -> Result<Option<RateMaster>, CatalogError> {
        Ok(self.fetch_master(center_name, tonnage, false).await?)
    }

    async fn create_master(
        &self,
        master: NewRateMaster,
        details: Vec<NewRateDetail>,
    ) -> Result<RateMaster, CatalogError> {
        master.validate()?;
        validate_detail_set(&details)?;

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
        let lines = materialize(&created.id, details);

        match self.insert_master_with_details(&created, &lines).await {
            Err(RepositoryError::Database(sqlx::Error::Database(error)))
                if error.is_unique_violation() =>
            {
                Err(CatalogError::DuplicateKey {
                    center_name: created.center_name,
                    tonnage: created.tonnage,
                })
            }
            result => {
                result?;
                info!(
                    event_name = "catalog.master.created",
                    rate_master_id = %created.id,
                    center_name = %created.center_name,
                    tonnage = %created.tonnage,
                    detail_count = lines.len(),
                    "rate master created"
                );
                Ok(created)
            }
        }
    }

    async fn replace_details(
        &self,
        master_id: &RateMasterId,
        details: Vec<NewRateDetail>,
    ) -> Result<Vec<RateDetail>, CatalogError> {
        validate_detail_set(&details)?;
        let lines = materialize(master_id, details);

        if self.swap_details(master_id, &lines).await?.is_none() {
            return Err(CatalogError::MasterNotFound(master_id.clone()));
        }

        info!(
            event_name = "catalog.details.replaced",
            rate_master_id = %master_id,
            detail_count = lines.len(),
            "rate detail set replaced"
        );
        Ok(lines)
    }

    async fn set_master_active(
        &self,
        master_id: &RateMasterId,
        active: bool,
    ) -> Result<RateMaster, CatalogError> {
        let updated = sqlx::query("UPDATE rate_master SET active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(timestamp_text(Utc::now()))
            .bind(&master_id.0)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        if updated.rows_affected() == 0 {
            return Err(CatalogError::MasterNotFound(master_id.clone()));
        }

        self.fetch_master_by_id(master_id)
            .await?
            .ok_or_else(|| CatalogError::MasterNotFound(master_id.clone()))
    }

    async fn delete_master(&self, master_id: &RateMasterId) -> Result<bool, CatalogError> {
        let deleted = sqlx::query("DELETE FROM rate_master WHERE id = ?")
            .bind(&master_id.0)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn list_details(
        &self,
        master_id: &RateMasterId,
    ) -> Result<Vec<RateDetail>, CatalogError> {
        Ok(self.fetch_details(master_id, None).await?)
    }
}

fn materialize(master_id: &RateMasterId, details: Vec<NewRateDetail>) -> Vec<RateDetail> {
    details
        .into_iter()
        .enumerate()
        .map(|(position, detail)| detail.into_detail(master_id, position as u32))
        .collect()
}

pub(crate) fn tonnage_text(tonnage: Decimal) -> String {
    tonnage.normalize().to_string()
}

pub(crate) fn timestamp_text(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_master(row: &SqliteRow) -> Result<RateMaster, RepositoryError> {
    let tonnage: String = row.try_get("tonnage")?;
    Ok(RateMaster {
        id: RateMasterId(row.try_get("id")?),
        center_name: row.try_get("center_name")?,
        tonnage: parse_decimal("tonnage", &tonnage)?,
        active: row.try_get("active")?,
        created_by: row.try_get("created_by")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn row_to_detail(row: &SqliteRow) -> Result<RateDetail, RepositoryError> {
    let kind: String = row.try_get("kind")?;
    let amount: String = row.try_get("amount")?;
    Ok(RateDetail {
        id: RateDetailId(row.try_get("id")?),
        rate_master_id: RateMasterId(row.try_get("rate_master_id")?),
        kind: RateKind::from_str(&kind)
            .map_err(|error| RepositoryError::Decode(format!("invalid `kind`: {error}")))?,
        region: row.try_get("region")?,
        amount: parse_decimal("amount", &amount)?,
        conditions: row.try_get("conditions")?,
        active: row.try_get("active")?,
        valid_from: parse_optional_timestamp("valid_from", row.try_get("valid_from")?)?,
        valid_to: parse_optional_timestamp("valid_to", row.try_get("valid_to")?)?,
        position: parse_u32("position", row.try_get("position")?)?,
    })
}

fn parse_decimal(column: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}
