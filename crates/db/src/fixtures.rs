use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Seeded masters and what `verify` expects of each.
const SEED_MASTERS: &[SeedMasterContract] = &[
    SeedMasterContract {
        id: "rm-seoul-5",
        center_name: "서울센터",
        tonnage: "5",
        active: true,
        detail_count: 5,
        description: "Seoul 5t: regional base, call and waypoint fees",
    },
    SeedMasterContract {
        id: "rm-seoul-1",
        center_name: "서울센터",
        tonnage: "1",
        active: true,
        detail_count: 4,
        description: "Seoul 1t: Gyeonggi base override",
    },
    SeedMasterContract {
        id: "rm-busan-2.5",
        center_name: "부산센터",
        tonnage: "2.5",
        active: true,
        detail_count: 3,
        description: "Busan 2.5t: night loading surcharge",
    },
    SeedMasterContract {
        id: "rm-daegu-5",
        center_name: "대구센터",
        tonnage: "5",
        active: true,
        detail_count: 1,
        description: "Daegu 5t: only line expired at the end of 2024",
    },
    SeedMasterContract {
        id: "rm-incheon-11",
        center_name: "인천센터",
        tonnage: "11",
        active: false,
        detail_count: 1,
        description: "Incheon 11t: deactivated master",
    },
];

/// Deterministic rate catalog for local runs and contract tests.
pub struct FareSeedDataset;

impl FareSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/fare_seed_data.sql");

    /// Load the dataset in one transaction, replacing earlier seeded rows.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let masters_seeded = SEED_MASTERS
            .iter()
            .map(|master| SeedMasterInfo {
                id: master.id,
                center_name: master.center_name,
                tonnage: master.tonnage,
                description: master.description,
            })
            .collect();

        Ok(SeedResult { masters_seeded })
    }

    /// Check that every seeded master is present with its expected state.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for master in SEED_MASTERS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(
                     SELECT 1 FROM rate_master
                     WHERE id = ?1 AND center_name = ?2 AND tonnage = ?3 AND active = ?4
                 )",
            )
            .bind(master.id)
            .bind(master.center_name)
            .bind(master.tonnage)
            .bind(master.active)
            .fetch_one(pool)
            .await?;
            checks.push((master.id, present == 1));

            let detail_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM rate_detail WHERE rate_master_id = ?1")
                    .bind(master.id)
                    .fetch_one(pool)
                    .await?;
            checks.push((master.description, detail_count == master.detail_count));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Remove the seeded masters; lines follow through the cascade.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        for master in SEED_MASTERS {
            sqlx::query("DELETE FROM rate_master WHERE id = ?").bind(master.id).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedMasterContract {
    id: &'static str,
    center_name: &'static str,
    tonnage: &'static str,
    active: bool,
    detail_count: i64,
    description: &'static str,
}

#[derive(Debug, Clone)]
pub struct SeedResult {
    pub masters_seeded: Vec<SeedMasterInfo>,
}

#[derive(Debug, Clone)]
pub struct SeedMasterInfo {
    pub id: &'static str,
    pub center_name: &'static str,
    pub tonnage: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
