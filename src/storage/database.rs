use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{OwnerId, Profile};

use super::{
    MIGRATION_001_INITIAL, MIGRATION_002_INVENTORY_EXPENSES, MIGRATION_003_SALES, OwnerRepository,
};

/// Handle to the shop database: connection pool, migrations and owner profiles.
///
/// Owner data (customers, ledger, inventory, expenses, sales) is only reachable
/// through [`Database::scoped`].
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .with_context(|| format!("Failed to connect to database {}", database_url))?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run on an already migrated database.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        sqlx::raw_sql(MIGRATION_002_INVENTORY_EXPENSES)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 002")?;

        sqlx::raw_sql(MIGRATION_003_SALES)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 003")?;

        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let db = Self::connect(database_url).await?;
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Repository whose every query is filtered by `owner_id`.
    pub fn scoped(&self, owner_id: OwnerId) -> OwnerRepository {
        OwnerRepository::new(self.pool.clone(), owner_id)
    }

    // ========================
    // Profile operations
    // ========================

    pub async fn save_profile(&self, profile: &Profile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, business_name, gstin, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(profile.id.to_string())
        .bind(&profile.business_name)
        .bind(&profile.gstin)
        .bind(profile.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save profile")?;
        Ok(())
    }

    pub async fn get_profile(&self, id: OwnerId) -> Result<Option<Profile>> {
        let row = sqlx::query(
            "SELECT id, business_name, gstin, created_at FROM profiles WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch profile")?;

        row.as_ref().map(Self::row_to_profile).transpose()
    }

    pub async fn get_profile_by_name(&self, business_name: &str) -> Result<Option<Profile>> {
        let row = sqlx::query(
            "SELECT id, business_name, gstin, created_at FROM profiles WHERE business_name = ?",
        )
        .bind(business_name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch profile by name")?;

        row.as_ref().map(Self::row_to_profile).transpose()
    }

    pub async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let rows = sqlx::query(
            "SELECT id, business_name, gstin, created_at FROM profiles ORDER BY business_name",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list profiles")?;

        rows.iter().map(Self::row_to_profile).collect()
    }

    pub async fn update_profile_gstin(&self, id: OwnerId, gstin: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE profiles SET gstin = ? WHERE id = ?")
            .bind(gstin)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update profile GSTIN")?;
        Ok(())
    }

    fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<Profile> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(Profile {
            id: Uuid::parse_str(&id_str).context("Invalid profile ID")?,
            business_name: row.get("business_name"),
            gstin: row.get("gstin"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}
