//! Lifecycle transitions shared by every entity table.
//!
//! Each call returns `true` if a row with the given `id` exists (and was
//! touched), `false` otherwise.

use estatecore_core::entity::EntityType;
use estatecore_core::types::DbId;
use sqlx::PgPool;

/// Table backing each entity type. Entity names double as table names.
pub fn table_name(entity_type: EntityType) -> &'static str {
    entity_type.as_str()
}

pub struct LifecycleRepo;

impl LifecycleRepo {
    /// Mark a row archived (and inactive). Archiving twice keeps the first
    /// `archived_at`.
    pub async fn archive(
        pool: &PgPool,
        entity_type: EntityType,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE {} SET archived_at = COALESCE(archived_at, NOW()), is_active = FALSE \
             WHERE id = $1",
            table_name(entity_type)
        );
        Self::execute(pool, &query, id).await
    }

    /// Reactivate a row, clearing any archive mark.
    pub async fn activate(
        pool: &PgPool,
        entity_type: EntityType,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE {} SET is_active = TRUE, archived_at = NULL WHERE id = $1",
            table_name(entity_type)
        );
        Self::execute(pool, &query, id).await
    }

    pub async fn deactivate(
        pool: &PgPool,
        entity_type: EntityType,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE {} SET is_active = FALSE WHERE id = $1",
            table_name(entity_type)
        );
        Self::execute(pool, &query, id).await
    }

    /// Permanently delete a row.
    pub async fn hard_delete(
        pool: &PgPool,
        entity_type: EntityType,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let query = format!("DELETE FROM {} WHERE id = $1", table_name(entity_type));
        Self::execute(pool, &query, id).await
    }

    async fn execute(pool: &PgPool, query: &str, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(query).bind(id).execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entity_maps_to_its_table() {
        let tables: Vec<_> = EntityType::ALL.iter().map(|e| table_name(*e)).collect();
        assert_eq!(
            tables,
            vec!["properties", "tenants", "maintenance_requests", "users"]
        );
    }
}
