//! Repository for the `properties` table.

use estatecore_core::types::DbId;
use sqlx::PgPool;

use crate::models::property::{CreateProperty, Property, PropertyFilter, UpdateProperty};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, property_name, address, city, state, zip_code, property_type, \
    units, rent_amount, square_feet, is_active, archived_at, created_at, updated_at";

/// Provides CRUD operations for properties.
pub struct PropertyRepo;

impl PropertyRepo {
    /// Insert a new property, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateProperty) -> Result<Property, sqlx::Error> {
        let query = format!(
            "INSERT INTO properties
                (property_name, address, city, state, zip_code, property_type,
                 units, rent_amount, square_feet)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Property>(&query)
            .bind(&input.property_name)
            .bind(&input.address)
            .bind(&input.city)
            .bind(&input.state)
            .bind(&input.zip_code)
            .bind(&input.property_type)
            .bind(input.units)
            .bind(input.rent_amount)
            .bind(input.square_feet)
            .fetch_one(pool)
            .await
    }

    /// List properties matching every set filter, oldest first.
    pub async fn list(
        pool: &PgPool,
        filter: &PropertyFilter,
    ) -> Result<Vec<Property>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM properties
             WHERE ($1::TEXT IS NULL OR property_type = $1)
               AND ($2::TEXT IS NULL OR city = $2)
               AND ($3::TEXT IS NULL OR state = $3)
               AND ($4::TEXT IS NULL OR zip_code = $4)
               AND ($5::BOOL IS NULL OR is_active = $5)
             ORDER BY id"
        );
        sqlx::query_as::<_, Property>(&query)
            .bind(&filter.property_type)
            .bind(&filter.city)
            .bind(&filter.state)
            .bind(&filter.zip_code)
            .bind(filter.is_active)
            .fetch_all(pool)
            .await
    }

    /// Update a property. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateProperty,
    ) -> Result<Option<Property>, sqlx::Error> {
        let query = format!(
            "UPDATE properties SET
                property_name = COALESCE($2, property_name),
                address = COALESCE($3, address),
                city = COALESCE($4, city),
                state = COALESCE($5, state),
                zip_code = COALESCE($6, zip_code),
                property_type = COALESCE($7, property_type),
                units = COALESCE($8, units),
                rent_amount = COALESCE($9, rent_amount),
                square_feet = COALESCE($10, square_feet)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Property>(&query)
            .bind(id)
            .bind(&input.property_name)
            .bind(&input.address)
            .bind(&input.city)
            .bind(&input.state)
            .bind(&input.zip_code)
            .bind(&input.property_type)
            .bind(input.units)
            .bind(input.rent_amount)
            .bind(input.square_feet)
            .fetch_optional(pool)
            .await
    }
}
