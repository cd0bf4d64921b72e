use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::debug;

use crate::database::filter::PropertyFilters;
use crate::database::gateway::{bind_value_as, sql_timestamp, Database, DatabaseError};
use crate::database::models::{Property, PropertyStats};

/// Data access for the properties table. Pure persistence: no ownership or
/// authorization logic lives here; callers enforce that.
#[derive(Clone)]
pub struct PropertyRepository {
    db: Database,
}

impl PropertyRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Provision the properties table if absent.
    pub async fn provision(db: &Database) -> Result<(), DatabaseError> {
        db.execute(
            r#"
            CREATE TABLE IF NOT EXISTS properties (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                address TEXT NOT NULL,
                price REAL NOT NULL,
                rooms INTEGER NOT NULL DEFAULT 1,
                area REAL NOT NULL DEFAULT 0,
                type TEXT NOT NULL DEFAULT 'apartment',
                status TEXT NOT NULL DEFAULT 'available',
                user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            &[],
        )
        .await?;
        Ok(())
    }

    /// Single-row lookup; a miss is `None`, never an error.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Property>, DatabaseError> {
        let property = sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(property)
    }

    /// Filtered listing, most recently created first.
    pub async fn list(
        &self,
        filters: &PropertyFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Property>, DatabaseError> {
        let mut sql = String::from("SELECT * FROM properties WHERE 1=1");
        let mut params: Vec<Value> = Vec::new();
        filters.push_predicates(&mut sql, &mut params);
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");
        params.push(json!(limit));
        params.push(json!(offset));
        self.fetch_properties(&sql, &params).await
    }

    /// Every listing, newest first. Used by the reporting surface.
    pub async fn list_all(&self) -> Result<Vec<Property>, DatabaseError> {
        let properties =
            sqlx::query_as::<_, Property>("SELECT * FROM properties ORDER BY created_at DESC")
                .fetch_all(self.db.pool())
                .await?;
        Ok(properties)
    }

    pub async fn list_by_owner(&self, user_id: i64) -> Result<Vec<Property>, DatabaseError> {
        let properties = sqlx::query_as::<_, Property>(
            "SELECT * FROM properties WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(properties)
    }

    /// Substring search over title, description and address; case sensitivity
    /// follows the store collation. Filters compose exactly as in `list`.
    pub async fn search(
        &self,
        query: &str,
        filters: &PropertyFilters,
    ) -> Result<Vec<Property>, DatabaseError> {
        let needle = format!("%{}%", query);
        let mut sql = String::from(
            "SELECT * FROM properties WHERE (title LIKE ? OR description LIKE ? OR address LIKE ?)",
        );
        let mut params: Vec<Value> = vec![json!(needle), json!(needle), json!(needle)];
        filters.push_predicates(&mut sql, &mut params);
        sql.push_str(" ORDER BY created_at DESC");
        self.fetch_properties(&sql, &params).await
    }

    /// Base aggregate for the statistics surface.
    pub async fn stats(&self) -> Result<PropertyStats, DatabaseError> {
        let stats = sqlx::query_as::<_, PropertyStats>(
            r#"
            SELECT
                COUNT(*) as total,
                COUNT(CASE WHEN status = 'available' THEN 1 END) as available,
                COUNT(CASE WHEN status = 'rented' THEN 1 END) as rented,
                AVG(price) as avg_price,
                MIN(price) as min_price,
                MAX(price) as max_price
            FROM properties
            "#,
        )
        .fetch_one(self.db.pool())
        .await?;
        Ok(stats)
    }

    /// Listing count per type, for the service-level derived statistics.
    pub async fn count_by_type(&self) -> Result<Vec<(String, i64)>, DatabaseError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT type, COUNT(*) FROM properties GROUP BY type",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Listings created within the trailing window of `days`.
    pub async fn count_recent(&self, days: i64) -> Result<i64, DatabaseError> {
        let cutoff = sql_timestamp(&(Utc::now() - Duration::days(days)));
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM properties WHERE created_at >= ?",
        )
        .bind(cutoff)
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }

    /// Newest available listings from other owners.
    pub async fn recommend_for(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<Property>, DatabaseError> {
        let properties = sqlx::query_as::<_, Property>(
            "SELECT * FROM properties \
             WHERE user_id != ? AND status = 'available' \
             ORDER BY created_at DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;
        Ok(properties)
    }

    /// Insert when the id is absent, unconditional update of all mutable
    /// columns otherwise. The store-assigned id and timestamps are echoed
    /// back into the entity.
    pub async fn save(&self, property: &mut Property) -> Result<(), DatabaseError> {
        let now = Utc::now();

        if let Some(id) = property.id {
            let params = [
                json!(property.title),
                json!(property.description),
                json!(property.address),
                json!(property.price),
                json!(property.rooms),
                json!(property.area),
                json!(property.property_type.to_string()),
                json!(property.status.to_string()),
                property.user_id.map(|v| json!(v)).unwrap_or(Value::Null),
                json!(sql_timestamp(&now)),
                json!(id),
            ];
            self.db
                .execute(
                    "UPDATE properties SET title = ?, description = ?, address = ?, price = ?, \
                     rooms = ?, area = ?, type = ?, status = ?, user_id = ?, updated_at = ? \
                     WHERE id = ?",
                    &params,
                )
                .await?;
            property.updated_at = now;
        } else {
            let params = [
                json!(property.title),
                json!(property.description),
                json!(property.address),
                json!(property.price),
                json!(property.rooms),
                json!(property.area),
                json!(property.property_type.to_string()),
                json!(property.status.to_string()),
                property.user_id.map(|v| json!(v)).unwrap_or(Value::Null),
                json!(sql_timestamp(&now)),
                json!(sql_timestamp(&now)),
            ];
            let result = self
                .db
                .execute(
                    "INSERT INTO properties \
                     (title, description, address, price, rooms, area, type, status, user_id, \
                      created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    &params,
                )
                .await?;
            property.id = Some(result.last_insert_rowid());
            property.created_at = now;
            property.updated_at = now;
            debug!(id = result.last_insert_rowid(), "property row inserted");
        }

        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = self
            .db
            .execute("DELETE FROM properties WHERE id = ?", &[json!(id)])
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch_properties(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Property>, DatabaseError> {
        let mut query = sqlx::query_as::<_, Property>(sql);
        for param in params {
            query = bind_value_as(query, param);
        }
        Ok(query.fetch_all(self.db.pool()).await?)
    }
}
