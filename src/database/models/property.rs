use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::{Display, EnumString};

/// Listing category. Stored as lowercase TEXT.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PropertyType {
    Apartment,
    House,
    Office,
    Land,
    Commercial,
}

/// Listing availability. Transitions are plain attribute writes; only set
/// membership is enforced.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PropertyStatus {
    Available,
    Rented,
    Sold,
}

/// A property listing. `id` is assigned by the store on creation and
/// immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Property {
    pub id: Option<i64>,
    pub title: String,
    pub description: String,
    pub address: String,
    pub price: f64,
    pub rooms: i64,
    pub area: f64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub property_type: PropertyType,
    pub status: PropertyStatus,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == Some(user_id)
    }
}

/// Base aggregate over the properties table. Price figures are absent on an
/// empty table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PropertyStats {
    pub total: i64,
    pub available: i64,
    pub rented: i64,
    pub avg_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}
