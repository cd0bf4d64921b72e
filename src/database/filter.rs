use serde::Deserialize;
use serde_json::{json, Value};

/// Sparse filter set for listing and search queries.
///
/// Falsy-filter convention, preserved from the observed behavior: an empty
/// string or a zero value means "not provided" and contributes no predicate.
/// A minimum of 0 rooms is therefore indistinguishable from no rooms filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyFilters {
    pub property_type: Option<String>,
    pub status: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rooms: Option<i64>,
}

/// Wire shape of filter query strings. Everything arrives as text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterParams {
    #[serde(rename = "type")]
    pub property_type: Option<String>,
    pub status: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    #[serde(alias = "min_rooms")]
    pub rooms: Option<String>,
}

impl PropertyFilters {
    pub fn from_params(params: &FilterParams) -> Self {
        Self {
            property_type: non_empty(params.property_type.as_deref()),
            status: non_empty(params.status.as_deref()),
            min_price: non_zero_f64(params.min_price.as_deref()),
            max_price: non_zero_f64(params.max_price.as_deref()),
            min_rooms: non_zero_i64(params.rooms.as_deref()),
        }
    }

    /// Append one `AND` predicate per present filter; absent filters are
    /// omitted entirely rather than compared to null.
    pub fn push_predicates(&self, sql: &mut String, params: &mut Vec<Value>) {
        if let Some(property_type) = &self.property_type {
            sql.push_str(" AND type = ?");
            params.push(json!(property_type));
        }
        if let Some(status) = &self.status {
            sql.push_str(" AND status = ?");
            params.push(json!(status));
        }
        if let Some(min_price) = self.min_price {
            sql.push_str(" AND price >= ?");
            params.push(json!(min_price));
        }
        if let Some(max_price) = self.max_price {
            sql.push_str(" AND price <= ?");
            params.push(json!(max_price));
        }
        if let Some(min_rooms) = self.min_rooms {
            sql.push_str(" AND rooms >= ?");
            params.push(json!(min_rooms));
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    match value {
        Some(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn non_zero_f64(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|n| *n != 0.0)
}

fn non_zero_i64(value: Option<&str>) -> Option<i64> {
    value
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(
        property_type: &str,
        status: &str,
        min_price: &str,
        max_price: &str,
        rooms: &str,
    ) -> FilterParams {
        FilterParams {
            property_type: Some(property_type.to_string()),
            status: Some(status.to_string()),
            min_price: Some(min_price.to_string()),
            max_price: Some(max_price.to_string()),
            rooms: Some(rooms.to_string()),
        }
    }

    #[test]
    fn empty_and_zero_values_are_not_filters() {
        // Sharp edge: 0 rooms cannot be expressed as a filter
        let filters = PropertyFilters::from_params(&params("", "", "0", "0.0", "0"));
        assert_eq!(filters, PropertyFilters::default());

        let mut sql = String::from("SELECT * FROM properties WHERE 1=1");
        let mut bound = Vec::new();
        filters.push_predicates(&mut sql, &mut bound);
        assert_eq!(sql, "SELECT * FROM properties WHERE 1=1");
        assert!(bound.is_empty());
    }

    #[test]
    fn present_filters_each_append_one_predicate() {
        let filters =
            PropertyFilters::from_params(&params("house", "available", "100", "500.5", "3"));
        let mut sql = String::from("SELECT * FROM properties WHERE 1=1");
        let mut bound = Vec::new();
        filters.push_predicates(&mut sql, &mut bound);
        assert_eq!(
            sql,
            "SELECT * FROM properties WHERE 1=1 AND type = ? AND status = ? \
             AND price >= ? AND price <= ? AND rooms >= ?"
        );
        assert_eq!(bound.len(), 5);
        assert_eq!(bound[0], json!("house"));
        assert_eq!(bound[3], json!(500.5));
        assert_eq!(bound[4], json!(3));
    }

    #[test]
    fn non_numeric_values_are_dropped() {
        let filters = PropertyFilters::from_params(&params("", "", "cheap", "expensive", "many"));
        assert_eq!(filters, PropertyFilters::default());
    }

    #[test]
    fn min_rooms_alias_is_accepted() {
        let wire: FilterParams =
            serde_json::from_value(json!({ "min_rooms": "2" })).unwrap();
        let filters = PropertyFilters::from_params(&wire);
        assert_eq!(filters.min_rooms, Some(2));
    }
}
