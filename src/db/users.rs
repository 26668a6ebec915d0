use crate::db::connection::Database;
use crate::domain::UserPreference;
use crate::errors::StoreError;
use std::collections::{HashMap, HashSet};

/// All saved searches. Allow-list columns are JSON arrays; an empty array
/// means no restriction.
pub fn all_preferences(db: &Database) -> Result<Vec<UserPreference>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                "SELECT id, price_min, price_max, mileage_min, mileage_max,
                        year_min, year_max, brands, fuel_types, transmissions
                 FROM users",
            )
            .map_err(|e| StoreError::DbError(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                let brands: String = row.get(7)?;
                let fuel_types: String = row.get(8)?;
                let transmissions: String = row.get(9)?;
                Ok(UserPreference {
                    id: row.get(0)?,
                    price_min: row.get(1)?,
                    price_max: row.get(2)?,
                    mileage_min: row.get(3)?,
                    mileage_max: row.get(4)?,
                    year_min: row.get(5)?,
                    year_max: row.get(6)?,
                    brands: serde_json::from_str(&brands).unwrap_or_default(),
                    fuel_types: serde_json::from_str(&fuel_types).unwrap_or_default(),
                    transmissions: serde_json::from_str(&transmissions).unwrap_or_default(),
                })
            })
            .map_err(|e| StoreError::DbError(e.to_string()))?;

        let mut prefs = Vec::new();
        for row in rows {
            prefs.push(row.map_err(|e| StoreError::DbError(e.to_string()))?);
        }
        Ok(prefs)
    })
}

/// user id -> set of preferred zipcode ids.
pub fn zipcode_prefs(db: &Database) -> Result<HashMap<String, HashSet<i64>>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT user_id, zipcode_id FROM user_zipcodes")
            .map_err(|e| StoreError::DbError(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(|e| StoreError::DbError(e.to_string()))?;

        let mut prefs: HashMap<String, HashSet<i64>> = HashMap::new();
        for row in rows {
            let (user_id, zipcode_id) = row.map_err(|e| StoreError::DbError(e.to_string()))?;
            prefs.entry(user_id).or_default().insert(zipcode_id);
        }
        Ok(prefs)
    })
}
