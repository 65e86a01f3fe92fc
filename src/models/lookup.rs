use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Key/label pair grouped by category (drop-down values for the clients).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lookup {
    pub id: i64,
    pub category: String,
    pub code: String,
    pub label: String,
    pub sort_order: i64,
}

impl Lookup {
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            category: row.get("category")?,
            code: row.get("code")?,
            label: row.get("label")?,
            sort_order: row.get("sort_order")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLookup {
    pub category: String,
    pub code: String,
    pub label: String,
    #[serde(default)]
    pub sort_order: i64,
}
