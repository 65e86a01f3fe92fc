use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planned,
    Active,
    Closed,
}

impl ProjectStatus {
    /// Convert enum → DB string
    pub fn to_db_str(self) -> &'static str {
        match self {
            ProjectStatus::Planned => "planned",
            ProjectStatus::Active => "active",
            ProjectStatus::Closed => "closed",
        }
    }

    /// Convert DB string → enum
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(ProjectStatus::Planned),
            "active" => Some(ProjectStatus::Active),
            "closed" => Some(ProjectStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub customer_id: i64,
    pub code: String,
    pub name: String,
    pub status: ProjectStatus,
    pub description: String,
    pub created_at: String,
}

impl Project {
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status_str: String = row.get("status")?;
        let status = ProjectStatus::from_db_str(&status_str)
            .ok_or_else(|| super::bad_enum("project status", &status_str))?;
        Ok(Self {
            id: row.get("id")?,
            customer_id: row.get("customer_id")?,
            code: row.get("code")?,
            name: row.get("name")?,
            status,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    pub customer_id: Option<i64>,
    pub code: Option<String>,
    pub name: Option<String>,
    pub status: Option<ProjectStatus>,
    pub description: Option<String>,
}
