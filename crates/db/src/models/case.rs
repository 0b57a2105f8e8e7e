use chrono::{DateTime, TimeZone, Utc};
use testforge_core::{Case, CaseStatus, CaseType};
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CaseRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub case_type: String,
    pub status: String,
    pub plan: Option<String>,
    pub code: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CaseRow {
    pub fn into_domain(self) -> Result<Case, DbError> {
        let id = Uuid::parse_str(&self.id).map_err(|_| DbError::InvalidColumn {
            column: "id",
            value: self.id.clone(),
        })?;
        let case_type = CaseType::parse(&self.case_type).ok_or_else(|| DbError::InvalidColumn {
            column: "case_type",
            value: self.case_type.clone(),
        })?;
        let code = self
            .code
            .map(|text| serde_json::from_str(&text))
            .transpose()
            .map_err(|e| DbError::InvalidColumn {
                column: "code",
                value: e.to_string(),
            })?;

        Ok(Case {
            id,
            name: self.name,
            description: self.description,
            case_type,
            status: CaseStatus::parse(&self.status).unwrap_or_default(),
            plan: self.plan,
            code,
            created_at: millis_to_datetime(self.created_at),
            updated_at: millis_to_datetime(self.updated_at),
        })
    }
}

impl From<&Case> for CaseRow {
    fn from(case: &Case) -> Self {
        Self {
            id: case.id.to_string(),
            name: case.name.clone(),
            description: case.description.clone(),
            case_type: case.case_type.as_str().to_string(),
            status: case.status.as_str().to_string(),
            plan: case.plan.clone(),
            code: case.code.as_ref().map(|value| value.to_string()),
            created_at: case.created_at.timestamp_millis(),
            updated_at: case.updated_at.timestamp_millis(),
        }
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}
