use sqlx::SqlitePool;
use testforge_core::{Case, CaseStatus};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::CaseRow;

#[derive(Clone)]
pub struct CaseRepository {
    pool: SqlitePool,
}

impl CaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, case: &Case) -> Result<Case, DbError> {
        let row = CaseRow::from(case);

        sqlx::query(
            r#"
            INSERT INTO cases (id, name, description, case_type, status, plan, code, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.name)
        .bind(&row.description)
        .bind(&row.case_type)
        .bind(&row.status)
        .bind(&row.plan)
        .bind(&row.code)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(case_id = %case.id, status = case.status.as_str(), "Stored case");
        Ok(case.clone())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Case>, DbError> {
        let row: Option<CaseRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, case_type, status, plan, code, created_at, updated_at
            FROM cases
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(CaseRow::into_domain).transpose()
    }

    pub async fn find_all(&self) -> Result<Vec<Case>, DbError> {
        let rows: Vec<CaseRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, case_type, status, plan, code, created_at, updated_at
            FROM cases
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CaseRow::into_domain).collect()
    }

    pub async fn update_status(&self, id: Uuid, status: CaseStatus) -> Result<Case, DbError> {
        let result = sqlx::query("UPDATE cases SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(chrono::Utc::now().timestamp_millis())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::CaseNotFound(id));
        }

        self.find_by_id(id).await?.ok_or(DbError::CaseNotFound(id))
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM cases WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
