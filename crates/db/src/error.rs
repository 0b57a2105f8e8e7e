use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Case not found: {0}")]
    CaseNotFound(Uuid),

    #[error("Invalid stored value in column '{column}': {value}")]
    InvalidColumn { column: &'static str, value: String },
}
