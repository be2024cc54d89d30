use log::{log, Level};
use sqlx::{PgPool, Postgres, Transaction};

use crate::api::error::ApiError;

pub async fn open_transaction(db: &PgPool) -> Result<Transaction<'static, Postgres>, ApiError> {
    db.begin().await.map_err(|error| {
        log!(Level::Error, "Transaction failed to open: {error}");
        ApiError::Database(error)
    })
}

/// Dropping a transaction rolls it back; this is the only commit point.
pub async fn commit_transaction(transaction: Transaction<'static, Postgres>) -> Result<(), ApiError> {
    transaction.commit().await.map_err(|error| {
        log!(Level::Error, "Transaction failed to commit: {error}");
        ApiError::Database(error)
    })
}
