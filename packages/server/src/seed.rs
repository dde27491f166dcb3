use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};
use tracing::{info, warn};

use crate::config::AdminConfig;
use crate::entity::document;
use crate::services::{AccountService, ServiceError};

/// Ensure secondary indexes on the document table exist.
///
/// Schema sync only creates the primary key, so these are created manually
/// on startup. Failures are logged and startup continues.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    let by_update = Index::create()
        .if_not_exists()
        .name("idx_document_collection_updated")
        .table(document::Entity)
        .col(document::Column::Collection)
        .col(document::Column::UpdatedAt)
        .to_string(PostgresQueryBuilder);

    // Email lookups during registration and password reset.
    let by_email = "CREATE INDEX IF NOT EXISTS idx_document_user_email \
        ON document ((body->>'email')) WHERE collection = 'users'";

    for (name, stmt) in [
        ("idx_document_collection_updated", by_update.as_str()),
        ("idx_document_user_email", by_email),
    ] {
        match db.execute_unprepared(stmt).await {
            Ok(_) => info!("Ensured index {} exists", name),
            Err(e) => warn!("Failed to create index {}: {}", name, e),
        }
    }

    Ok(())
}

/// Create or promote the configured administrator account.
pub async fn seed_admin(accounts: &AccountService, admin: &AdminConfig) -> Result<(), ServiceError> {
    let Some(username) = admin.username.as_deref() else {
        return Ok(());
    };
    let (Some(password), Some(email)) = (admin.password.as_deref(), admin.email.as_deref()) else {
        warn!(username, "Admin username set without password and email, skipping");
        return Ok(());
    };
    accounts.ensure_admin(username, password, email).await
}
