use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};
use serde_json::Value;

use super::{DocumentStore, Expect, Filter, RawDocument, StoreError, Version};
use crate::entity::document;

/// Postgres-backed document store: one `document` row per aggregate with a
/// JSONB body and a version column used for compare-and-set updates.
#[derive(Clone)]
pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn insert_new(
        &self,
        collection: &str,
        key: &str,
        body: Value,
    ) -> Result<Version, StoreError> {
        let model = document::ActiveModel {
            collection: Set(collection.to_string()),
            key: Set(key.to_string()),
            version: Set(1),
            body: Set(body),
            updated_at: Set(Utc::now()),
        };
        match model.insert(&self.db).await {
            Ok(_) => Ok(1),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(StoreError::conflict(collection, key))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn compare_and_set(
        &self,
        collection: &str,
        key: &str,
        body: Value,
        expected: Version,
    ) -> Result<Version, StoreError> {
        let next = expected + 1;
        let result = document::Entity::update_many()
            .col_expr(document::Column::Body, Expr::value(body))
            .col_expr(document::Column::Version, Expr::value(next as i64))
            .col_expr(document::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(document::Column::Collection.eq(collection))
            .filter(document::Column::Key.eq(key))
            .filter(document::Column::Version.eq(expected as i64))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::conflict(collection, key));
        }
        Ok(next)
    }
}

fn to_raw(model: document::Model) -> RawDocument {
    RawDocument {
        key: model.key,
        version: model.version.max(0) as Version,
        body: model.body,
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<RawDocument>, StoreError> {
        let found = document::Entity::find_by_id((collection.to_string(), key.to_string()))
            .one(&self.db)
            .await?;
        Ok(found.map(to_raw))
    }

    async fn upsert(
        &self,
        collection: &str,
        key: &str,
        body: Value,
        expect: Expect,
    ) -> Result<Version, StoreError> {
        match expect {
            Expect::Absent => self.insert_new(collection, key, body).await,
            Expect::Version(expected) => {
                self.compare_and_set(collection, key, body, expected).await
            }
            Expect::Any => match self.get(collection, key).await? {
                Some(current) => {
                    self.compare_and_set(collection, key, body, current.version)
                        .await
                }
                None => self.insert_new(collection, key, body).await,
            },
        }
    }

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<RawDocument>, StoreError> {
        let mut select =
            document::Entity::find().filter(document::Column::Collection.eq(collection));
        if let Filter::FieldEquals { field, value } = filter {
            select = select.filter(Expr::cust_with_values(
                "body ->> ? = ?",
                [field.clone(), value.clone()],
            ));
        }
        let models = select
            .order_by_asc(document::Column::Key)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(to_raw).collect())
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        let result = document::Entity::delete_many()
            .filter(document::Column::Collection.eq(collection))
            .filter(document::Column::Key.eq(key))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn clear(&self, collection: &str) -> Result<u64, StoreError> {
        let result = document::Entity::delete_many()
            .filter(document::Column::Collection.eq(collection))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
