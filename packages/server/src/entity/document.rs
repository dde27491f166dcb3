use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One JSON document of a logical collection (`files`, `users`).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub collection: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,

    /// Incremented on every write; conditional writes compare against it.
    pub version: i64,

    #[sea_orm(column_type = "JsonBinary")]
    pub body: Json,

    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
