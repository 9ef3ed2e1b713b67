//! `Storage` implementation over SeaORM: connect, `sync` via
//! `Schema::builder().register()`, active-model upsert pattern, narrowed to
//! the three tables this crate owns.

use std::collections::HashMap;

use sea_orm::{ActiveValue, DatabaseConnection, EntityTrait, QueryOrder, Schema};

use crate::db;
use crate::entities;
use crate::storage::{
    ErrorLogEntry, LogQueryFilter, RequestLogEntry, Storage, StorageResult,
};

#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
}

impl SeaOrmStorage {
    pub async fn connect(dsn: &str) -> StorageResult<Self> {
        Ok(Self {
            db: db::connect(dsn).await?,
        })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait::async_trait]
impl Storage for SeaOrmStorage {
    async fn sync(&self) -> StorageResult<()> {
        Schema::new(sea_orm::ConnectionTrait::get_database_backend(&self.db))
            .builder()
            .register(entities::settings::Entity)
            .register(entities::error_log::Entity)
            .register(entities::request_log::Entity)
            .sync(&self.db)
            .await?;
        Ok(())
    }

    async fn load_settings(&self) -> StorageResult<HashMap<String, String>> {
        let rows = entities::settings::Entity::find().all(&self.db).await?;
        Ok(rows.into_iter().map(|m| (m.key, m.value)).collect())
    }

    async fn set_setting(&self, key: &str, value: &str) -> StorageResult<()> {
        use entities::settings::{ActiveModel, Column, Entity};
        use sea_orm::{ColumnTrait, EntityTrait as _, QueryFilter};

        let now = time::OffsetDateTime::now_utc();
        let existing = Entity::find()
            .filter(Column::Key.eq(key))
            .one(&self.db)
            .await?;
        match existing {
            Some(model) => {
                let mut active: ActiveModel = model.into();
                active.value = ActiveValue::Set(value.to_string());
                active.updated_at = ActiveValue::Set(now);
                sea_orm::ActiveModelTrait::update(active, &self.db).await?;
            }
            None => {
                let active = ActiveModel {
                    key: ActiveValue::Set(key.to_string()),
                    value: ActiveValue::Set(value.to_string()),
                    updated_at: ActiveValue::Set(now),
                };
                Entity::insert(active).exec(&self.db).await?;
            }
        }
        Ok(())
    }

    async fn append_error_log(&self, entry: &ErrorLogEntry) -> StorageResult<()> {
        use entities::error_log::ActiveModel;
        let active = ActiveModel {
            id: ActiveValue::NotSet,
            at: ActiveValue::Set(entry.at),
            provider: ActiveValue::Set(entry.provider.clone()),
            credential_digest: ActiveValue::Set(entry.credential_digest.clone()),
            egress: ActiveValue::Set(entry.egress.clone()),
            status: ActiveValue::Set(entry.status.map(i32::from)),
            message: ActiveValue::Set(entry.message.clone()),
            request_body: ActiveValue::Set(entry.request_body.clone()),
        };
        entities::error_log::Entity::insert(active)
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn append_request_log(&self, entry: &RequestLogEntry) -> StorageResult<()> {
        use entities::request_log::ActiveModel;
        let active = ActiveModel {
            id: ActiveValue::NotSet,
            at: ActiveValue::Set(entry.at),
            provider: ActiveValue::Set(entry.provider.clone()),
            model: ActiveValue::Set(entry.model.clone()),
            status: ActiveValue::Set(i32::from(entry.status)),
            latency_ms: ActiveValue::Set(i64::try_from(entry.latency_ms).unwrap_or(i64::MAX)),
        };
        entities::request_log::Entity::insert(active)
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn query_error_log(&self, filter: LogQueryFilter) -> StorageResult<Vec<ErrorLogEntry>> {
        use entities::error_log::{Column, Entity};
        use sea_orm::{ColumnTrait, QueryFilter, QuerySelect};

        let mut q = Entity::find().order_by_desc(Column::At);
        if let Some(provider) = filter.provider.as_deref() {
            q = q.filter(Column::Provider.eq(provider));
        }
        if filter.limit > 0 {
            q = q.limit(u64::try_from(filter.limit).unwrap_or(u64::MAX));
        }
        let rows = q.all(&self.db).await?;
        Ok(rows
            .into_iter()
            .map(|m| ErrorLogEntry {
                at: m.at,
                provider: m.provider,
                credential_digest: m.credential_digest,
                egress: m.egress,
                status: m.status.and_then(|s| u16::try_from(s).ok()),
                message: m.message,
                request_body: m.request_body,
            })
            .collect())
    }

    async fn query_request_log(
        &self,
        filter: LogQueryFilter,
    ) -> StorageResult<Vec<RequestLogEntry>> {
        use entities::request_log::{Column, Entity};
        use sea_orm::{ColumnTrait, QueryFilter, QuerySelect};

        let mut q = Entity::find().order_by_desc(Column::At);
        if let Some(provider) = filter.provider.as_deref() {
            q = q.filter(Column::Provider.eq(provider));
        }
        if filter.limit > 0 {
            q = q.limit(u64::try_from(filter.limit).unwrap_or(u64::MAX));
        }
        let rows = q.all(&self.db).await?;
        Ok(rows
            .into_iter()
            .map(|m| RequestLogEntry {
                at: m.at,
                provider: m.provider,
                model: m.model,
                status: u16::try_from(m.status).unwrap_or(0),
                latency_ms: u64::try_from(m.latency_ms).unwrap_or(0),
            })
            .collect())
    }
}
