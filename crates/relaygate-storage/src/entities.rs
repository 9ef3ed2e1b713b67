//! SeaORM 2.0 entities for the three persisted tables (§1: "a key-value
//! settings table plus two append-only log tables"), using the
//! `#[sea_orm::model]` shorthand — no hand-written `Relation`/`PrimaryKeyTrait`.

pub mod settings {
    #[sea_orm::model]
    #[derive(Clone, Debug, PartialEq, sea_orm::DeriveEntityModel)]
    #[sea_orm(table_name = "settings")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub key: String,
        pub value: String,
        pub updated_at: time::OffsetDateTime,
    }

    impl sea_orm::ActiveModelBehavior for ActiveModel {}
}

pub mod error_log {
    #[sea_orm::model]
    #[derive(Clone, Debug, PartialEq, sea_orm::DeriveEntityModel)]
    #[sea_orm(table_name = "error_log")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub at: time::OffsetDateTime,
        pub provider: String,
        pub credential_digest: String,
        pub egress: String,
        pub status: Option<i32>,
        pub message: String,
        pub request_body: Option<String>,
    }

    impl sea_orm::ActiveModelBehavior for ActiveModel {}
}

pub mod request_log {
    #[sea_orm::model]
    #[derive(Clone, Debug, PartialEq, sea_orm::DeriveEntityModel)]
    #[sea_orm(table_name = "request_log")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub at: time::OffsetDateTime,
        pub provider: String,
        pub model: Option<String>,
        pub status: i32,
        pub latency_ms: i64,
    }

    impl sea_orm::ActiveModelBehavior for ActiveModel {}
}
