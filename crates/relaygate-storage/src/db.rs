//! Connection helper. No process-wide cache: per §9's "singleton managers →
//! explicit state handle" note, the connection is owned by the
//! `SeaOrmStorage` instance that calls `connect`, not by a global.

use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr};

pub async fn connect(dsn: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(dsn).await?;
    if db.get_database_backend() == DatabaseBackend::Sqlite {
        db.execute_unprepared("PRAGMA foreign_keys = ON").await?;
    }
    Ok(db)
}
