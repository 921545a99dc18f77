use crate::types::{InfraError, InfraResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// データベース接続プールを作成
/// 接続文字列は設定（`database_dsn`）から渡される
pub async fn create_pool(database_dsn: &str) -> InfraResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_dsn)
        .await
        .map_err(InfraError::database_connection)
}

/// データベースの初期化（マイグレーション実行）
pub async fn initialize_database(pool: &PgPool) -> InfraResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(InfraError::migration)
}

/// プールの作成とデータベース初期化を一括で行う便利関数
pub async fn setup_database(database_dsn: &str) -> InfraResult<PgPool> {
    let pool = create_pool(database_dsn).await?;
    initialize_database(&pool).await?;
    Ok(pool)
}
