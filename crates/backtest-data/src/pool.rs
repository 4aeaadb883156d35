//! PostgreSQL 연결 풀.

use crate::error::{DataError, Result};
use backtest_core::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// 설정으로 새 연결 풀을 생성합니다.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool> {
    info!(max_connections = config.max_connections, "데이터베이스 연결 중");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| DataError::ConnectionError(e.to_string()))?;

    info!("데이터베이스 연결 완료");
    Ok(pool)
}

/// 데이터베이스 마이그레이션을 실행합니다.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    info!("데이터베이스 마이그레이션 실행 중");

    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| DataError::MigrationError(e.to_string()))?;

    info!("마이그레이션 완료");
    Ok(())
}
