use std::{str::FromStr, time::Duration};

use deadpool_postgres::{Config, CreatePoolError, ManagerConfig, Pool, PoolError, RecyclingMethod, Runtime};
use thiserror::Error;
use tokio_postgres::NoTls;

pub type PgPool = Pool;

#[derive(Debug, Error)]
pub enum DbPoolError {
    #[error("invalid database url: {0}")]
    InvalidConfig(String),
    #[error("failed to create database pool: {0}")]
    PoolCreation(#[from] CreatePoolError),
    #[error("failed to get postgres connection: {0}")]
    Checkout(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    #[error("database did not answer within {0:?}")]
    Timeout(Duration),
}

/// Build a lazily-connecting pool. Only the URL syntax is validated here.
pub fn create_pool_from_url(db_url: &str) -> Result<PgPool, DbPoolError> {
    tokio_postgres::Config::from_str(db_url).map_err(|e| DbPoolError::InvalidConfig(e.to_string()))?;

    let mut cfg = Config::new();
    cfg.url = Some(db_url.to_string());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    Ok(cfg.create_pool(Some(Runtime::Tokio1), NoTls)?)
}

/// `SELECT 1` with a deadline; used by `/readyz`.
pub async fn ping(pool: &PgPool, deadline: Duration) -> Result<(), DbPoolError> {
    let check = async {
        let client = pool.get().await?;
        client.simple_query("SELECT 1").await?;
        Ok::<_, DbPoolError>(())
    };

    tokio::time::timeout(deadline, check)
        .await
        .map_err(|_| DbPoolError::Timeout(deadline))?
}
