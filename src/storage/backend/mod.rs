//! SeaORM 持久化后端
//!
//! 支持 SQLite、MySQL/MariaDB、PostgreSQL。
//! 事件日志、汇总表、追踪引用的全部读写都经过这里。

mod aggregates;
mod connection;
mod event_sink;
mod query;
mod references;
pub mod retry;

use sea_orm::DatabaseConnection;

use crate::config::DatabaseConfig;
use crate::errors::{MailbeaconError, Result};
use retry::RetryConfig;

pub use aggregates::apply_event;
pub use connection::{connect_generic, connect_sqlite, run_migrations};
pub use query::{
    CampaignAnalytics, EventView, ExportDocument, LinkView, RecipientView, SeriesBucket,
};

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite://")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(MailbeaconError::database_config(format!(
            "无法从 URL 推断数据库类型: {}. 支持 sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// SeaORM 存储后端
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: String,
    retry_config: RetryConfig,
}

impl SeaOrmStorage {
    /// 按配置建立连接并跑迁移
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let backend_name = infer_backend_from_url(&config.database_url)?;

        let db = match backend_name.as_str() {
            "sqlite" => connect_sqlite(&config.database_url).await?,
            other => connect_generic(&config.database_url, other, config.pool_size).await?,
        };

        run_migrations(&db).await?;

        Ok(Self {
            db,
            backend_name,
            retry_config: RetryConfig {
                max_retries: config.retry_count,
                base_delay_ms: config.retry_base_delay_ms,
                max_delay_ms: config.retry_max_delay_ms,
            },
        })
    }

    /// 包装已有连接（测试用）
    pub fn from_connection(db: DatabaseConnection, backend_name: &str) -> Self {
        Self {
            db,
            backend_name: backend_name.to_string(),
            retry_config: RetryConfig::default(),
        }
    }

    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    pub(crate) fn retry_config(&self) -> RetryConfig {
        self.retry_config
    }

    /// 连通性探测（带超时），健康检查端点使用
    pub async fn ping(&self, timeout_ms: u64) -> Result<()> {
        use sea_orm::ConnectionTrait;

        let probe = self.db.execute_unprepared("SELECT 1");

        match tokio::time::timeout(std::time::Duration::from_millis(timeout_ms), probe).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(MailbeaconError::database_connection(format!(
                "数据库探测失败: {}",
                e
            ))),
            Err(_) => Err(MailbeaconError::database_connection(format!(
                "数据库探测超时（{} ms）",
                timeout_ms
            ))),
        }
    }

    pub async fn close(self) -> Result<()> {
        self.db
            .close()
            .await
            .map_err(|e| MailbeaconError::database_connection(e.to_string()))
    }
}
