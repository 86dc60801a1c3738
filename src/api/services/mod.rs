//! actix-web 处理器
//!
//! - `track`：像素 / 点击重定向（无鉴权，fail-open）
//! - `ingest`：服务商 webhook 事件入口
//! - `send`：发送侧改写端点
//! - `analytics`：活动报表 / 序列 / 导出 / 重建
//! - `health`：健康检查

pub mod analytics;
pub mod health;
pub mod ingest;
pub mod send;
pub mod track;

use serde::{Deserialize, Serialize};

pub use analytics::analytics_routes;
pub use health::health_routes;
pub use ingest::ingest_routes;
pub use send::send_routes;
pub use track::tracking_routes;

/// API 统一响应包装
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            message: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}
