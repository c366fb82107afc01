pub mod file;
pub mod http;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::{ConfigUpdate, FetchResult, SaveResult};

/// 管理配置的后端存储
#[async_trait]
pub trait AdminBackend: Send + Sync {
    /// `lazy = true` 只取快速加载所需的分区
    async fn fetch_configs(&self, lazy: bool) -> Result<FetchResult>;

    async fn submit_config_updates(&self, entries: Vec<ConfigUpdate>) -> Result<SaveResult>;
}

/// 端点探测。返回 falsy 值即视为失败，不依赖错误返回。
#[async_trait]
pub trait EndpointProber: Send + Sync {
    async fn probe_chat(&self, url: &str, key: &str, model: &str) -> Option<Value>;

    async fn probe_embedding(&self, url: &str, key: &str) -> Option<Value>;
}

/// None、null、false、空串、0 都算失败
pub fn is_truthy(result: &Option<Value>) -> bool {
    match result {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
