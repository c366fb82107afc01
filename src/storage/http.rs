use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use super::{AdminBackend, EndpointProber};
use crate::error::{Result, SyncError};
use crate::models::{ConfigUpdate, FetchResult, SaveResult};

/// 远端管理服务客户端，同时承担后端存储和端点探测
pub struct HttpAdminClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    data: &'a [ConfigUpdate],
}

#[derive(Serialize)]
struct ProbeRequest<'a> {
    url: &'a str,
    key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

impl HttpAdminClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_probe(&self, path: &str, body: &ProbeRequest<'_>) -> Option<Value> {
        let resp = match self.client.post(self.url(path)).json(body).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(url = body.url, "probe request failed: {}", e);
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::warn!(url = body.url, status = %resp.status(), "probe rejected");
            return None;
        }
        match resp.json::<Value>().await {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(url = body.url, "probe response unreadable: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl AdminBackend for HttpAdminClient {
    async fn fetch_configs(&self, lazy: bool) -> Result<FetchResult> {
        let mut req = self.client.get(self.url("/admin/configs"));
        if lazy {
            req = req.query(&[("lazy", "true")]);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SyncError::Transport(format!(
                "admin service returned {}: {}",
                status, text
            )));
        }
        Ok(resp.json::<FetchResult>().await?)
    }

    async fn submit_config_updates(&self, entries: Vec<ConfigUpdate>) -> Result<SaveResult> {
        let resp = self
            .client
            .post(self.url("/admin/configs/update"))
            .json(&UpdateRequest { data: &entries })
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        // 失败时服务端同样返回 SaveResult 结构，带分区明细
        match serde_json::from_str::<SaveResult>(&text) {
            Ok(result) => Ok(result),
            Err(e) if status.is_success() => Err(e.into()),
            Err(_) => Err(SyncError::Transport(format!(
                "admin service returned {}: {}",
                status, text
            ))),
        }
    }
}

#[async_trait]
impl EndpointProber for HttpAdminClient {
    async fn probe_chat(&self, url: &str, key: &str, model: &str) -> Option<Value> {
        let body = ProbeRequest {
            url,
            key,
            model: Some(model),
        };
        self.post_probe("/admin/test/endpoint", &body).await
    }

    async fn probe_embedding(&self, url: &str, key: &str) -> Option<Value> {
        let body = ProbeRequest {
            url,
            key,
            model: None,
        };
        self.post_probe("/admin/test/embedding", &body).await
    }
}
