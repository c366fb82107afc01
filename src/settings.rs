use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::loader::LoadOptions;

pub const ENV_BACKEND_URL: &str = "ADMIN_SYNC_BACKEND_URL";
pub const ENV_LISTEN: &str = "ADMIN_SYNC_LISTEN";
pub const ENV_USER_EMAIL: &str = "ADMIN_SYNC_USER_EMAIL";
pub const ENV_PROBE_URL: &str = "ADMIN_SYNC_PROBE_URL";

/// 后端存储：远端管理服务或本地 JSON 文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendSettings {
    Http { base_url: String },
    File { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendSettings,
    pub listen_addr: String,
    /// 当前管理员邮箱，用于发布 adminInterface 开关
    pub user_email: Option<String>,
    pub builtin_group_name: String,
    pub request_timeout_secs: u64,
    /// 端点探测服务地址，未设置时使用 http 后端的地址
    pub probe_base_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendSettings::File {
                path: PathBuf::from("admin-data.json"),
            },
            listen_addr: "127.0.0.1:3000".to_string(),
            user_email: None,
            builtin_group_name: LoadOptions::default().builtin_group_name,
            request_timeout_secs: 30,
            probe_base_url: None,
        }
    }
}

impl Settings {
    /// 从 JSON 文件加载。文件不存在使用默认值，文件损坏记录警告并使用默认值。
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Settings>(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!("配置文件损坏，使用默认配置 {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("无法读取配置文件，使用默认配置 {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// 环境变量覆盖文件配置
    pub fn with_env(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            self.backend = BackendSettings::Http { base_url: url };
        }
        if let Some(addr) = lookup(ENV_LISTEN) {
            self.listen_addr = addr;
        }
        if let Some(email) = lookup(ENV_USER_EMAIL) {
            self.user_email = Some(email);
        }
        if let Some(url) = lookup(ENV_PROBE_URL) {
            self.probe_base_url = Some(url);
        }
        self
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            builtin_group_name: self.builtin_group_name.clone(),
        }
    }

    /// 探测服务地址。文件后端且未配置时返回 None
    pub fn probe_url(&self) -> Option<&str> {
        match (&self.probe_base_url, &self.backend) {
            (Some(url), _) => Some(url.as_str()),
            (None, BackendSettings::Http { base_url }) => Some(base_url.as_str()),
            (None, BackendSettings::File { .. }) => None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
