//! 测试用的脚本化协作方，记录调用顺序。

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{AdminBackend, EndpointProber};
use crate::error::{Result, SyncError};
use crate::models::{ConfigUpdate, FetchResult, SaveResult};

#[derive(Default)]
pub struct MockBackend {
    fast: Map<String, Value>,
    full: Map<String, Value>,
    fast_fails: bool,
    full_fails: bool,
    save_results: Mutex<VecDeque<SaveResult>>,
    pub submitted: Mutex<Vec<Vec<ConfigUpdate>>>,
    pub fetches: Mutex<Vec<bool>>,
}

impl MockBackend {
    pub fn new(fast: Value, full: Value) -> Self {
        Self {
            fast: as_map(fast),
            full: as_map(full),
            ..Self::default()
        }
    }

    pub fn failing_fast(mut self) -> Self {
        self.fast_fails = true;
        self
    }

    pub fn failing_full(mut self) -> Self {
        self.full_fails = true;
        self
    }

    pub fn push_save_result(&self, result: SaveResult) {
        self.save_results.lock().unwrap().push_back(result);
    }

    pub fn submitted(&self) -> Vec<Vec<ConfigUpdate>> {
        self.submitted.lock().unwrap().clone()
    }
}

fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[async_trait]
impl AdminBackend for MockBackend {
    async fn fetch_configs(&self, lazy: bool) -> Result<FetchResult> {
        self.fetches.lock().unwrap().push(lazy);
        let (fails, data) = if lazy {
            (self.fast_fails, &self.fast)
        } else {
            (self.full_fails, &self.full)
        };
        if fails {
            return Err(SyncError::Transport("connection refused".to_string()));
        }
        Ok(FetchResult {
            success: true,
            data: data.clone(),
        })
    }

    async fn submit_config_updates(&self, entries: Vec<ConfigUpdate>) -> Result<SaveResult> {
        self.submitted.lock().unwrap().push(entries);
        Ok(self
            .save_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SaveResult {
                success: true,
                data: None,
            }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCall {
    pub embedding: bool,
    pub url: String,
    pub key: String,
    pub model: Option<String>,
}

/// 默认所有探测成功；`failing_key` 指定的 key 探测失败
#[derive(Default)]
pub struct MockProber {
    failing_keys: HashSet<String>,
    pub calls: Mutex<Vec<ProbeCall>>,
}

impl MockProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_key(mut self, key: &str) -> Self {
        self.failing_keys.insert(key.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ProbeCall> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, key: &str) -> Option<Value> {
        if self.failing_keys.contains(key) {
            None
        } else {
            Some(json!({"ok": true}))
        }
    }
}

#[async_trait]
impl EndpointProber for MockProber {
    async fn probe_chat(&self, url: &str, key: &str, model: &str) -> Option<Value> {
        self.calls.lock().unwrap().push(ProbeCall {
            embedding: false,
            url: url.to_string(),
            key: key.to_string(),
            model: Some(model.to_string()),
        });
        self.answer(key)
    }

    async fn probe_embedding(&self, url: &str, key: &str) -> Option<Value> {
        self.calls.lock().unwrap().push(ProbeCall {
            embedding: true,
            url: url.to_string(),
            key: key.to_string(),
            model: None,
        });
        self.answer(key)
    }
}
