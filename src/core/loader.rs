use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::watch;

use super::registry;
use crate::error::{Result, SyncError};
use crate::models::{FetchResult, SectionId, SectionState, SectionValue, SupportedModel};
use crate::storage::AdminBackend;

pub const LOADING_MESSAGE: &str = "Loading Admin Interface...";

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// 内置助手组的名称，加载后缓存其 group_id
    pub builtin_group_name: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            builtin_group_name: "Amplify Assistants".to_string(),
        }
    }
}

/// 一次完整加载的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub state: SectionState,
    pub builtin_group_id: Option<String>,
}

/// 两阶段加载：快速请求和完整请求同时发出，先应用快速结果再等待完整结果。
/// 任一阶段失败都返回 `SyncError::Load`，不产生部分状态。
pub async fn load(
    backend: Arc<dyn AdminBackend>,
    options: &LoadOptions,
    progress: &watch::Sender<String>,
) -> Result<Snapshot> {
    progress.send_replace(LOADING_MESSAGE.to_string());

    let full_backend = backend.clone();
    let full_req = tokio::spawn(async move { full_backend.fetch_configs(false).await });

    let fast = match backend.fetch_configs(true).await {
        Ok(result) => result,
        Err(e) => {
            full_req.abort();
            progress.send_replace(String::new());
            return Err(SyncError::Load(format!("fast phase: {}", e)));
        }
    };
    let fast = match ensure_success("fast", fast) {
        Ok(data) => data,
        Err(e) => {
            full_req.abort();
            progress.send_replace(String::new());
            return Err(e);
        }
    };

    let mut state = SectionState::new();
    for id in registry::FAST_SECTIONS {
        match parse_section(id, fast.get(id.as_str())) {
            Ok(value) => state.insert(value),
            Err(e) => {
                full_req.abort();
                progress.send_replace(String::new());
                return Err(e);
            }
        }
    }
    // 快速阶段应用完毕，界面可以交互
    progress.send_replace(String::new());
    tracing::info!(sections = state.len(), "fast phase applied");

    let full = full_req
        .await
        .map_err(|e| SyncError::Load(format!("full phase task: {}", e)))?
        .map_err(|e| SyncError::Load(format!("full phase: {}", e)))?;
    let full = ensure_success("full", full)?;

    for key in full.keys() {
        if key.parse::<SectionId>().is_err() {
            tracing::warn!(section = %key, "skipping unknown section");
        }
    }

    let mut builtin_group_id = None;
    for id in SectionId::ALL.into_iter().filter(|id| !registry::is_fast(*id)) {
        let value = match (id, parse_section(id, full.get(id.as_str()))?) {
            (SectionId::Ops, SectionValue::Ops(mut ops)) => {
                ops.sort_by(|a, b| a.name.cmp(&b.name));
                SectionValue::Ops(ops)
            }
            (SectionId::AstAdminGroups, SectionValue::AstAdminGroups(groups)) => {
                builtin_group_id = groups
                    .iter()
                    .find(|g| g.group_name == options.builtin_group_name)
                    .map(|g| g.group_id.clone());
                SectionValue::AstAdminGroups(groups)
            }
            (_, value) => value,
        };
        state.insert(value);
    }

    tracing::info!(
        sections = state.len(),
        builtin_group = ?builtin_group_id,
        "admin configurations loaded"
    );
    Ok(Snapshot {
        state,
        builtin_group_id,
    })
}

fn ensure_success(phase: &str, result: FetchResult) -> Result<Map<String, Value>> {
    if result.success {
        Ok(result.data)
    } else {
        Err(SyncError::Load(format!("{} phase reported failure", phase)))
    }
}

/// 缺省或 null 视为空值；模型分区先回填 null 字段
fn parse_section(id: SectionId, raw: Option<&Value>) -> Result<SectionValue> {
    let value = match raw {
        None | Some(Value::Null) => return Ok(SectionValue::empty(id)),
        Some(value) => value.clone(),
    };
    let value = if id == SectionId::SupportedModels {
        backfill_models(value)?
    } else {
        value
    };
    SectionValue::from_json(id, value).map_err(|e| SyncError::Load(e.to_string()))
}

/// 各模型条目中值为 null 的字段用默认模型模板的值替换
fn backfill_models(value: Value) -> Result<Value> {
    let template = serde_json::to_value(SupportedModel::default())?;
    let Value::Object(models) = value else {
        return Ok(value);
    };
    let models = models
        .into_iter()
        .map(|(id, model)| (id, backfill_nulls(model, &template)))
        .collect();
    Ok(Value::Object(models))
}

fn backfill_nulls(model: Value, template: &Value) -> Value {
    match model {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(prop, v)| match (v, template.get(&prop)) {
                    (Value::Null, Some(default)) => (prop, default.clone()),
                    (v, _) => (prop, v),
                })
                .collect(),
        ),
        other => other,
    }
}
