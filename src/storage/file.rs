use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::AdminBackend;
use crate::core::registry;
use crate::error::{Result, SyncError};
use crate::models::{ConfigUpdate, FetchResult, SaveResult, SectionId, SectionSaveStatus};

/// 本地 JSON 文件作为后端存储，离线管理时使用
pub struct FileBackend {
    file_path: PathBuf,
    // 串行化读改写
    write_lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(file_path: &Path) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// 读取文件。文件不存在视为空；文件损坏则报错，不能静默当成空配置。
    fn read_all(&self) -> Result<Map<String, Value>> {
        if !self.file_path.exists() {
            return Ok(Map::new());
        }
        let content = std::fs::read_to_string(&self.file_path)?;
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(SyncError::Load(format!(
                "{:?} top level is not an object",
                self.file_path
            ))),
        }
    }

    fn write_all(&self, data: &Map<String, Value>) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;

        // 确保父目录存在
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(&self.file_path, json)?;
        Ok(())
    }
}

#[async_trait]
impl AdminBackend for FileBackend {
    async fn fetch_configs(&self, lazy: bool) -> Result<FetchResult> {
        let all = self.read_all()?;
        let data = if lazy {
            all.into_iter()
                .filter(|(k, _)| {
                    k.parse::<SectionId>()
                        .map(registry::is_fast)
                        .unwrap_or(false)
                })
                .collect()
        } else {
            all
        };
        Ok(FetchResult {
            success: true,
            data,
        })
    }

    /// 合并成功的分区写入文件；失败的分区不出现在 `data` 里
    async fn submit_config_updates(&self, entries: Vec<ConfigUpdate>) -> Result<SaveResult> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all()?;
        let mut detail = BTreeMap::new();
        let submitted = entries.len();

        for entry in entries {
            let key = entry.section.as_str();
            let current = all.get(key).cloned().unwrap_or(Value::Null);
            match merge_section(entry.section, current, entry.data) {
                Ok(value) => {
                    all.insert(key.to_string(), value);
                    detail.insert(key.to_string(), SectionSaveStatus { success: true });
                }
                Err(e) => tracing::warn!(section = key, "merge failed: {}", e),
            }
        }

        if !detail.is_empty() {
            self.write_all(&all)?;
        }
        Ok(SaveResult {
            success: detail.len() == submitted,
            data: Some(detail),
        })
    }
}

/// 列表型分区只收到变更子集，需要按条目标识合并回完整列表
fn merge_section(section: SectionId, current: Value, incoming: Value) -> Result<Value> {
    match section {
        SectionId::PptxTemplates => merge_items(section, current, incoming, "name", true),
        SectionId::AstAdminGroups => merge_items(section, current, incoming, "group_id", false),
        _ => Ok(incoming),
    }
}

fn merge_items(
    section: SectionId,
    current: Value,
    incoming: Value,
    id_field: &str,
    allow_insert: bool,
) -> Result<Value> {
    let mut items = match current {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        _ => {
            return Err(SyncError::InvalidSectionValue {
                section,
                reason: "stored value is not a list".to_string(),
            })
        }
    };
    let updates = match incoming {
        Value::Array(updates) => updates,
        _ => {
            return Err(SyncError::InvalidSectionValue {
                section,
                reason: "update is not a list".to_string(),
            })
        }
    };

    for update in updates {
        let id = update
            .get(id_field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SyncError::InvalidSectionValue {
                section,
                reason: format!("item without {}", id_field),
            })?;
        let pos = items
            .iter()
            .position(|item| item.get(id_field).and_then(Value::as_str) == Some(id.as_str()));
        match (pos, update) {
            (Some(i), Value::Object(fields)) if !allow_insert => match &mut items[i] {
                // 只覆盖投影字段，其余字段保留
                Value::Object(target) => target.extend(fields),
                slot => *slot = Value::Object(fields),
            },
            (Some(i), update) => items[i] = update,
            (None, update) if allow_insert => items.push(update),
            (None, _) => {
                return Err(SyncError::ItemNotFound { section, item: id });
            }
        }
    }
    Ok(Value::Array(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_store(tmp: &TempDir, value: Value) -> PathBuf {
        let path = tmp.path().join("admin.json");
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_lazy_fetch_returns_fast_subset() {
        let tmp = TempDir::new().unwrap();
        let path = write_store(
            &tmp,
            json!({
                "admins": ["a@x.test"],
                "applicationVariables": {"A": "1"},
                "rateLimit": {"period": "Daily", "rate": 3.0}
            }),
        );
        let backend = FileBackend::new(&path);

        let fast = backend.fetch_configs(true).await.unwrap();
        assert!(fast.data.contains_key("admins"));
        assert!(fast.data.contains_key("rateLimit"));
        assert!(!fast.data.contains_key("applicationVariables"));

        let full = backend.fetch_configs(false).await.unwrap();
        assert_eq!(full.data.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::new(&tmp.path().join("nope.json"));
        let result = backend.fetch_configs(false).await.unwrap();
        assert!(result.success);
        assert!(result.data.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("admin.json");
        std::fs::write(&path, "{{not json").unwrap();
        let backend = FileBackend::new(&path);
        assert!(backend.fetch_configs(true).await.is_err());
    }

    #[tokio::test]
    async fn test_submit_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/admin.json");
        let backend = FileBackend::new(&path);

        let result = backend
            .submit_config_updates(vec![ConfigUpdate {
                section: SectionId::Admins,
                data: json!(["root@x.test"]),
            }])
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data.unwrap()["admins"], SectionSaveStatus { success: true });

        let stored: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored["admins"], json!(["root@x.test"]));
    }

    #[tokio::test]
    async fn test_templates_merged_by_name() {
        let tmp = TempDir::new().unwrap();
        let path = write_store(
            &tmp,
            json!({"powerPointTemplates": [
                {"name": "a", "isAvailable": false, "amplifyGroups": []},
                {"name": "b", "isAvailable": true, "amplifyGroups": []}
            ]}),
        );
        let backend = FileBackend::new(&path);
        backend
            .submit_config_updates(vec![ConfigUpdate {
                section: SectionId::PptxTemplates,
                data: json!([
                    {"name": "a", "isAvailable": true, "amplifyGroups": ["g"]},
                    {"name": "c", "isAvailable": true, "amplifyGroups": []}
                ]),
            }])
            .await
            .unwrap();

        let full = backend.fetch_configs(false).await.unwrap();
        let templates = full.data["powerPointTemplates"].as_array().unwrap();
        assert_eq!(templates.len(), 3);
        assert_eq!(templates[0]["isAvailable"], json!(true));
        assert_eq!(templates[1]["name"], json!("b"));
        assert_eq!(templates[2]["name"], json!("c"));
    }

    #[tokio::test]
    async fn test_ast_groups_merge_keeps_unsent_fields() {
        let tmp = TempDir::new().unwrap();
        let path = write_store(
            &tmp,
            json!({"assistantAdminGroups": [
                {"group_id": "g1", "groupName": "Team", "isPublic": false,
                 "amplifyGroups": [], "supportConvAnalysis": false, "assistants": ["x"]}
            ]}),
        );
        let backend = FileBackend::new(&path);
        let result = backend
            .submit_config_updates(vec![ConfigUpdate {
                section: SectionId::AstAdminGroups,
                data: json!([{"group_id": "g1", "isPublic": true,
                              "amplifyGroups": ["e"], "supportConvAnalysis": true}]),
            }])
            .await
            .unwrap();
        assert!(result.success);

        let full = backend.fetch_configs(false).await.unwrap();
        let group = &full.data["assistantAdminGroups"][0];
        assert_eq!(group["isPublic"], json!(true));
        assert_eq!(group["groupName"], json!("Team"));
        assert_eq!(group["assistants"], json!(["x"]));
    }

    #[tokio::test]
    async fn test_unknown_ast_group_fails_that_section_only() {
        let tmp = TempDir::new().unwrap();
        let path = write_store(&tmp, json!({"assistantAdminGroups": []}));
        let backend = FileBackend::new(&path);
        let result = backend
            .submit_config_updates(vec![
                ConfigUpdate {
                    section: SectionId::AstAdminGroups,
                    data: json!([{"group_id": "missing", "isPublic": true}]),
                },
                ConfigUpdate {
                    section: SectionId::AppVariables,
                    data: json!({"A": "1"}),
                },
            ])
            .await
            .unwrap();

        assert!(!result.success);
        let detail = result.data.unwrap();
        assert!(!detail.contains_key("assistantAdminGroups"));
        assert!(detail["applicationVariables"].success);

        // 成功的分区照常落盘
        let full = backend.fetch_configs(false).await.unwrap();
        assert_eq!(full.data["applicationVariables"], json!({"A": "1"}));
        assert_eq!(full.data["assistantAdminGroups"], json!([]));
    }
}
