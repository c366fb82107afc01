//! 面向编辑器的修改操作。每个操作都会把所改的分区标记为脏。

use super::registry;
use super::AdminEngine;
use crate::error::{Result, SyncError};
use crate::models::{
    AmplifyGroup, AstGroup, EndpointEntry, FeatureFlag, ItemIdentity, ModelEndpoints,
    PromptCostAlert, PptxTemplate, RateLimit, SectionId, SectionValue, SupportedModel,
};

/// 取出指定分区的可变引用；分区未加载时返回错误
macro_rules! section_mut {
    ($engine:expr, $variant:ident) => {
        match $engine.state.get_mut(SectionId::$variant) {
            Some(SectionValue::$variant(value)) => value,
            _ => return Err(SyncError::SectionNotLoaded(SectionId::$variant)),
        }
    };
}

impl AdminEngine {
    pub fn set_admins(&mut self, admins: Vec<String>) -> Result<()> {
        *section_mut!(self, Admins) = admins;
        self.mark_dirty(SectionId::Admins)
    }

    pub fn set_rate_limit(&mut self, limit: RateLimit) -> Result<()> {
        *section_mut!(self, RateLimit) = limit;
        self.mark_dirty(SectionId::RateLimit)
    }

    pub fn set_prompt_cost_alert(&mut self, alert: PromptCostAlert) -> Result<()> {
        *section_mut!(self, PromptCostAlert) = alert;
        self.mark_dirty(SectionId::PromptCostAlert)
    }

    pub fn set_app_variable(&mut self, key: &str, value: &str) -> Result<()> {
        section_mut!(self, AppVariables).insert(key.to_string(), value.to_string());
        self.mark_dirty(SectionId::AppVariables)
    }

    pub fn remove_app_variable(&mut self, key: &str) -> Result<()> {
        if section_mut!(self, AppVariables).remove(key).is_none() {
            return Err(item_not_found(SectionId::AppVariables, key));
        }
        self.mark_dirty(SectionId::AppVariables)
    }

    pub fn set_app_secret(&mut self, key: &str, value: &str) -> Result<()> {
        section_mut!(self, AppSecrets).insert(key.to_string(), value.to_string());
        self.mark_dirty(SectionId::AppSecrets)
    }

    pub fn remove_app_secret(&mut self, key: &str) -> Result<()> {
        if section_mut!(self, AppSecrets).remove(key).is_none() {
            return Err(item_not_found(SectionId::AppSecrets, key));
        }
        self.mark_dirty(SectionId::AppSecrets)
    }

    pub fn set_feature_flag(&mut self, name: &str, flag: FeatureFlag) -> Result<()> {
        section_mut!(self, FeatureFlags).insert(name.to_string(), flag);
        self.mark_dirty(SectionId::FeatureFlags)
    }

    pub fn remove_feature_flag(&mut self, name: &str) -> Result<()> {
        if section_mut!(self, FeatureFlags).remove(name).is_none() {
            return Err(item_not_found(SectionId::FeatureFlags, name));
        }
        self.mark_dirty(SectionId::FeatureFlags)
    }

    /// 按 id 新增或替换模型
    pub fn upsert_supported_model(&mut self, model: SupportedModel) -> Result<()> {
        section_mut!(self, SupportedModels).insert(model.id.clone(), model);
        self.mark_dirty(SectionId::SupportedModels)
    }

    pub fn remove_supported_model(&mut self, id: &str) -> Result<()> {
        if section_mut!(self, SupportedModels).remove(id).is_none() {
            return Err(item_not_found(SectionId::SupportedModels, id));
        }
        self.mark_dirty(SectionId::SupportedModels)
    }

    /// 给模型新增端点，标记为 isNew，保存前会被探测
    pub fn add_endpoint(&mut self, model_name: &str, url: &str, key: &str) -> Result<()> {
        let config = section_mut!(self, OpenAiEndpoints);
        let entry = EndpointEntry {
            url: url.to_string(),
            key: key.to_string(),
            is_new: true,
        };
        let group_index = config
            .models
            .iter()
            .position(|group| group.contains_key(model_name));
        let group = match group_index {
            Some(i) => &mut config.models[i],
            None => {
                if config.models.is_empty() {
                    config.models.push(Default::default());
                }
                &mut config.models[0]
            }
        };
        group
            .entry(model_name.to_string())
            .or_insert_with(ModelEndpoints::default)
            .endpoints
            .push(entry);
        self.mark_dirty(SectionId::OpenAiEndpoints)
    }

    pub fn remove_endpoint(&mut self, model_name: &str, url: &str) -> Result<()> {
        let config = section_mut!(self, OpenAiEndpoints);
        let mut removed = false;
        for group in config.models.iter_mut() {
            if let Some(model) = group.get_mut(model_name) {
                let before = model.endpoints.len();
                model.endpoints.retain(|e| e.url != url);
                removed |= model.endpoints.len() != before;
            }
        }
        if !removed {
            return Err(item_not_found(
                SectionId::OpenAiEndpoints,
                &format!("{} {}", model_name, url),
            ));
        }
        self.mark_dirty(SectionId::OpenAiEndpoints)
    }

    pub fn set_amplify_group(&mut self, name: &str, group: AmplifyGroup) -> Result<()> {
        section_mut!(self, AmplifyGroups).insert(name.to_string(), group);
        self.mark_dirty(SectionId::AmplifyGroups)
    }

    pub fn remove_amplify_group(&mut self, name: &str) -> Result<()> {
        if section_mut!(self, AmplifyGroups).remove(name).is_none() {
            return Err(item_not_found(SectionId::AmplifyGroups, name));
        }
        self.mark_dirty(SectionId::AmplifyGroups)
    }

    /// 按名称新增或替换模板，并记入变更子集
    pub fn update_template(&mut self, template: PptxTemplate) -> Result<()> {
        let templates = section_mut!(self, PptxTemplates);
        let name = template.name.clone();
        match templates.iter_mut().find(|t| t.name == name) {
            Some(slot) => *slot = template,
            None => templates.push(template),
        }
        self.changed.record(SectionId::PptxTemplates, &name);
        self.mark_dirty(SectionId::PptxTemplates)
    }

    /// 助手管理组只能修改已有的组
    pub fn update_ast_group(&mut self, group: AstGroup) -> Result<()> {
        let groups = section_mut!(self, AstAdminGroups);
        let id = group.group_id.clone();
        let Some(slot) = groups.iter_mut().find(|g| g.group_id == id) else {
            return Err(item_not_found(SectionId::AstAdminGroups, &id));
        };
        *slot = group;
        self.changed.record(SectionId::AstAdminGroups, &id);
        self.mark_dirty(SectionId::AstAdminGroups)
    }

    /// 整体替换一个分区。列表型分区把新增或改动的条目记入变更子集。
    pub fn replace_section(&mut self, value: SectionValue) -> Result<()> {
        let id = value.id();
        if registry::rule_for(id).is_none() {
            return Err(SyncError::InvalidSectionValue {
                section: id,
                reason: "section is read-only".to_string(),
            });
        }
        let previous = self
            .state
            .get(id)
            .ok_or(SyncError::SectionNotLoaded(id))?;

        let touched = match (previous, &value) {
            (SectionValue::PptxTemplates(old), SectionValue::PptxTemplates(new)) => {
                check_no_removed(id, old, new)?;
                touched_items(old, new)
            }
            (SectionValue::AstAdminGroups(old), SectionValue::AstAdminGroups(new)) => {
                check_no_removed(id, old, new)?;
                // 助手管理组只能修改已有的组
                if let Some(unknown) = new
                    .iter()
                    .find(|g| !old.iter().any(|o| o.group_id == g.group_id))
                {
                    return Err(item_not_found(id, &unknown.group_id));
                }
                touched_items(old, new)
            }
            _ => Vec::new(),
        };
        for identity in &touched {
            self.changed.record(id, identity);
        }
        self.state.insert(value);
        self.mark_dirty(id)
    }
}

fn item_not_found(section: SectionId, item: &str) -> SyncError {
    SyncError::ItemNotFound {
        section,
        item: item.to_string(),
    }
}

/// 整体替换不能去掉已有条目：变更子集里表达不了删除
fn check_no_removed<T: ItemIdentity>(section: SectionId, old: &[T], new: &[T]) -> Result<()> {
    match old
        .iter()
        .find(|o| !new.iter().any(|n| n.identity() == o.identity()))
    {
        Some(removed) => Err(SyncError::InvalidSectionValue {
            section,
            reason: format!(
                "items cannot be removed by replacement: {}",
                removed.identity()
            ),
        }),
        None => Ok(()),
    }
}

/// 新列表里新增的或与旧值不同的条目标识
fn touched_items<T: ItemIdentity + PartialEq>(old: &[T], new: &[T]) -> Vec<String> {
    new.iter()
        .filter(|item| {
            old.iter()
                .find(|o| o.identity() == item.identity())
                .map(|o| o != *item)
                .unwrap_or(true)
        })
        .map(|item| item.identity().to_string())
        .collect()
}
