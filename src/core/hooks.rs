//! 提交成功后的下游通知。引擎只负责按分区调用，不关心下游是谁。

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::models::{FeatureFlag, SectionId, SectionState, SectionValue, SupportedModel};

pub type PostCommitHook = Arc<dyn Fn(&SectionState) + Send + Sync>;

#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: BTreeMap<SectionId, Vec<PostCommitHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: SectionId, hook: PostCommitHook) {
        self.hooks.entry(id).or_default().push(hook);
    }

    /// 只在确认提交成功后调用
    pub fn run(&self, committed: &[SectionId], state: &SectionState) {
        for id in committed {
            if let Some(hooks) = self.hooks.get(id) {
                tracing::debug!(section = %id, count = hooks.len(), "running post-commit hooks");
                for hook in hooks {
                    hook(state);
                }
            }
        }
    }
}

/// 发布给下游的功能开关
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedFeatureFlags {
    pub flags: BTreeMap<String, bool>,
    pub admin_interface: bool,
    pub mix_panel: bool,
}

/// 对外可见的模型信息
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedModel {
    pub id: String,
    pub name: String,
    pub description: String,
    pub input_context_window: u64,
    pub supports_images: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPointers {
    pub default_model_id: Option<String>,
    pub cheapest_model_id: Option<String>,
    pub advanced_model_id: Option<String>,
    pub available_models: Vec<PublishedModel>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedState {
    pub feature_flags: Option<PublishedFeatureFlags>,
    pub models: Option<ModelPointers>,
}

pub type SharedPublished = Arc<RwLock<PublishedState>>;

pub fn derive_feature_flags(
    flags: &BTreeMap<String, FeatureFlag>,
    admins: &[String],
    user_email: Option<&str>,
) -> PublishedFeatureFlags {
    let enabled: BTreeMap<String, bool> = flags
        .iter()
        .map(|(name, flag)| (name.clone(), flag.enabled))
        .collect();
    let mix_panel = enabled.get("mixPanel").copied().unwrap_or(false);
    let admin_interface = user_email
        .map(|email| admins.iter().any(|a| a == email))
        .unwrap_or(false);
    PublishedFeatureFlags {
        flags: enabled,
        admin_interface,
        mix_panel,
    }
}

pub fn derive_model_pointers(models: &BTreeMap<String, SupportedModel>) -> ModelPointers {
    let find = |pred: fn(&SupportedModel) -> bool| {
        models.values().find(|m| pred(m)).map(|m| m.id.clone())
    };
    ModelPointers {
        default_model_id: find(|m| m.is_default),
        cheapest_model_id: find(|m| m.default_cheapest_model),
        advanced_model_id: find(|m| m.default_advanced_model),
        available_models: models
            .values()
            .filter(|m| m.is_available)
            .map(|m| PublishedModel {
                id: m.id.clone(),
                name: m.name.clone(),
                description: m.description.clone(),
                input_context_window: m.input_context_window,
                supports_images: m.supports_images,
            })
            .collect(),
    }
}

/// 功能开关变更 → 发布开关和当前用户的管理员身份
pub fn feature_flag_hook(published: SharedPublished, user_email: Option<String>) -> PostCommitHook {
    Arc::new(move |state: &SectionState| {
        let Some(SectionValue::FeatureFlags(flags)) = state.get(SectionId::FeatureFlags) else {
            return;
        };
        let admins: &[String] = match state.get(SectionId::Admins) {
            Some(SectionValue::Admins(admins)) => admins.as_slice(),
            _ => &[],
        };
        let derived = derive_feature_flags(flags, admins, user_email.as_deref());
        match published.write() {
            Ok(mut guard) => guard.feature_flags = Some(derived),
            Err(e) => tracing::error!("published state poisoned: {}", e),
        }
    })
}

/// 模型变更 → 重新计算默认/最便宜/高级模型和可用模型列表
pub fn supported_models_hook(published: SharedPublished) -> PostCommitHook {
    Arc::new(move |state: &SectionState| {
        let Some(SectionValue::SupportedModels(models)) = state.get(SectionId::SupportedModels)
        else {
            return;
        };
        let derived = derive_model_pointers(models);
        tracing::info!(
            available = derived.available_models.len(),
            "publishing supported models"
        );
        match published.write() {
            Ok(mut guard) => guard.models = Some(derived),
            Err(e) => tracing::error!("published state poisoned: {}", e),
        }
    })
}
