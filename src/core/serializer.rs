use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::dirty::ChangedSubsetTracker;
use super::registry::{self, SerializeRule};
use crate::error::{Result, SyncError};
use crate::models::{
    AstGroup, ItemIdentity, OpenAiModelsConfig, SectionId, SectionState, SectionValue,
    WireEndpoint, WireModelEndpoints, WireModelsConfig,
};

/// 待探测的新端点，附带所属模型名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingProbe {
    pub model: String,
    pub url: String,
    pub key: String,
}

/// 单个分区的上线载荷，以及序列化过程中发现的新端点
#[derive(Debug, Clone, PartialEq)]
pub struct Serialized {
    pub payload: Value,
    pub probes: Vec<PendingProbe>,
}

/// 助手管理组上线时的固定字段集
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AstGroupUpdate {
    pub group_id: String,
    #[serde(rename = "isPublic")]
    pub is_public: bool,
    #[serde(rename = "amplifyGroups")]
    pub amplify_groups: Vec<String>,
    #[serde(rename = "supportConvAnalysis")]
    pub support_conv_analysis: bool,
}

impl From<&AstGroup> for AstGroupUpdate {
    fn from(group: &AstGroup) -> Self {
        AstGroupUpdate {
            group_id: group.group_id.clone(),
            is_public: group.is_public,
            amplify_groups: group.amplify_groups.clone(),
            support_conv_analysis: group.support_conv_analysis,
        }
    }
}

/// 按分区规则生成上线载荷。没有规则的分区直接报错，不能静默丢弃。
pub fn serialize(
    id: SectionId,
    state: &SectionState,
    changed: &ChangedSubsetTracker,
) -> Result<Serialized> {
    let rule = registry::rule_for(id).ok_or(SyncError::SerializationFault(id))?;
    let value = state.get(id).ok_or(SyncError::SectionNotLoaded(id))?;

    match (rule, value) {
        (SerializeRule::PassThrough, value) => Ok(Serialized {
            payload: value.to_json()?,
            probes: Vec::new(),
        }),
        (SerializeRule::ChangedItems, SectionValue::PptxTemplates(templates)) => {
            let subset: Vec<_> = changed_subset(templates, changed.changed(id)).collect();
            Ok(Serialized {
                payload: serde_json::to_value(subset)?,
                probes: Vec::new(),
            })
        }
        (SerializeRule::ChangedItems, SectionValue::AstAdminGroups(groups)) => {
            let subset: Vec<AstGroupUpdate> = changed_subset(groups, changed.changed(id))
                .map(AstGroupUpdate::from)
                .collect();
            Ok(Serialized {
                payload: serde_json::to_value(subset)?,
                probes: Vec::new(),
            })
        }
        (SerializeRule::Endpoints, SectionValue::OpenAiEndpoints(config)) => {
            let (wire, probes) = project_endpoints(config);
            Ok(Serialized {
                payload: serde_json::to_value(wire)?,
                probes,
            })
        }
        // 规则和值的形状对不上
        _ => Err(SyncError::SerializationFault(id)),
    }
}

fn changed_subset<'a, T: ItemIdentity>(
    items: &'a [T],
    changed: &'a [String],
) -> impl Iterator<Item = &'a T> + 'a {
    items
        .iter()
        .filter(move |item| changed.iter().any(|c| c == item.identity()))
}

/// 编辑态 → 上线形态。空 url 或空 key 的端点丢弃；isNew 端点剥离标记并进入探测队列。
pub fn project_endpoints(config: &OpenAiModelsConfig) -> (WireModelsConfig, Vec<PendingProbe>) {
    let mut probes = Vec::new();
    let models = config
        .models
        .iter()
        .map(|group| {
            group
                .iter()
                .map(|(model_name, model)| {
                    let endpoints = model
                        .endpoints
                        .iter()
                        .filter(|e| !e.url.is_empty() && !e.key.is_empty())
                        .map(|e| {
                            if e.is_new {
                                probes.push(PendingProbe {
                                    model: model_name.clone(),
                                    url: e.url.clone(),
                                    key: e.key.clone(),
                                });
                            }
                            WireEndpoint::from(e)
                        })
                        .collect();
                    (model_name.clone(), WireModelEndpoints { endpoints })
                })
                .collect::<BTreeMap<_, _>>()
        })
        .collect();
    (WireModelsConfig { models }, probes)
}
