use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SyncError};

/// 配置分区标识。字符串形式稳定，可直接作为 map key 上线传输。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SectionId {
    #[serde(rename = "admins")]
    Admins,
    #[serde(rename = "rateLimit")]
    RateLimit,
    #[serde(rename = "promptCostAlert")]
    PromptCostAlert,
    #[serde(rename = "applicationVariables")]
    AppVariables,
    #[serde(rename = "applicationSecrets")]
    AppSecrets,
    #[serde(rename = "featureFlags")]
    FeatureFlags,
    #[serde(rename = "supportedModels")]
    SupportedModels,
    #[serde(rename = "openaiEndpoints")]
    OpenAiEndpoints,
    #[serde(rename = "amplifyGroups")]
    AmplifyGroups,
    #[serde(rename = "ops")]
    Ops,
    #[serde(rename = "assistantAdminGroups")]
    AstAdminGroups,
    #[serde(rename = "powerPointTemplates")]
    PptxTemplates,
}

impl SectionId {
    pub const ALL: [SectionId; 12] = [
        SectionId::Admins,
        SectionId::RateLimit,
        SectionId::PromptCostAlert,
        SectionId::AppVariables,
        SectionId::AppSecrets,
        SectionId::FeatureFlags,
        SectionId::SupportedModels,
        SectionId::OpenAiEndpoints,
        SectionId::AmplifyGroups,
        SectionId::Ops,
        SectionId::AstAdminGroups,
        SectionId::PptxTemplates,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SectionId::Admins => "admins",
            SectionId::RateLimit => "rateLimit",
            SectionId::PromptCostAlert => "promptCostAlert",
            SectionId::AppVariables => "applicationVariables",
            SectionId::AppSecrets => "applicationSecrets",
            SectionId::FeatureFlags => "featureFlags",
            SectionId::SupportedModels => "supportedModels",
            SectionId::OpenAiEndpoints => "openaiEndpoints",
            SectionId::AmplifyGroups => "amplifyGroups",
            SectionId::Ops => "ops",
            SectionId::AstAdminGroups => "assistantAdminGroups",
            SectionId::PptxTemplates => "powerPointTemplates",
        }
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        SectionId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| SyncError::UnknownSection(s.to_string()))
    }
}

// ---- 各分区的数据形状 ----

/// 限流周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RatePeriod {
    #[default]
    Unlimited,
    Monthly,
    Daily,
    Hourly,
    Total,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimit {
    pub period: RatePeriod,
    pub rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PromptCostAlert {
    pub is_active: bool,
    pub alert_message: String,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureFlag {
    pub enabled: bool,
    pub user_exceptions: Vec<String>,
    pub amplify_group_exceptions: Vec<String>,
}

/// 支持的模型。加载时 null 字段会被默认模板回填，见 `core::loader`。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SupportedModel {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub description: String,
    pub input_context_window: u64,
    pub output_token_limit: u64,
    pub input_token_cost: f64,
    pub output_token_cost: f64,
    pub cached_token_cost: f64,
    pub is_available: bool,
    pub is_built_in: bool,
    pub is_default: bool,
    pub default_cheapest_model: bool,
    pub default_advanced_model: bool,
    pub default_embeddings_model: bool,
    #[serde(rename = "defaultQAModel")]
    pub default_qa_model: bool,
    pub supports_images: bool,
    pub supports_reasoning: bool,
    pub supports_system_prompts: bool,
    pub system_prompt: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 编辑态的端点。`is_new` 只存在于内存，上线前由 serializer 投影掉。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndpointEntry {
    pub url: String,
    pub key: String,
    #[serde(default, rename = "isNew")]
    pub is_new: bool,
}

/// 上线形态的端点，没有 `isNew`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEndpoint {
    pub url: String,
    pub key: String,
}

impl From<&EndpointEntry> for WireEndpoint {
    fn from(entry: &EndpointEntry) -> Self {
        WireEndpoint {
            url: entry.url.clone(),
            key: entry.key.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelEndpoints {
    #[serde(default)]
    pub endpoints: Vec<EndpointEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireModelEndpoints {
    pub endpoints: Vec<WireEndpoint>,
}

/// 模型名 → 端点列表，外层是若干组
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OpenAiModelsConfig {
    #[serde(default)]
    pub models: Vec<BTreeMap<String, ModelEndpoints>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireModelsConfig {
    pub models: Vec<BTreeMap<String, WireModelEndpoints>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AmplifyGroup {
    pub group_name: String,
    pub members: Vec<String>,
    pub include_from_other_groups: Vec<String>,
    pub created_by: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 助手管理组，按 `group_id` 标识
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AstGroup {
    pub group_id: String,
    #[serde(rename = "groupName")]
    pub group_name: String,
    #[serde(rename = "isPublic")]
    pub is_public: bool,
    #[serde(rename = "amplifyGroups")]
    pub amplify_groups: Vec<String>,
    #[serde(rename = "supportConvAnalysis")]
    pub support_conv_analysis: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 演示文稿模板，按 `name` 标识
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PptxTemplate {
    pub name: String,
    pub is_available: bool,
    pub amplify_groups: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpDef {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 列表型分区中的条目标识
pub trait ItemIdentity {
    fn identity(&self) -> &str;
}

impl ItemIdentity for AstGroup {
    fn identity(&self) -> &str {
        &self.group_id
    }
}

impl ItemIdentity for PptxTemplate {
    fn identity(&self) -> &str {
        &self.name
    }
}

/// 分区值：按 SectionId 封闭的 tagged union
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SectionValue {
    Admins(Vec<String>),
    RateLimit(RateLimit),
    PromptCostAlert(PromptCostAlert),
    AppVariables(BTreeMap<String, String>),
    AppSecrets(BTreeMap<String, String>),
    FeatureFlags(BTreeMap<String, FeatureFlag>),
    SupportedModels(BTreeMap<String, SupportedModel>),
    OpenAiEndpoints(OpenAiModelsConfig),
    AmplifyGroups(BTreeMap<String, AmplifyGroup>),
    Ops(Vec<OpDef>),
    AstAdminGroups(Vec<AstGroup>),
    PptxTemplates(Vec<PptxTemplate>),
}

impl SectionValue {
    pub fn id(&self) -> SectionId {
        match self {
            SectionValue::Admins(_) => SectionId::Admins,
            SectionValue::RateLimit(_) => SectionId::RateLimit,
            SectionValue::PromptCostAlert(_) => SectionId::PromptCostAlert,
            SectionValue::AppVariables(_) => SectionId::AppVariables,
            SectionValue::AppSecrets(_) => SectionId::AppSecrets,
            SectionValue::FeatureFlags(_) => SectionId::FeatureFlags,
            SectionValue::SupportedModels(_) => SectionId::SupportedModels,
            SectionValue::OpenAiEndpoints(_) => SectionId::OpenAiEndpoints,
            SectionValue::AmplifyGroups(_) => SectionId::AmplifyGroups,
            SectionValue::Ops(_) => SectionId::Ops,
            SectionValue::AstAdminGroups(_) => SectionId::AstAdminGroups,
            SectionValue::PptxTemplates(_) => SectionId::PptxTemplates,
        }
    }

    /// 后端缺省该分区时使用的空值
    pub fn empty(id: SectionId) -> Self {
        match id {
            SectionId::Admins => SectionValue::Admins(Vec::new()),
            SectionId::RateLimit => SectionValue::RateLimit(RateLimit::default()),
            SectionId::PromptCostAlert => SectionValue::PromptCostAlert(PromptCostAlert::default()),
            SectionId::AppVariables => SectionValue::AppVariables(BTreeMap::new()),
            SectionId::AppSecrets => SectionValue::AppSecrets(BTreeMap::new()),
            SectionId::FeatureFlags => SectionValue::FeatureFlags(BTreeMap::new()),
            SectionId::SupportedModels => SectionValue::SupportedModels(BTreeMap::new()),
            SectionId::OpenAiEndpoints => {
                SectionValue::OpenAiEndpoints(OpenAiModelsConfig::default())
            }
            SectionId::AmplifyGroups => SectionValue::AmplifyGroups(BTreeMap::new()),
            SectionId::Ops => SectionValue::Ops(Vec::new()),
            SectionId::AstAdminGroups => SectionValue::AstAdminGroups(Vec::new()),
            SectionId::PptxTemplates => SectionValue::PptxTemplates(Vec::new()),
        }
    }

    /// 按分区类型解析 JSON
    pub fn from_json(id: SectionId, value: Value) -> Result<Self> {
        let parsed = match id {
            SectionId::Admins => serde_json::from_value(value).map(SectionValue::Admins),
            SectionId::RateLimit => serde_json::from_value(value).map(SectionValue::RateLimit),
            SectionId::PromptCostAlert => {
                serde_json::from_value(value).map(SectionValue::PromptCostAlert)
            }
            SectionId::AppVariables => {
                serde_json::from_value(value).map(SectionValue::AppVariables)
            }
            SectionId::AppSecrets => serde_json::from_value(value).map(SectionValue::AppSecrets),
            SectionId::FeatureFlags => {
                serde_json::from_value(value).map(SectionValue::FeatureFlags)
            }
            SectionId::SupportedModels => {
                serde_json::from_value(value).map(SectionValue::SupportedModels)
            }
            SectionId::OpenAiEndpoints => {
                serde_json::from_value(value).map(SectionValue::OpenAiEndpoints)
            }
            SectionId::AmplifyGroups => {
                serde_json::from_value(value).map(SectionValue::AmplifyGroups)
            }
            SectionId::Ops => serde_json::from_value(value).map(SectionValue::Ops),
            SectionId::AstAdminGroups => {
                serde_json::from_value(value).map(SectionValue::AstAdminGroups)
            }
            SectionId::PptxTemplates => {
                serde_json::from_value(value).map(SectionValue::PptxTemplates)
            }
        };
        parsed.map_err(|e| SyncError::InvalidSectionValue {
            section: id,
            reason: e.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// 内存中的全部分区状态
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SectionState {
    sections: BTreeMap<SectionId, SectionValue>,
}

impl SectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: SectionValue) {
        self.sections.insert(value.id(), value);
    }

    pub fn get(&self, id: SectionId) -> Option<&SectionValue> {
        self.sections.get(&id)
    }

    pub fn get_mut(&mut self, id: SectionId) -> Option<&mut SectionValue> {
        self.sections.get_mut(&id)
    }

    pub fn contains(&self, id: SectionId) -> bool {
        self.sections.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<SectionId> {
        self.sections.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn to_json(&self) -> Result<BTreeMap<SectionId, Value>> {
        self.sections
            .iter()
            .map(|(id, value)| Ok((*id, value.to_json()?)))
            .collect()
    }
}

// ---- 外部协作方的报文 ----

/// `fetchConfigs` 的响应
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FetchResult {
    pub success: bool,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// `submitConfigUpdates` 的单个条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    #[serde(rename = "type")]
    pub section: SectionId,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SectionSaveStatus {
    #[serde(default)]
    pub success: bool,
}

/// 保存结果：整体结果 + 可选的分区明细（只在整体失败时有意义）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SaveResult {
    pub success: bool,
    #[serde(default)]
    pub data: Option<BTreeMap<String, SectionSaveStatus>>,
}
