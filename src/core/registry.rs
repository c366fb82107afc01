//! 分区目录：哪些分区快速加载、各分区如何序列化、属于哪个标签页。

use crate::models::SectionId;

/// 快速加载阶段覆盖的分区，足以让界面立即可交互
pub const FAST_SECTIONS: [SectionId; 6] = [
    SectionId::Admins,
    SectionId::FeatureFlags,
    SectionId::AmplifyGroups,
    SectionId::PptxTemplates,
    SectionId::RateLimit,
    SectionId::PromptCostAlert,
];

/// 分区的序列化规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializeRule {
    /// 原样发送
    PassThrough,
    /// 只发送 ChangedSubsetTracker 记录过的条目
    ChangedItems,
    /// 端点映射：过滤空端点，剥离 isNew，新端点进入探测队列
    Endpoints,
}

pub fn is_fast(id: SectionId) -> bool {
    FAST_SECTIONS.contains(&id)
}

/// 没有规则的分区不可保存。ops 只读。
pub fn rule_for(id: SectionId) -> Option<SerializeRule> {
    match id {
        SectionId::Admins
        | SectionId::RateLimit
        | SectionId::PromptCostAlert
        | SectionId::AppVariables
        | SectionId::AppSecrets
        | SectionId::FeatureFlags
        | SectionId::SupportedModels
        | SectionId::AmplifyGroups => Some(SerializeRule::PassThrough),
        SectionId::AstAdminGroups | SectionId::PptxTemplates => Some(SerializeRule::ChangedItems),
        SectionId::OpenAiEndpoints => Some(SerializeRule::Endpoints),
        SectionId::Ops => None,
    }
}

pub fn is_list_shaped(id: SectionId) -> bool {
    rule_for(id) == Some(SerializeRule::ChangedItems)
}

/// 管理界面的标签页
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminTab {
    Configurations,
    SupportedModels,
    ApplicationVariables,
    OpenAiEndpoints,
    FeatureFlags,
    FeatureData,
    Ops,
}

impl AdminTab {
    pub const ALL: [AdminTab; 7] = [
        AdminTab::Configurations,
        AdminTab::SupportedModels,
        AdminTab::ApplicationVariables,
        AdminTab::OpenAiEndpoints,
        AdminTab::FeatureFlags,
        AdminTab::FeatureData,
        AdminTab::Ops,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AdminTab::Configurations => "Configurations",
            AdminTab::SupportedModels => "Supported Models",
            AdminTab::ApplicationVariables => "Application Variables",
            AdminTab::OpenAiEndpoints => "OpenAi Endpoints",
            AdminTab::FeatureFlags => "Feature Flags",
            AdminTab::FeatureData => "Feature Data",
            AdminTab::Ops => "Ops",
        }
    }

    pub fn sections(self) -> &'static [SectionId] {
        match self {
            AdminTab::Configurations => &[
                SectionId::Admins,
                SectionId::RateLimit,
                SectionId::PromptCostAlert,
                SectionId::AmplifyGroups,
            ],
            AdminTab::SupportedModels => &[SectionId::SupportedModels],
            AdminTab::ApplicationVariables => &[SectionId::AppVariables, SectionId::AppSecrets],
            AdminTab::OpenAiEndpoints => &[SectionId::OpenAiEndpoints],
            AdminTab::FeatureFlags => &[SectionId::FeatureFlags],
            AdminTab::FeatureData => &[SectionId::AstAdminGroups, SectionId::PptxTemplates],
            AdminTab::Ops => &[SectionId::Ops],
        }
    }
}
