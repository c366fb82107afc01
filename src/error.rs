use crate::core::validator::ValidationFailure;
use crate::models::SectionId;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// 任一加载阶段失败，会话必须中止
    #[error("unable to fetch admin configurations: {0}")]
    Load(String),

    #[error("endpoint validation failed: {0}")]
    ValidationAborted(ValidationFailure),

    #[error("the following configurations were unable to be saved: {}", join_sections(.failed))]
    PartialSave { failed: Vec<SectionId> },

    #[error("unable to save the configurations at this time, please try again later")]
    AmbiguousSave,

    /// 脏分区没有序列化规则，属于程序缺陷
    #[error("no serialization rule for section: {0}")]
    SerializationFault(SectionId),

    #[error("section not loaded: {0}")]
    SectionNotLoaded(SectionId),

    #[error("unknown section: {0}")]
    UnknownSection(String),

    #[error("item not found in {section}: {item}")]
    ItemNotFound { section: SectionId, item: String },

    #[error("invalid value for section {section}: {reason}")]
    InvalidSectionValue { section: SectionId, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Transport(e.to_string())
    }
}

fn join_sections(sections: &[SectionId]) -> String {
    sections
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, SyncError>;
