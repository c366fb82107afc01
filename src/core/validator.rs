//! 新端点的保存前探测。
//!
//! 探测严格串行：前一个完成后才开始下一个，第一次失败即停止，
//! 由调用方决定继续保存还是放弃。不做重试。

use std::fmt;

use tokio::sync::watch;

use super::serializer::PendingProbe;
use crate::storage::{is_truthy, EndpointProber};

/// 代码解释器哨兵模型，固定探测 gpt-4o 部署
pub const CODE_INTERPRETER_MODEL: &str = "code-interpreter";
const CODE_INTERPRETER_DEPLOYMENT: &str = "gpt-4o";
const CODE_INTERPRETER_PATH: &str =
    "openai/deployments/gpt-4o/chat/completions?api-version=2024-08-01-preview";
const EMBEDDING_API_VERSION: &str = "2024-02-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Chat,
    Embedding,
}

/// 一次探测调用的目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub kind: ProbeKind,
    pub url: String,
    pub key: String,
    pub model: String,
}

impl ProbeTarget {
    /// 按模型名选择探测方式
    pub fn for_probe(probe: &PendingProbe) -> Self {
        if probe.model.contains("embed") {
            ProbeTarget {
                kind: ProbeKind::Embedding,
                url: format!(
                    "{}openai/deployments/{}/embeddings?api-version={}",
                    normalize_url(&probe.url),
                    probe.model,
                    EMBEDDING_API_VERSION
                ),
                key: probe.key.clone(),
                model: probe.model.clone(),
            }
        } else if probe.model == CODE_INTERPRETER_MODEL {
            ProbeTarget {
                kind: ProbeKind::Chat,
                url: format!("{}{}", normalize_url(&probe.url), CODE_INTERPRETER_PATH),
                key: probe.key.clone(),
                model: CODE_INTERPRETER_DEPLOYMENT.to_string(),
            }
        } else {
            ProbeTarget {
                kind: ProbeKind::Chat,
                url: probe.url.clone(),
                key: probe.key.clone(),
                model: probe.model.clone(),
            }
        }
    }
}

/// 补齐结尾的 `/`
pub fn normalize_url(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

/// 探测失败：指出失败的是队列中哪一项
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to make contact with the new endpoint (Url: {url}, Key: {key}, model {model})")]
pub struct ValidationFailure {
    pub index: usize,
    pub url: String,
    pub key: String,
    pub model: String,
}

/// Idle → Probing(i) → Failed(i) → Overridden | Aborted → Committing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    Idle,
    Probing(usize),
    Failed(usize),
    Overridden,
    Aborted,
    Committing,
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationState::Idle => f.write_str("idle"),
            ValidationState::Probing(i) => write!(f, "probing({})", i),
            ValidationState::Failed(i) => write!(f, "failed({})", i),
            ValidationState::Overridden => f.write_str("overridden"),
            ValidationState::Aborted => f.write_str("aborted"),
            ValidationState::Committing => f.write_str("committing"),
        }
    }
}

/// 验证状态机。记录状态轨迹，便于观察中间状态。
#[derive(Debug, Clone)]
pub struct EndpointValidator {
    state: ValidationState,
    trail: Vec<ValidationState>,
}

impl Default for EndpointValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointValidator {
    pub fn new() -> Self {
        Self {
            state: ValidationState::Idle,
            trail: vec![ValidationState::Idle],
        }
    }

    pub fn state(&self) -> ValidationState {
        self.state
    }

    pub fn trail(&self) -> &[ValidationState] {
        &self.trail
    }

    pub fn reset(&mut self) {
        self.state = ValidationState::Idle;
        self.trail = vec![ValidationState::Idle];
    }

    fn transition(&mut self, next: ValidationState) {
        tracing::debug!(from = %self.state, to = %next, "validator transition");
        self.state = next;
        self.trail.push(next);
    }

    /// 逐个探测队列。第一次失败即停止，后续条目不再探测。
    pub async fn validate(
        &mut self,
        prober: &dyn EndpointProber,
        queue: &[PendingProbe],
        progress: &watch::Sender<String>,
    ) -> Result<(), ValidationFailure> {
        for (index, probe) in queue.iter().enumerate() {
            self.transition(ValidationState::Probing(index));
            progress.send_replace(format!(
                "Testing Endpoint:\nUrl: {}\nKey: {}",
                probe.url, probe.key
            ));

            let target = ProbeTarget::for_probe(probe);
            tracing::info!(model = %probe.model, url = %target.url, kind = ?target.kind, "probing endpoint");
            let result = match target.kind {
                ProbeKind::Embedding => prober.probe_embedding(&target.url, &target.key).await,
                ProbeKind::Chat => {
                    prober
                        .probe_chat(&target.url, &target.key, &target.model)
                        .await
                }
            };

            if !is_truthy(&result) {
                tracing::warn!(model = %probe.model, url = %probe.url, "endpoint probe failed");
                self.transition(ValidationState::Failed(index));
                progress.send_replace(String::new());
                return Err(ValidationFailure {
                    index,
                    url: probe.url.clone(),
                    key: probe.key.clone(),
                    model: probe.model.clone(),
                });
            }
        }
        Ok(())
    }

    /// 失败后的人工决定：继续保存或放弃
    pub fn resolve(&mut self, proceed: bool) -> ValidationState {
        let next = if proceed {
            ValidationState::Overridden
        } else {
            ValidationState::Aborted
        };
        self.transition(next);
        next
    }

    pub fn begin_commit(&mut self) {
        self.transition(ValidationState::Committing);
    }

    /// 提交请求返回后回到空闲
    pub fn finish(&mut self) {
        self.transition(ValidationState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mock::MockProber;

    fn probe(model: &str, url: &str, key: &str) -> PendingProbe {
        PendingProbe {
            model: model.to_string(),
            url: url.to_string(),
            key: key.to_string(),
        }
    }

    #[test]
    fn test_embedding_target() {
        let target = ProbeTarget::for_probe(&probe("text-embed-3", "https://x.test", "k1"));
        assert_eq!(target.kind, ProbeKind::Embedding);
        assert_eq!(
            target.url,
            "https://x.test/openai/deployments/text-embed-3/embeddings?api-version=2024-02-01"
        );
        assert_eq!(target.key, "k1");
    }

    #[test]
    fn test_code_interpreter_always_gpt_4o() {
        let target = ProbeTarget::for_probe(&probe("code-interpreter", "https://ci.test/", "k"));
        assert_eq!(target.kind, ProbeKind::Chat);
        assert_eq!(target.model, "gpt-4o");
        assert_eq!(
            target.url,
            "https://ci.test/openai/deployments/gpt-4o/chat/completions?api-version=2024-08-01-preview"
        );
    }

    #[test]
    fn test_plain_chat_uses_entry_as_is() {
        let target = ProbeTarget::for_probe(&probe("gpt-35", "https://c.test", "k"));
        assert_eq!(target.kind, ProbeKind::Chat);
        assert_eq!(target.url, "https://c.test");
        assert_eq!(target.model, "gpt-35");
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("https://a"), "https://a/");
        assert_eq!(normalize_url("https://a/"), "https://a/");
    }

    #[tokio::test]
    async fn test_all_probes_pass() {
        let prober = MockProber::new();
        let (tx, _rx) = watch::channel(String::new());
        let mut validator = EndpointValidator::new();
        let queue = vec![probe("m1", "https://a", "ka"), probe("m2", "https://b", "kb")];

        validator.validate(&prober, &queue, &tx).await.unwrap();
        assert_eq!(prober.calls().len(), 2);
        assert_eq!(
            validator.trail(),
            [
                ValidationState::Idle,
                ValidationState::Probing(0),
                ValidationState::Probing(1)
            ]
        );
    }

    #[tokio::test]
    async fn test_first_failure_halts_queue() {
        let prober = MockProber::new().failing_key("ka");
        let (tx, rx) = watch::channel(String::new());
        let mut validator = EndpointValidator::new();
        let queue = vec![probe("m1", "https://a", "ka"), probe("m2", "https://b", "kb")];

        let failure = validator.validate(&prober, &queue, &tx).await.unwrap_err();
        assert_eq!(failure.index, 0);
        assert_eq!(failure.url, "https://a");
        assert_eq!(failure.key, "ka");
        assert_eq!(prober.calls().len(), 1);
        assert_eq!(validator.state(), ValidationState::Failed(0));
        assert!(rx.borrow().is_empty());

        assert_eq!(validator.resolve(false), ValidationState::Aborted);
    }

    #[tokio::test]
    async fn test_override_then_commit() {
        let prober = MockProber::new().failing_key("kb");
        let (tx, _rx) = watch::channel(String::new());
        let mut validator = EndpointValidator::new();
        let queue = vec![probe("m1", "https://a", "ka"), probe("m2", "https://b", "kb")];

        assert!(validator.validate(&prober, &queue, &tx).await.is_err());
        validator.resolve(true);
        validator.begin_commit();
        assert_eq!(
            validator.trail(),
            [
                ValidationState::Idle,
                ValidationState::Probing(0),
                ValidationState::Probing(1),
                ValidationState::Failed(1),
                ValidationState::Overridden,
                ValidationState::Committing
            ]
        );
    }
}
