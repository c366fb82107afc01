use crate::models::{ConfigUpdate, SaveResult, SectionId};
use crate::storage::AdminBackend;

/// 提交结果的解读
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Saved,
    /// 明细可信，列出失败的分区
    Partial(Vec<SectionId>),
    /// 没有可信明细，按全部未保存处理
    Ambiguous,
}

/// 一次请求提交全部脏分区。传输错误按没有明细的失败处理。
pub async fn commit(backend: &dyn AdminBackend, entries: Vec<ConfigUpdate>) -> SaveResult {
    let count = entries.len();
    match backend.submit_config_updates(entries).await {
        Ok(result) => {
            tracing::info!(sections = count, success = result.success, "commit finished");
            result
        }
        Err(e) => {
            tracing::error!(sections = count, "commit request failed: {}", e);
            SaveResult {
                success: false,
                data: None,
            }
        }
    }
}

/// 根据整体结果和分区明细得出失败集合。
///
/// 明细条目数与脏集合大小相同时，即便个别条目缺失或失败，也按模糊失败处理。
pub fn reconcile(result: &SaveResult, dirty: &[SectionId]) -> CommitOutcome {
    if result.success {
        return CommitOutcome::Saved;
    }
    let Some(detail) = &result.data else {
        return CommitOutcome::Ambiguous;
    };
    if detail.len() == dirty.len() {
        return CommitOutcome::Ambiguous;
    }

    let failed: Vec<SectionId> = dirty
        .iter()
        .copied()
        .filter(|id| {
            detail
                .get(id.as_str())
                .map(|status| !status.success)
                .unwrap_or(true)
        })
        .collect();

    if failed.is_empty() {
        // 整体失败却找不到失败分区，明细不可信
        CommitOutcome::Ambiguous
    } else {
        CommitOutcome::Partial(failed)
    }
}
