pub mod committer;
pub mod dirty;
pub mod editor;
pub mod hooks;
pub mod loader;
pub mod registry;
pub mod serializer;
pub mod validator;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::models::{ConfigUpdate, SectionId, SectionState, SectionValue};
use crate::storage::{AdminBackend, EndpointProber};
use committer::CommitOutcome;
use dirty::{ChangedSubsetTracker, DirtyTracker};
use hooks::{HookRegistry, PostCommitHook};
use loader::LoadOptions;
use registry::AdminTab;
use serializer::PendingProbe;
use validator::{EndpointValidator, ValidationFailure, ValidationState};

pub const TESTING_MESSAGE: &str = "Testing New Endpoints...";
pub const SAVING_MESSAGE: &str = "Saving Configurations";

const TITLE: &str = "Admin Interface";
const UNSAVED_MARKER: &str = " * ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    NoChanges,
    Saved { sections: Vec<SectionId> },
}

/// 给展示层的保存结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_sections: Option<Vec<SectionId>>,
    pub message: String,
}

impl SaveReport {
    /// `dirty` 是保存之后仍然待保存的分区
    pub fn from_result(result: &Result<SaveOutcome>, dirty: &[SectionId]) -> Self {
        match result {
            Ok(SaveOutcome::NoChanges) => SaveReport {
                ok: true,
                failed_sections: None,
                message: "No Changes to Save".to_string(),
            },
            Ok(SaveOutcome::Saved { .. }) => SaveReport {
                ok: true,
                failed_sections: None,
                message: "Configurations successfully saved".to_string(),
            },
            Err(SyncError::PartialSave { failed }) => SaveReport {
                ok: false,
                failed_sections: Some(failed.clone()),
                message: result_message(result),
            },
            Err(SyncError::AmbiguousSave) => SaveReport {
                ok: false,
                failed_sections: Some(dirty.to_vec()),
                message: result_message(result),
            },
            // 提交之前就停止的保存没有失败分区
            Err(_) => SaveReport {
                ok: false,
                failed_sections: None,
                message: result_message(result),
            },
        }
    }
}

fn result_message(result: &Result<SaveOutcome>) -> String {
    match result {
        Ok(_) => String::new(),
        Err(e) => e.to_string(),
    }
}

/// 管理配置同步引擎。
///
/// 保存过程中要求独占、不可重入的访问，由调用方串行化（例如放在写锁里）。
pub struct AdminEngine {
    backend: Arc<dyn AdminBackend>,
    prober: Arc<dyn EndpointProber>,
    options: LoadOptions,
    state: SectionState,
    dirty: DirtyTracker,
    changed: ChangedSubsetTracker,
    validation_queue: Vec<PendingProbe>,
    validator: EndpointValidator,
    hooks: HookRegistry,
    progress: watch::Sender<String>,
    builtin_group_id: Option<String>,
}

impl AdminEngine {
    pub fn new(
        backend: Arc<dyn AdminBackend>,
        prober: Arc<dyn EndpointProber>,
        options: LoadOptions,
    ) -> Self {
        let (progress, _) = watch::channel(String::new());
        Self {
            backend,
            prober,
            options,
            state: SectionState::new(),
            dirty: DirtyTracker::new(),
            changed: ChangedSubsetTracker::new(),
            validation_queue: Vec::new(),
            validator: EndpointValidator::new(),
            hooks: HookRegistry::new(),
            progress,
            builtin_group_id: None,
        }
    }

    pub fn register_hook(&mut self, id: SectionId, hook: PostCommitHook) {
        self.hooks.register(id, hook);
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<String> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> String {
        self.progress.borrow().clone()
    }

    /// 两阶段加载并替换内存状态。失败时会话应当中止。
    pub async fn load(&mut self) -> Result<()> {
        let snapshot = loader::load(self.backend.clone(), &self.options, &self.progress).await?;
        self.state = snapshot.state;
        self.builtin_group_id = snapshot.builtin_group_id;
        self.discard_pending();
        Ok(())
    }

    /// 丢弃所有未保存的编辑并重新加载
    pub async fn reset(&mut self) -> Result<()> {
        tracing::info!(discarded = self.dirty.len(), "resetting admin session");
        self.discard_pending();
        self.load().await
    }

    fn discard_pending(&mut self) {
        self.dirty.clear();
        self.changed.clear();
        self.validation_queue.clear();
        self.validator.reset();
    }

    pub fn mark_dirty(&mut self, id: SectionId) -> Result<()> {
        if !self.state.contains(id) {
            return Err(SyncError::SectionNotLoaded(id));
        }
        self.dirty.mark_dirty(id);
        Ok(())
    }

    pub fn get_dirty(&self) -> Vec<SectionId> {
        self.dirty.ids()
    }

    pub fn is_dirty(&self, id: SectionId) -> bool {
        self.dirty.is_dirty(id)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty.any()
    }

    pub fn tab_has_changes(&self, tab: AdminTab) -> bool {
        tab.sections().iter().any(|id| self.dirty.is_dirty(*id))
    }

    pub fn tab_title(&self, tab: AdminTab) -> String {
        let marker = if self.tab_has_changes(tab) {
            UNSAVED_MARKER
        } else {
            ""
        };
        format!("{}{}", tab.label(), marker)
    }

    pub fn title(&self) -> String {
        let marker = if self.dirty.any() { UNSAVED_MARKER } else { "" };
        format!("{}{}", TITLE, marker)
    }

    pub fn state(&self) -> &SectionState {
        &self.state
    }

    pub fn section(&self, id: SectionId) -> Option<&SectionValue> {
        self.state.get(id)
    }

    pub fn builtin_group_id(&self) -> Option<&str> {
        self.builtin_group_id.as_deref()
    }

    pub fn changed_items(&self, id: SectionId) -> &[String] {
        self.changed.changed(id)
    }

    pub fn validation_state(&self) -> ValidationState {
        self.validator.state()
    }

    pub fn validation_trail(&self) -> &[ValidationState] {
        self.validator.trail()
    }

    pub fn validation_queue(&self) -> &[PendingProbe] {
        &self.validation_queue
    }

    /// 保存全部脏分区。
    ///
    /// 新端点探测失败时调用 `confirm_override`，返回 true 表示用户选择继续保存。
    /// 保存失败不清理脏集合，重试会重新发送完整的脏集合。
    pub async fn save<F>(&mut self, confirm_override: F) -> Result<SaveOutcome>
    where
        F: FnOnce(&ValidationFailure) -> bool + Send,
    {
        let dirty = self.dirty.ids();
        if dirty.is_empty() {
            tracing::info!("no changes to save");
            return Ok(SaveOutcome::NoChanges);
        }
        let save_id = Uuid::new_v4();
        tracing::info!(%save_id, sections = ?dirty, "saving admin configurations");

        let mut entries = Vec::with_capacity(dirty.len());
        let mut probes = Vec::new();
        for id in &dirty {
            let serialized = serializer::serialize(*id, &self.state, &self.changed)
                .map_err(|e| {
                    tracing::error!(%save_id, section = %id, "save halted: {}", e);
                    e
                })?;
            entries.push(ConfigUpdate {
                section: *id,
                data: serialized.payload,
            });
            probes.extend(serialized.probes);
        }
        self.validation_queue = probes;
        self.validator.reset();

        if !self.validation_queue.is_empty() {
            self.progress.send_replace(TESTING_MESSAGE.to_string());
            let prober = self.prober.clone();
            let validated = self
                .validator
                .validate(prober.as_ref(), &self.validation_queue, &self.progress)
                .await;
            if let Err(failure) = validated {
                let proceed = confirm_override(&failure);
                self.validator.resolve(proceed);
                if !proceed {
                    tracing::warn!(%save_id, url = %failure.url, "save aborted after failed probe");
                    return Err(SyncError::ValidationAborted(failure));
                }
                tracing::warn!(%save_id, url = %failure.url, "continuing save despite failed probe");
            }
        }

        self.validator.begin_commit();
        self.progress.send_replace(SAVING_MESSAGE.to_string());
        let result = committer::commit(self.backend.as_ref(), entries).await;
        self.progress.send_replace(String::new());
        self.validator.finish();

        match committer::reconcile(&result, &dirty) {
            CommitOutcome::Saved => {
                self.hooks.run(&dirty, &self.state);
                self.dirty.clear();
                self.changed.clear();
                self.validation_queue.clear();
                tracing::info!(%save_id, "configurations successfully saved");
                Ok(SaveOutcome::Saved { sections: dirty })
            }
            CommitOutcome::Partial(failed) => {
                tracing::warn!(%save_id, failed = ?failed, "some configurations were not saved");
                Err(SyncError::PartialSave { failed })
            }
            CommitOutcome::Ambiguous => {
                tracing::warn!(%save_id, "save failed without usable detail");
                Err(SyncError::AmbiguousSave)
            }
        }
    }
}
