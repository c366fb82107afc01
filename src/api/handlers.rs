use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};

use crate::core::hooks::{PublishedState, SharedPublished};
use crate::core::registry::AdminTab;
use crate::core::{AdminEngine, SaveReport};
use crate::error::{Result, SyncError};
use crate::models::{SectionId, SectionValue};

/// 共享状态。保存期间持有写锁，保证保存流程独占。
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RwLock<AdminEngine>>,
    pub published: SharedPublished,
    pub progress: watch::Receiver<String>,
}

// ---- 响应结构体 ----

#[derive(Serialize)]
pub struct SectionsResponse {
    pub title: String,
    pub sections: BTreeMap<SectionId, serde_json::Value>,
    pub dirty: Vec<SectionId>,
}

#[derive(Serialize)]
pub struct SectionResponse {
    pub section: SectionId,
    pub value: serde_json::Value,
    pub dirty: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabStatus {
    pub label: &'static str,
    pub title: String,
    pub has_changes: bool,
}

#[derive(Serialize)]
pub struct DirtyResponse {
    pub title: String,
    pub dirty: Vec<SectionId>,
    pub tabs: Vec<TabStatus>,
}

#[derive(Serialize)]
pub struct ProgressResponse {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SaveRequest {
    /// 端点探测失败时仍然继续保存
    pub force: bool,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---- SyncError -> HTTP Response ----

fn status_for(error: &SyncError) -> StatusCode {
    match error {
        SyncError::Load(_) => StatusCode::SERVICE_UNAVAILABLE,
        SyncError::ValidationAborted(_) => StatusCode::CONFLICT,
        SyncError::PartialSave { .. } | SyncError::AmbiguousSave => StatusCode::BAD_GATEWAY,
        SyncError::Transport(_) => StatusCode::BAD_GATEWAY,
        SyncError::SectionNotLoaded(_)
        | SyncError::UnknownSection(_)
        | SyncError::ItemNotFound { .. } => StatusCode::NOT_FOUND,
        SyncError::InvalidSectionValue { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn dirty_response(engine: &AdminEngine) -> DirtyResponse {
    DirtyResponse {
        title: engine.title(),
        dirty: engine.get_dirty(),
        tabs: AdminTab::ALL
            .iter()
            .map(|tab| TabStatus {
                label: tab.label(),
                title: engine.tab_title(*tab),
                has_changes: engine.tab_has_changes(*tab),
            })
            .collect(),
    }
}

// ---- 处理器 ----

/// GET /api/v1/sections
pub async fn list_sections(State(state): State<AppState>) -> Result<Json<SectionsResponse>> {
    let engine = state.engine.read().await;
    Ok(Json(SectionsResponse {
        title: engine.title(),
        sections: engine.state().to_json()?,
        dirty: engine.get_dirty(),
    }))
}

/// GET /api/v1/sections/{id}
pub async fn get_section(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SectionResponse>> {
    let section: SectionId = id.parse()?;
    let engine = state.engine.read().await;
    let value = engine
        .section(section)
        .ok_or(SyncError::SectionNotLoaded(section))?;
    Ok(Json(SectionResponse {
        section,
        value: value.to_json()?,
        dirty: engine.is_dirty(section),
    }))
}

/// PUT /api/v1/sections/{id}：整体替换分区并标记为脏
pub async fn put_section(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<DirtyResponse>> {
    let section: SectionId = id.parse()?;
    let value = SectionValue::from_json(section, body)?;
    let mut engine = state.engine.write().await;
    engine.replace_section(value)?;
    Ok(Json(dirty_response(&engine)))
}

/// GET /api/v1/dirty
pub async fn get_dirty(State(state): State<AppState>) -> Json<DirtyResponse> {
    let engine = state.engine.read().await;
    Json(dirty_response(&engine))
}

/// POST /api/v1/save
/// 请求体可省略，省略时 `force = false`
pub async fn save(State(state): State<AppState>, req: Option<Json<SaveRequest>>) -> Response {
    let force = req.map(|Json(req)| req.force).unwrap_or_default();
    let mut engine = state.engine.write().await;
    let result = engine.save(move |_| force).await;
    let report = SaveReport::from_result(&result, &engine.get_dirty());
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => status_for(e),
    };
    (status, Json(report)).into_response()
}

/// POST /api/v1/reset：丢弃编辑并重新加载
pub async fn reset(State(state): State<AppState>) -> Result<Json<DirtyResponse>> {
    let mut engine = state.engine.write().await;
    engine.reset().await?;
    Ok(Json(dirty_response(&engine)))
}

/// GET /api/v1/progress，保存期间也可读取
pub async fn progress(State(state): State<AppState>) -> Json<ProgressResponse> {
    Json(ProgressResponse {
        message: state.progress.borrow().clone(),
    })
}

/// GET /api/v1/published
pub async fn published(State(state): State<AppState>) -> Json<PublishedState> {
    let published = state
        .published
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    Json(published)
}
