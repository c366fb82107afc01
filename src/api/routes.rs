use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    get_dirty, get_section, list_sections, progress, published, put_section, reset, save,
    AppState,
};

/// 创建 API 路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/sections", get(list_sections))
        .route("/api/v1/sections/{id}", get(get_section).put(put_section))
        .route("/api/v1/dirty", get(get_dirty))
        .route("/api/v1/save", post(save))
        .route("/api/v1/reset", post(reset))
        .route("/api/v1/progress", get(progress))
        .route("/api/v1/published", get(published))
        .with_state(state)
}
