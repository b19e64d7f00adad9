use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::db::notifications;
use crate::error::{ApiError, ApiResult};
use crate::models::{page_window, Notification, PaginatedResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn list_notifications(State(s): State<AppState>, AdminUser(_): AdminUser, Query(q): Query<NotificationQuery>) -> ApiResult<Json<PaginatedResponse<Notification>>> {
    let (page, per_page, offset) = page_window(q.page, q.per_page);
    let (data, total) = notifications::list(&s.db, q.unread_only, per_page, offset).await?;
    Ok(Json(PaginatedResponse { data, total, page, per_page }))
}

pub async fn unread_count(State(s): State<AppState>, AdminUser(_): AdminUser) -> ApiResult<Json<serde_json::Value>> {
    let count = notifications::unread_count(&s.db).await?;
    Ok(Json(serde_json::json!({ "unread": count })))
}

pub async fn mark_read(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> ApiResult<Json<Notification>> {
    Ok(Json(notifications::mark_read(&s.db, id).await?.ok_or(ApiError::NotFound("notification"))?))
}

pub async fn mark_all_read(State(s): State<AppState>, AdminUser(admin): AdminUser) -> ApiResult<Json<serde_json::Value>> {
    let updated = notifications::mark_all_read(&s.db).await?;
    tracing::info!(admin_id = %admin.id, updated, "notifications marked read");
    Ok(Json(serde_json::json!({ "updated": updated })))
}

pub async fn delete_notification(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    if !notifications::delete(&s.db, id).await? { return Err(ApiError::NotFound("notification")); }
    Ok(StatusCode::NO_CONTENT)
}
