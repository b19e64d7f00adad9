use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::db::media::{self, NewMedia};
use crate::error::{ApiError, ApiResult};
use crate::models::{page_window, Media, PaginatedResponse};
use crate::state::AppState;
use crate::storage::{accepted_mime, object_path, MAX_UPLOAD_BYTES};

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub mime: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UploadQuery {
    #[validate(length(min = 1, max = 200))]
    pub file_name: String,
    #[validate(length(max = 300))]
    pub alt_text: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AltTextRequest {
    #[validate(length(max = 300))]
    pub alt_text: Option<String>,
}

/// Content type and size checks, in that order.
pub fn check_upload(content_type: Option<&str>, size: usize) -> ApiResult<&'static str> {
    let raw = content_type.unwrap_or_default();
    let mime = accepted_mime(raw).ok_or_else(|| ApiError::UnsupportedMediaType(if raw.is_empty() { "(none)".into() } else { raw.to_string() }))?;
    if size == 0 {
        return Err(ApiError::Validation("empty file".into()));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(ApiError::PayloadTooLarge { max_bytes: MAX_UPLOAD_BYTES });
    }
    Ok(mime)
}

pub async fn list_media(State(s): State<AppState>, AdminUser(_): AdminUser, Query(q): Query<MediaQuery>) -> ApiResult<Json<PaginatedResponse<Media>>> {
    let (page, per_page, offset) = page_window(q.page, q.per_page);
    let mime = q.mime.as_deref().map(str::trim).filter(|m| !m.is_empty());
    let (data, total) = media::list(&s.db, mime, per_page, offset).await?;
    Ok(Json(PaginatedResponse { data, total, page, per_page }))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn upload_media(State(s): State<AppState>, AdminUser(admin): AdminUser, Query(q): Query<UploadQuery>, headers: HeaderMap, body: Bytes) -> ApiResult<(StatusCode, Json<Media>)> {
    q.validate()?;
    let mime = check_upload(headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()), body.len())?;

    let id = Uuid::now_v7();
    let size = body.len() as i64;
    let stored = s.storage.upload(&object_path(id, &q.file_name), mime, body).await?;
    let alt_text = q.alt_text.as_deref().map(str::trim).filter(|a| !a.is_empty());
    let new_media = NewMedia { id, file_name: &q.file_name, storage_path: &stored.path, url: &stored.public_url, mime_type: mime, size_bytes: size, alt_text };
    let item = match media::insert(&s.db, &new_media).await {
        Ok(item) => item,
        Err(e) => {
            if let Err(cleanup) = s.storage.delete(&stored.path).await {
                tracing::warn!(path = %stored.path, error = %cleanup, "could not remove orphaned upload");
            }
            return Err(e.into());
        }
    };
    tracing::info!(media_id = %item.id, mime_type = mime, size_bytes = size, "media uploaded");
    Ok((StatusCode::CREATED, Json(item)))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id, media_id = %id))]
pub async fn update_media(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<AltTextRequest>) -> ApiResult<Json<Media>> {
    r.validate()?;
    let alt_text = r.alt_text.as_deref().map(str::trim).filter(|a| !a.is_empty());
    let item = media::update_alt_text(&s.db, id, alt_text).await?.ok_or(ApiError::NotFound("media"))?;
    tracing::info!("media alt text updated");
    Ok(Json(item))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id, media_id = %id))]
pub async fn delete_media(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    let item = media::find(&s.db, id).await?.ok_or(ApiError::NotFound("media"))?;
    s.storage.delete(&item.storage_path).await?;
    media::delete(&s.db, id).await?;
    tracing::info!(path = %item.storage_path, "media deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_checks() {
        assert_eq!(check_upload(Some("image/WEBP"), 10).unwrap(), "image/webp");
        assert!(matches!(check_upload(Some("application/pdf"), 10), Err(ApiError::UnsupportedMediaType(_))));
        assert!(matches!(check_upload(None, 10), Err(ApiError::UnsupportedMediaType(t)) if t == "(none)"));
        assert!(matches!(check_upload(Some("image/png"), 0), Err(ApiError::Validation(_))));
        assert!(matches!(check_upload(Some("image/png"), MAX_UPLOAD_BYTES), Ok("image/png")));
        assert!(matches!(check_upload(Some("image/png"), MAX_UPLOAD_BYTES + 1), Err(ApiError::PayloadTooLarge { .. })));
    }
}
