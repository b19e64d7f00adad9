use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db::{self, Lookup};
use crate::error::{ApiError, ApiResult};
use crate::models::WishlistEntry;
use crate::state::AppState;

pub async fn list_wishlist(State(s): State<AppState>, user: CurrentUser) -> ApiResult<Json<Vec<WishlistEntry>>> {
    Ok(Json(db::wishlist::list(&s.db, user.id).await?))
}

pub async fn add_to_wishlist(State(s): State<AppState>, user: CurrentUser, Path(product_id): Path<Uuid>) -> ApiResult<StatusCode> {
    db::catalog::find_product(&s.db, &Lookup::Id(product_id), false).await?.ok_or(ApiError::NotFound("product"))?;
    if db::wishlist::add(&s.db, user.id, product_id).await? {
        tracing::debug!(user_id = %user.id, %product_id, "added to wishlist");
        Ok(StatusCode::CREATED)
    } else {
        Ok(StatusCode::OK)
    }
}

pub async fn remove_from_wishlist(State(s): State<AppState>, user: CurrentUser, Path(product_id): Path<Uuid>) -> ApiResult<StatusCode> {
    if !db::wishlist::remove(&s.db, user.id, product_id).await? { return Err(ApiError::NotFound("wishlist item")); }
    Ok(StatusCode::NO_CONTENT)
}
