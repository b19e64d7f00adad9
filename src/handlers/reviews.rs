use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, CurrentUser};
use crate::db::notifications::{self, NotificationKind};
use crate::db::{self, Lookup};
use crate::error::{ApiError, ApiResult};
use crate::models::{page_window, PaginatedResponse, Review};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(max = 120))]
    pub title: Option<String>,
    #[validate(length(max = 4000))]
    pub body: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductReviews {
    pub reviews: Vec<Review>,
    pub average: Option<f64>,
    pub count: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    pub approved: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// One review per customer and product; a missing profile is not a duplicate.
fn insert_error(e: sqlx::Error) -> ApiError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::Conflict("you already reviewed this product".into()),
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => ApiError::NotFound("profile"),
        _ => e.into(),
    }
}

async fn product_id(s: &AppState, key: &str) -> ApiResult<Uuid> {
    let product = db::catalog::find_product(&s.db, &Lookup::parse(key), false).await?.ok_or(ApiError::NotFound("product"))?;
    Ok(product.id)
}

pub async fn list_product_reviews(State(s): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<ProductReviews>> {
    let id = product_id(&s, &key).await?;
    let reviews = db::reviews::list_approved(&s.db, id).await?;
    let summary = db::reviews::summary(&s.db, id).await?;
    Ok(Json(ProductReviews { reviews, average: summary.average, count: summary.count }))
}

/// New reviews wait for moderation.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_review(State(s): State<AppState>, user: CurrentUser, Path(key): Path<String>, Json(r): Json<ReviewRequest>) -> ApiResult<(StatusCode, Json<Review>)> {
    r.validate()?;
    let id = product_id(&s, &key).await?;
    let title = r.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let body = r.body.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let review = db::reviews::insert(&s.db, id, user.id, r.rating, title, body).await.map_err(insert_error)?;
    tracing::info!(review_id = %review.id, product_id = %id, rating = review.rating, "review submitted");
    let message = format!("Nouvel avis {}/5 en attente de modération.", review.rating);
    if let Err(e) = notifications::create(&s.db, NotificationKind::Review, "Nouvel avis", &message, Some("/admin/avis")).await {
        tracing::warn!(error = %e, "could not file review notification");
    }
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn admin_list_reviews(State(s): State<AppState>, AdminUser(_): AdminUser, Query(q): Query<ReviewQuery>) -> ApiResult<Json<PaginatedResponse<Review>>> {
    let (page, per_page, offset) = page_window(q.page, q.per_page);
    let (data, total) = db::reviews::list_all(&s.db, q.approved, per_page, offset).await?;
    Ok(Json(PaginatedResponse { data, total, page, per_page }))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn approve_review(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> ApiResult<Json<Review>> {
    let review = db::reviews::approve(&s.db, id).await?.ok_or(ApiError::NotFound("review"))?;
    tracing::info!(review_id = %id, "review approved");
    Ok(Json(review))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn delete_review(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    if !db::reviews::delete(&s.db, id).await? { return Err(ApiError::NotFound("review")); }
    tracing::info!(review_id = %id, "review deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    use sqlx::error::{DatabaseError, ErrorKind};

    #[derive(Debug)]
    struct Violation(ErrorKind);

    impl fmt::Display for Violation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:?}", self.0) }
    }

    impl StdError for Violation {}

    impl DatabaseError for Violation {
        fn message(&self) -> &str { "constraint violated" }
        fn code(&self) -> Option<Cow<'_, str>> { None }
        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) { self }
        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) { self }
        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> { self }
        fn kind(&self) -> ErrorKind {
            match self.0 {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                ErrorKind::ForeignKeyViolation => ErrorKind::ForeignKeyViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    #[test]
    fn test_insert_error_messages() {
        let duplicate = insert_error(sqlx::Error::Database(Box::new(Violation(ErrorKind::UniqueViolation))));
        assert!(matches!(duplicate, ApiError::Conflict(m) if m == "you already reviewed this product"));
        let no_profile = insert_error(sqlx::Error::Database(Box::new(Violation(ErrorKind::ForeignKeyViolation))));
        assert!(matches!(no_profile, ApiError::NotFound("profile")));
        assert!(matches!(insert_error(sqlx::Error::RowNotFound), ApiError::NotFound(_)));
    }

    #[test]
    fn test_rating_bounds() {
        let ok: ReviewRequest = serde_json::from_str(r#"{"rating":5,"title":"Sublime"}"#).unwrap();
        assert!(ok.validate().is_ok());
        let too_high: ReviewRequest = serde_json::from_str(r#"{"rating":6}"#).unwrap();
        assert!(too_high.validate().is_err());
        let zero: ReviewRequest = serde_json::from_str(r#"{"rating":0}"#).unwrap();
        assert!(zero.validate().is_err());
    }
}
