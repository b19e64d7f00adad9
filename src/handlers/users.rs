//! Own profile for signed-in customers, and the admin user directory.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::emails::DeliveryResponse;
use super::merge_text;
use crate::auth::{AdminUser, CurrentUser, Role};
use crate::db::users::{self, ProfileWithStats, UserFilter};
use crate::email::{render_welcome, OutgoingEmail};
use crate::error::{ApiError, ApiResult};
use crate::models::{page_window, PaginatedResponse, Profile};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileRequest {
    #[validate(length(max = 120))]
    pub full_name: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    pub role: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

/// An admin may not take their own admin role away.
pub fn check_role_change(actor: Uuid, target: Uuid, role: Role) -> ApiResult<()> {
    if actor == target && role != Role::Admin {
        return Err(ApiError::Conflict("you cannot remove your own admin role".into()));
    }
    Ok(())
}

pub async fn get_profile(State(s): State<AppState>, user: CurrentUser) -> ApiResult<Json<Profile>> {
    Ok(Json(users::find(&s.db, user.id).await?.ok_or(ApiError::NotFound("profile"))?))
}

#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_profile(State(s): State<AppState>, user: CurrentUser, Json(r): Json<ProfileRequest>) -> ApiResult<Json<Profile>> {
    r.validate()?;
    let current = users::find(&s.db, user.id).await?.ok_or(ApiError::NotFound("profile"))?;
    let full_name = merge_text(current.full_name, r.full_name);
    let phone = merge_text(current.phone, r.phone);
    let profile = users::update_profile(&s.db, user.id, full_name.as_deref(), phone.as_deref()).await?.ok_or(ApiError::NotFound("profile"))?;
    tracing::info!("profile updated");
    Ok(Json(profile))
}

/// Sent at most once per account.
pub async fn send_welcome(State(s): State<AppState>, user: CurrentUser) -> ApiResult<Json<DeliveryResponse>> {
    let profile = users::find(&s.db, user.id).await?.ok_or(ApiError::NotFound("profile"))?;
    let rendered = render_welcome(profile.full_name.as_deref(), &s.config.site_url)?;
    let delivery = s.mailer.send_once(OutgoingEmail { rendered, to: profile.email, order_id: None, user_id: Some(profile.id) }).await;
    Ok(Json(delivery.into()))
}

pub async fn list_users(State(s): State<AppState>, AdminUser(_): AdminUser, Query(q): Query<UserQuery>) -> ApiResult<Json<PaginatedResponse<Profile>>> {
    let role = q.role.as_deref().filter(|r| !r.is_empty()).map(str::parse::<Role>).transpose()?;
    let (page, per_page, offset) = page_window(q.page, q.per_page);
    let filter = UserFilter { search: q.search, role: role.map(|r| r.as_str().to_string()) };
    let (data, total) = users::list(&s.db, &filter, per_page, offset).await?;
    Ok(Json(PaginatedResponse { data, total, page, per_page }))
}

pub async fn get_user(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> ApiResult<Json<ProfileWithStats>> {
    let profile = users::find(&s.db, id).await?.ok_or(ApiError::NotFound("user"))?;
    Ok(Json(users::with_stats(&s.db, profile).await?))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id, user_id = %id))]
pub async fn set_user_role(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<RoleRequest>) -> ApiResult<Json<Profile>> {
    let role: Role = r.role.parse()?;
    check_role_change(admin.id, id, role)?;
    let profile = users::set_role(&s.db, id, role.as_str()).await?.ok_or(ApiError::NotFound("user"))?;
    tracing::info!(role = role.as_str(), "user role changed");
    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_cannot_demote_self() {
        let me = Uuid::now_v7();
        assert!(matches!(check_role_change(me, me, Role::Customer), Err(ApiError::Conflict(_))));
        assert!(check_role_change(me, me, Role::Admin).is_ok());
        assert!(check_role_change(me, Uuid::now_v7(), Role::Customer).is_ok());
    }

    #[test]
    fn test_profile_request_limits() {
        let r = ProfileRequest { full_name: Some("x".repeat(121)), phone: None };
        assert!(r.validate().is_err());
        let r = ProfileRequest { full_name: Some("Léa Martin".into()), phone: Some("+33 6 12 34 56 78".into()) };
        assert!(r.validate().is_ok());
    }
}
