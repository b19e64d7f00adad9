use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::db::addresses::{self, AddressInput};
use crate::error::{ApiError, ApiResult};
use crate::models::Address;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct AddressRequest {
    #[validate(length(max = 60))]
    pub label: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    #[validate(length(max = 200))]
    pub line2: Option<String>,
    #[validate(length(min = 2, max = 12))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 120))]
    pub city: String,
    #[validate(length(equal = 2))]
    pub country: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

fn optional(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl AddressRequest {
    fn into_input(self) -> ApiResult<AddressInput> {
        self.validate()?;
        let country = self.country.trim().to_ascii_uppercase();
        if !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ApiError::Validation("country must be an ISO 3166 alpha-2 code".into()));
        }
        Ok(AddressInput {
            label: optional(self.label),
            full_name: self.full_name.trim().to_string(),
            line1: self.line1.trim().to_string(),
            line2: optional(self.line2),
            postal_code: self.postal_code.trim().to_string(),
            city: self.city.trim().to_string(),
            country,
            phone: optional(self.phone),
        })
    }
}

pub async fn list_addresses(State(s): State<AppState>, user: CurrentUser) -> ApiResult<Json<Vec<Address>>> {
    Ok(Json(addresses::list(&s.db, user.id).await?))
}

#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_address(State(s): State<AppState>, user: CurrentUser, Json(r): Json<AddressRequest>) -> ApiResult<(StatusCode, Json<Address>)> {
    let make_default = r.is_default;
    let address = addresses::create(&s.db, user.id, &r.into_input()?, make_default).await?;
    tracing::info!(address_id = %address.id, is_default = address.is_default, "address created");
    Ok((StatusCode::CREATED, Json(address)))
}

#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_address(State(s): State<AppState>, user: CurrentUser, Path(id): Path<Uuid>, Json(r): Json<AddressRequest>) -> ApiResult<Json<Address>> {
    let make_default = r.is_default;
    let mut address = addresses::update(&s.db, user.id, id, &r.into_input()?).await?.ok_or(ApiError::NotFound("address"))?;
    if make_default && !address.is_default {
        address = addresses::set_default(&s.db, user.id, id).await?.ok_or(ApiError::NotFound("address"))?;
    }
    tracing::info!(address_id = %id, "address updated");
    Ok(Json(address))
}

#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn set_default_address(State(s): State<AppState>, user: CurrentUser, Path(id): Path<Uuid>) -> ApiResult<Json<Address>> {
    let address = addresses::set_default(&s.db, user.id, id).await?.ok_or(ApiError::NotFound("address"))?;
    tracing::info!(address_id = %id, "default address changed");
    Ok(Json(address))
}

#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn delete_address(State(s): State<AppState>, user: CurrentUser, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    if !addresses::delete(&s.db, user.id, id).await? { return Err(ApiError::NotFound("address")); }
    tracing::info!(address_id = %id, "address deleted");
    Ok(StatusCode::NO_CONTENT)
}
