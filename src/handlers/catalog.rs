//! Categories, collections, products and the stock ledger.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{merge_text, nullable};
use crate::auth::AdminUser;
use crate::db::catalog::{self as catalog, CategoryInput, CollectionInput, ProductFilter, ProductInput, ProductRemoval, ProductSort};
use crate::db::{self, Lookup};
use crate::domain::aggregates::{validate_pricing, StockReason};
use crate::domain::value_objects::{Sku, Slug};
use crate::error::{ApiError, ApiResult};
use crate::models::{page_window, Category, Collection, ListParams, PaginatedResponse, Product, StockMovement};
use crate::state::AppState;

fn resolve_slug(explicit: Option<&str>, name: &str) -> ApiResult<String> {
    let slug = match explicit {
        Some(s) => Slug::parse(s)?,
        None => Slug::from_name(name)?,
    };
    Ok(slug.into_inner())
}

fn required<T>(value: Option<T>, field: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::Validation(format!("{field} is required")))
}

// =============================================================================
// Categories
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub slug: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub parent_id: Option<Option<Uuid>>,
    pub position: Option<i32>,
}

pub async fn list_categories(State(s): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(catalog::list_categories(&s.db).await?))
}

pub async fn get_category(State(s): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<Category>> {
    catalog::find_category(&s.db, &Lookup::parse(&key)).await?.map(Json).ok_or(ApiError::NotFound("category"))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create_category(State(s): State<AppState>, AdminUser(admin): AdminUser, Json(r): Json<CategoryRequest>) -> ApiResult<(StatusCode, Json<Category>)> {
    r.validate()?;
    let name = required(r.name, "name")?.trim().to_string();
    let input = CategoryInput {
        slug: resolve_slug(r.slug.as_deref(), &name)?,
        name,
        description: merge_text(None, r.description),
        image_url: merge_text(None, r.image_url),
        parent_id: r.parent_id.flatten(),
        position: r.position.unwrap_or(0),
    };
    let category = catalog::insert_category(&s.db, &input).await?;
    tracing::info!(category_id = %category.id, slug = %category.slug, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn update_category(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<CategoryRequest>) -> ApiResult<Json<Category>> {
    r.validate()?;
    let current = catalog::find_category(&s.db, &Lookup::Id(id)).await?.ok_or(ApiError::NotFound("category"))?;
    let mut input = CategoryInput::from(current);
    if let Some(name) = r.name { input.name = name.trim().to_string(); }
    if let Some(slug) = r.slug.as_deref() { input.slug = resolve_slug(Some(slug), &input.name)?; }
    input.description = merge_text(input.description, r.description);
    input.image_url = merge_text(input.image_url, r.image_url);
    if let Some(parent_id) = r.parent_id {
        if parent_id == Some(id) { return Err(ApiError::Validation("a category cannot be its own parent".into())); }
        input.parent_id = parent_id;
    }
    if let Some(position) = r.position { input.position = position; }
    let category = catalog::update_category(&s.db, id, &input).await?.ok_or(ApiError::NotFound("category"))?;
    tracing::info!(category_id = %id, "category updated");
    Ok(Json(category))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn delete_category(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    let products = catalog::count_products_in_category(&s.db, id).await?;
    if products > 0 {
        return Err(ApiError::Conflict(format!("category still holds {products} product(s)")));
    }
    if !catalog::delete_category(&s.db, id).await? { return Err(ApiError::NotFound("category")); }
    tracing::info!(category_id = %id, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Collections
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CollectionRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub slug: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    pub is_featured: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct MembershipRequest {
    pub product_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CollectionWithProducts {
    #[serde(flatten)]
    pub collection: Collection,
    pub products: Vec<Product>,
}

pub async fn list_collections(State(s): State<AppState>) -> ApiResult<Json<Vec<Collection>>> {
    Ok(Json(catalog::list_collections(&s.db).await?))
}

pub async fn get_collection(State(s): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<CollectionWithProducts>> {
    let collection = catalog::find_collection(&s.db, &Lookup::parse(&key)).await?.ok_or(ApiError::NotFound("collection"))?;
    let products = catalog::collection_products(&s.db, collection.id, false).await?;
    Ok(Json(CollectionWithProducts { collection, products }))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create_collection(State(s): State<AppState>, AdminUser(admin): AdminUser, Json(r): Json<CollectionRequest>) -> ApiResult<(StatusCode, Json<Collection>)> {
    r.validate()?;
    let name = required(r.name, "name")?.trim().to_string();
    let input = CollectionInput {
        slug: resolve_slug(r.slug.as_deref(), &name)?,
        name,
        description: merge_text(None, r.description),
        image_url: merge_text(None, r.image_url),
        is_featured: r.is_featured.unwrap_or(false),
    };
    let collection = catalog::insert_collection(&s.db, &input).await?;
    tracing::info!(collection_id = %collection.id, slug = %collection.slug, "collection created");
    Ok((StatusCode::CREATED, Json(collection)))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn update_collection(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<CollectionRequest>) -> ApiResult<Json<Collection>> {
    r.validate()?;
    let current = catalog::find_collection(&s.db, &Lookup::Id(id)).await?.ok_or(ApiError::NotFound("collection"))?;
    let mut input = CollectionInput::from(current);
    if let Some(name) = r.name { input.name = name.trim().to_string(); }
    if let Some(slug) = r.slug.as_deref() { input.slug = resolve_slug(Some(slug), &input.name)?; }
    input.description = merge_text(input.description, r.description);
    input.image_url = merge_text(input.image_url, r.image_url);
    if let Some(featured) = r.is_featured { input.is_featured = featured; }
    let collection = catalog::update_collection(&s.db, id, &input).await?.ok_or(ApiError::NotFound("collection"))?;
    tracing::info!(collection_id = %id, "collection updated");
    Ok(Json(collection))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn delete_collection(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    if !catalog::delete_collection(&s.db, id).await? { return Err(ApiError::NotFound("collection")); }
    tracing::info!(collection_id = %id, "collection deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Keeps the first occurrence of each id.
fn dedup_ordered(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn set_collection_products(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<MembershipRequest>) -> ApiResult<Json<CollectionWithProducts>> {
    let collection = catalog::find_collection(&s.db, &Lookup::Id(id)).await?.ok_or(ApiError::NotFound("collection"))?;
    let product_ids = dedup_ordered(r.product_ids);
    catalog::set_collection_products(&s.db, id, &product_ids).await?;
    tracing::info!(collection_id = %id, products = product_ids.len(), "collection membership replaced");
    let products = catalog::collection_products(&s.db, id, true).await?;
    Ok(Json(CollectionWithProducts { collection, products }))
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<Uuid>,
    pub collection: Option<Uuid>,
    pub search: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub in_stock: Option<bool>,
    pub featured: Option<bool>,
    pub sort: Option<ProductSort>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductQuery {
    fn filter(&self, include_inactive: bool) -> ApiResult<ProductFilter> {
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max { return Err(ApiError::Validation("min_price must not exceed max_price".into())); }
        }
        Ok(ProductFilter {
            category: self.category,
            collection: self.collection,
            search: self.search.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
            in_stock: self.in_stock,
            featured: self.featured,
            include_inactive,
            sort: self.sort.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub slug: Option<String>,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price_cents: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub compare_at_price_cents: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub sku: Option<Option<String>>,
    #[validate(range(min = 0))]
    pub stock_quantity: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<Uuid>>,
    pub images: Option<Vec<String>>,
    #[validate(length(max = 200))]
    pub material: Option<String>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

fn normalize_sku(sku: Option<String>) -> ApiResult<Option<String>> {
    match sku.filter(|s| !s.trim().is_empty()) {
        Some(s) => Ok(Some(Sku::new(s)?.into_inner())),
        None => Ok(None),
    }
}

fn clean_images(images: Vec<String>) -> Vec<String> {
    images.into_iter().map(|i| i.trim().to_string()).filter(|i| !i.is_empty()).collect()
}

pub async fn list_products(State(s): State<AppState>, Query(q): Query<ProductQuery>) -> ApiResult<Json<PaginatedResponse<Product>>> {
    let (page, per_page, offset) = page_window(q.page, q.per_page);
    let (data, total) = catalog::list_products(&s.db, &q.filter(false)?, per_page, offset).await?;
    Ok(Json(PaginatedResponse { data, total, page, per_page }))
}

pub async fn get_product(State(s): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<Product>> {
    catalog::find_product(&s.db, &Lookup::parse(&key), false).await?.map(Json).ok_or(ApiError::NotFound("product"))
}

pub async fn admin_list_products(State(s): State<AppState>, AdminUser(_): AdminUser, Query(q): Query<ProductQuery>) -> ApiResult<Json<PaginatedResponse<Product>>> {
    let (page, per_page, offset) = page_window(q.page, q.per_page);
    let (data, total) = catalog::list_products(&s.db, &q.filter(true)?, per_page, offset).await?;
    Ok(Json(PaginatedResponse { data, total, page, per_page }))
}

pub async fn admin_get_product(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> ApiResult<Json<Product>> {
    catalog::find_product(&s.db, &Lookup::Id(id), true).await?.map(Json).ok_or(ApiError::NotFound("product"))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create_product(State(s): State<AppState>, AdminUser(admin): AdminUser, Json(r): Json<ProductRequest>) -> ApiResult<(StatusCode, Json<Product>)> {
    r.validate()?;
    let name = required(r.name, "name")?.trim().to_string();
    let price_cents = required(r.price_cents, "price_cents")?;
    let compare_at_price_cents = r.compare_at_price_cents.flatten();
    validate_pricing(price_cents, compare_at_price_cents)?;
    let input = ProductInput {
        slug: resolve_slug(r.slug.as_deref(), &name)?,
        name,
        description: merge_text(None, r.description),
        price_cents,
        compare_at_price_cents,
        sku: normalize_sku(r.sku.flatten())?,
        category_id: r.category_id.flatten(),
        images: clean_images(r.images.unwrap_or_default()),
        material: merge_text(None, r.material),
        is_active: r.is_active.unwrap_or(true),
        is_featured: r.is_featured.unwrap_or(false),
    };
    let (product, events) = catalog::insert_product(&s.db, &input, r.stock_quantity.unwrap_or(0), s.config.low_stock_threshold).await?;
    tracing::info!(product_id = %product.id, slug = %product.slug, stock = product.stock_quantity, "product created");
    s.events.publish_all(events).await;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Stock is not editable here; it moves through stock adjustments only.
#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn update_product(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<ProductRequest>) -> ApiResult<Json<Product>> {
    r.validate()?;
    if r.stock_quantity.is_some() {
        return Err(ApiError::Validation("stock_quantity changes go through stock adjustments".into()));
    }
    let current = catalog::find_product(&s.db, &Lookup::Id(id), true).await?.ok_or(ApiError::NotFound("product"))?;
    let mut input = ProductInput::from(current);
    if let Some(name) = r.name { input.name = name.trim().to_string(); }
    if let Some(slug) = r.slug.as_deref() { input.slug = resolve_slug(Some(slug), &input.name)?; }
    input.description = merge_text(input.description, r.description);
    if let Some(price) = r.price_cents { input.price_cents = price; }
    if let Some(compare_at) = r.compare_at_price_cents { input.compare_at_price_cents = compare_at; }
    validate_pricing(input.price_cents, input.compare_at_price_cents)?;
    if let Some(sku) = r.sku { input.sku = normalize_sku(sku)?; }
    if let Some(category_id) = r.category_id { input.category_id = category_id; }
    if let Some(images) = r.images { input.images = clean_images(images); }
    input.material = merge_text(input.material, r.material);
    if let Some(active) = r.is_active { input.is_active = active; }
    if let Some(featured) = r.is_featured { input.is_featured = featured; }
    let product = catalog::update_product(&s.db, id, &input).await?.ok_or(ApiError::NotFound("product"))?;
    tracing::info!(product_id = %id, "product updated");
    Ok(Json(product))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn delete_product(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> ApiResult<Json<serde_json::Value>> {
    let outcome = match catalog::remove_product(&s.db, id).await? {
        ProductRemoval::NotFound => return Err(ApiError::NotFound("product")),
        ProductRemoval::Deleted => "deleted",
        ProductRemoval::Deactivated => "deactivated",
    };
    tracing::info!(product_id = %id, outcome, "product removed");
    Ok(Json(serde_json::json!({ "id": id, "result": outcome })))
}

// =============================================================================
// Stock
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct StockAdjustmentRequest {
    pub delta: i32,
    pub reason: Option<StockReason>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StockAdjustmentResponse {
    pub movement: StockMovement,
    pub stock_quantity: i32,
}

pub async fn list_stock_movements(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>, Query(p): Query<ListParams>) -> ApiResult<Json<PaginatedResponse<StockMovement>>> {
    let (page, per_page, offset) = p.window();
    let (data, total) = db::stock::list_movements(&s.db, id, per_page, offset).await?;
    Ok(Json(PaginatedResponse { data, total, page, per_page }))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn adjust_stock(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<StockAdjustmentRequest>) -> ApiResult<(StatusCode, Json<StockAdjustmentResponse>)> {
    r.validate()?;
    let reason = r.reason.unwrap_or(StockReason::Adjustment);
    let mut tx = s.db.begin().await?;
    let applied = db::stock::apply_movement(&mut tx, id, r.delta, reason, None, r.note.as_deref(), s.config.low_stock_threshold).await?;
    tx.commit().await?;
    tracing::info!(product_id = %id, delta = r.delta, %reason, stock = applied.quantity, "stock adjusted");
    s.events.publish_all(applied.events).await;
    Ok((StatusCode::CREATED, Json(StockAdjustmentResponse { movement: applied.movement, stock_quantity: applied.quantity })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_slug() {
        assert_eq!(resolve_slug(None, "Boucles d'oreilles Étoile").unwrap(), "boucles-d-oreilles-etoile");
        assert_eq!(resolve_slug(Some("Mon Slug"), "ignored").unwrap(), "mon-slug");
        assert!(resolve_slug(None, "!!!").is_err());
    }

    #[test]
    fn test_normalize_sku() {
        assert_eq!(normalize_sku(Some("bag-01".into())).unwrap(), Some("BAG-01".into()));
        assert_eq!(normalize_sku(Some("   ".into())).unwrap(), None);
        assert_eq!(normalize_sku(None).unwrap(), None);
    }

    #[test]
    fn test_price_range_is_checked() {
        let q = ProductQuery { min_price: Some(5000), max_price: Some(1000), ..Default::default() };
        assert!(matches!(q.filter(false), Err(ApiError::Validation(_))));
        let q = ProductQuery { min_price: Some(1000), ..Default::default() };
        assert_eq!(q.filter(true).unwrap().min_price, Some(1000));
    }

    #[test]
    fn test_dedup_keeps_first_position() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        assert_eq!(dedup_ordered(vec![a, b, a]), vec![a, b]);
    }

    #[test]
    fn test_product_request_validation() {
        let r: ProductRequest = serde_json::from_str(r#"{"name":"","price_cents":-1}"#).unwrap();
        assert!(r.validate().is_err());
        let r: ProductRequest = serde_json::from_str(r#"{"name":"Bague","price_cents":3900,"compare_at_price_cents":null}"#).unwrap();
        assert!(r.validate().is_ok());
        assert_eq!(r.compare_at_price_cents, Some(None));
    }
}
