//! Categories, collections and products.

use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{like_pattern, Lookup};
use crate::domain::aggregates::{CatalogEntry, StockReason};
use crate::domain::events::DomainEvent;
use crate::error::ApiResult;
use crate::models::{Category, Collection, Product};

// =============================================================================
// Categories
// =============================================================================

#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<Uuid>,
    pub position: i32,
}

impl From<Category> for CategoryInput {
    fn from(c: Category) -> Self {
        Self { name: c.name, slug: c.slug, description: c.description, image_url: c.image_url, parent_id: c.parent_id, position: c.position }
    }
}

pub async fn list_categories(db: &PgPool) -> sqlx::Result<Vec<Category>> {
    sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY position, name").fetch_all(db).await
}

pub async fn find_category(db: &PgPool, key: &Lookup) -> sqlx::Result<Option<Category>> {
    match key {
        Lookup::Id(id) => sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1").bind(id).fetch_optional(db).await,
        Lookup::Slug(slug) => sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE slug = $1").bind(slug).fetch_optional(db).await,
    }
}

pub async fn insert_category(db: &PgPool, c: &CategoryInput) -> sqlx::Result<Category> {
    sqlx::query_as::<_, Category>("INSERT INTO categories (id, name, slug, description, image_url, parent_id, position) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *")
        .bind(Uuid::now_v7()).bind(&c.name).bind(&c.slug).bind(&c.description).bind(&c.image_url).bind(c.parent_id).bind(c.position)
        .fetch_one(db).await
}

pub async fn update_category(db: &PgPool, id: Uuid, c: &CategoryInput) -> sqlx::Result<Option<Category>> {
    sqlx::query_as::<_, Category>("UPDATE categories SET name = $2, slug = $3, description = $4, image_url = $5, parent_id = $6, position = $7, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(&c.name).bind(&c.slug).bind(&c.description).bind(&c.image_url).bind(c.parent_id).bind(c.position)
        .fetch_optional(db).await
}

pub async fn count_products_in_category(db: &PgPool, id: Uuid) -> sqlx::Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE category_id = $1").bind(id).fetch_one(db).await?;
    Ok(row.0)
}

pub async fn delete_category(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(db).await?;
    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Collections
// =============================================================================

#[derive(Debug, Clone)]
pub struct CollectionInput {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_featured: bool,
}

impl From<Collection> for CollectionInput {
    fn from(c: Collection) -> Self {
        Self { name: c.name, slug: c.slug, description: c.description, image_url: c.image_url, is_featured: c.is_featured }
    }
}

pub async fn list_collections(db: &PgPool) -> sqlx::Result<Vec<Collection>> {
    sqlx::query_as::<_, Collection>("SELECT * FROM collections ORDER BY is_featured DESC, name").fetch_all(db).await
}

pub async fn find_collection(db: &PgPool, key: &Lookup) -> sqlx::Result<Option<Collection>> {
    match key {
        Lookup::Id(id) => sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE id = $1").bind(id).fetch_optional(db).await,
        Lookup::Slug(slug) => sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE slug = $1").bind(slug).fetch_optional(db).await,
    }
}

/// Members of a collection in their curated order.
pub async fn collection_products(db: &PgPool, collection_id: Uuid, include_inactive: bool) -> sqlx::Result<Vec<Product>> {
    sqlx::query_as::<_, Product>("SELECT p.* FROM products p JOIN collection_products cp ON cp.product_id = p.id WHERE cp.collection_id = $1 AND ($2 OR p.is_active) ORDER BY cp.position, p.name")
        .bind(collection_id).bind(include_inactive).fetch_all(db).await
}

pub async fn insert_collection(db: &PgPool, c: &CollectionInput) -> sqlx::Result<Collection> {
    sqlx::query_as::<_, Collection>("INSERT INTO collections (id, name, slug, description, image_url, is_featured) VALUES ($1, $2, $3, $4, $5, $6) RETURNING *")
        .bind(Uuid::now_v7()).bind(&c.name).bind(&c.slug).bind(&c.description).bind(&c.image_url).bind(c.is_featured)
        .fetch_one(db).await
}

pub async fn update_collection(db: &PgPool, id: Uuid, c: &CollectionInput) -> sqlx::Result<Option<Collection>> {
    sqlx::query_as::<_, Collection>("UPDATE collections SET name = $2, slug = $3, description = $4, image_url = $5, is_featured = $6, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(&c.name).bind(&c.slug).bind(&c.description).bind(&c.image_url).bind(c.is_featured)
        .fetch_optional(db).await
}

pub async fn delete_collection(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM collections WHERE id = $1").bind(id).execute(db).await?;
    Ok(result.rows_affected() > 0)
}

/// Replaces the membership; positions follow the order of `product_ids`.
pub async fn set_collection_products(db: &PgPool, collection_id: Uuid, product_ids: &[Uuid]) -> sqlx::Result<()> {
    let mut tx = db.begin().await?;
    sqlx::query("DELETE FROM collection_products WHERE collection_id = $1").bind(collection_id).execute(&mut *tx).await?;
    sqlx::query("INSERT INTO collection_products (collection_id, product_id, position) SELECT $1, t.product_id, (t.ord - 1)::int FROM UNNEST($2::uuid[]) WITH ORDINALITY AS t(product_id, ord)")
        .bind(collection_id).bind(product_ids).execute(&mut *tx).await?;
    sqlx::query("UPDATE collections SET updated_at = NOW() WHERE id = $1").bind(collection_id).execute(&mut *tx).await?;
    tx.commit().await
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort { #[default] Newest, PriceAsc, PriceDesc, Name }

impl ProductSort {
    fn order_by(&self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY created_at DESC, id DESC",
            Self::PriceAsc => " ORDER BY price_cents ASC, name",
            Self::PriceDesc => " ORDER BY price_cents DESC, name",
            Self::Name => " ORDER BY name, id",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<Uuid>,
    pub collection: Option<Uuid>,
    pub search: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub in_stock: Option<bool>,
    pub featured: Option<bool>,
    pub include_inactive: bool,
    pub sort: ProductSort,
}

fn push_product_filters(qb: &mut QueryBuilder<'_, Postgres>, f: &ProductFilter) {
    if !f.include_inactive { qb.push(" AND is_active"); }
    if let Some(category) = f.category { qb.push(" AND category_id = ").push_bind(category); }
    if let Some(collection) = f.collection {
        qb.push(" AND id IN (SELECT product_id FROM collection_products WHERE collection_id = ").push_bind(collection).push(")");
    }
    if let Some(term) = f.search.as_deref().filter(|t| !t.trim().is_empty()) {
        let pattern = like_pattern(term);
        qb.push(" AND (name ILIKE ").push_bind(pattern.clone()).push(" OR description ILIKE ").push_bind(pattern).push(")");
    }
    if let Some(min) = f.min_price { qb.push(" AND price_cents >= ").push_bind(min); }
    if let Some(max) = f.max_price { qb.push(" AND price_cents <= ").push_bind(max); }
    match f.in_stock {
        Some(true) => { qb.push(" AND stock_quantity > 0"); }
        Some(false) => { qb.push(" AND stock_quantity = 0"); }
        None => {}
    }
    if let Some(featured) = f.featured { qb.push(" AND is_featured = ").push_bind(featured); }
}

pub async fn list_products(db: &PgPool, f: &ProductFilter, limit: u32, offset: i64) -> sqlx::Result<(Vec<Product>, i64)> {
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products WHERE TRUE");
    push_product_filters(&mut count, f);
    let total: (i64,) = count.build_query_as().fetch_one(db).await?;

    let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM products WHERE TRUE");
    push_product_filters(&mut select, f);
    select.push(f.sort.order_by());
    select.push(" LIMIT ").push_bind(i64::from(limit)).push(" OFFSET ").push_bind(offset);
    let products = select.build_query_as::<Product>().fetch_all(db).await?;
    Ok((products, total.0))
}

pub async fn find_product(db: &PgPool, key: &Lookup, include_inactive: bool) -> sqlx::Result<Option<Product>> {
    match key {
        Lookup::Id(id) => sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND ($2 OR is_active)").bind(id).bind(include_inactive).fetch_optional(db).await,
        Lookup::Slug(slug) => sqlx::query_as::<_, Product>("SELECT * FROM products WHERE slug = $1 AND ($2 OR is_active)").bind(slug).bind(include_inactive).fetch_optional(db).await,
    }
}

#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub compare_at_price_cents: Option<i64>,
    pub sku: Option<String>,
    pub category_id: Option<Uuid>,
    pub images: Vec<String>,
    pub material: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
}

impl From<Product> for ProductInput {
    fn from(p: Product) -> Self {
        Self {
            name: p.name, slug: p.slug, description: p.description, price_cents: p.price_cents,
            compare_at_price_cents: p.compare_at_price_cents, sku: p.sku, category_id: p.category_id,
            images: p.images, material: p.material, is_active: p.is_active, is_featured: p.is_featured,
        }
    }
}

/// Inserts the product; an opening stock is booked as a `restock` movement.
pub async fn insert_product(db: &PgPool, p: &ProductInput, initial_stock: i32, low_threshold: i32) -> ApiResult<(Product, Vec<DomainEvent>)> {
    let mut tx = db.begin().await?;
    let product = sqlx::query_as::<_, Product>("INSERT INTO products (id, name, slug, description, price_cents, compare_at_price_cents, sku, stock_quantity, category_id, images, material, is_active, is_featured) VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $9, $10, $11, $12) RETURNING *")
        .bind(Uuid::now_v7()).bind(&p.name).bind(&p.slug).bind(&p.description).bind(p.price_cents).bind(p.compare_at_price_cents)
        .bind(&p.sku).bind(p.category_id).bind(&p.images).bind(&p.material).bind(p.is_active).bind(p.is_featured)
        .fetch_one(&mut *tx).await?;
    let mut events = Vec::new();
    if initial_stock > 0 {
        let moved = super::stock::apply_movement(&mut tx, product.id, initial_stock, StockReason::Restock, None, Some("stock initial"), low_threshold).await?;
        events = moved.events;
    }
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1").bind(product.id).fetch_one(&mut *tx).await?;
    tx.commit().await?;
    Ok((product, events))
}

pub async fn update_product(db: &PgPool, id: Uuid, p: &ProductInput) -> sqlx::Result<Option<Product>> {
    sqlx::query_as::<_, Product>("UPDATE products SET name = $2, slug = $3, description = $4, price_cents = $5, compare_at_price_cents = $6, sku = $7, category_id = $8, images = $9, material = $10, is_active = $11, is_featured = $12, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(&p.name).bind(&p.slug).bind(&p.description).bind(p.price_cents).bind(p.compare_at_price_cents)
        .bind(&p.sku).bind(p.category_id).bind(&p.images).bind(&p.material).bind(p.is_active).bind(p.is_featured)
        .fetch_optional(db).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductRemoval { Deleted, Deactivated, NotFound }

/// Products that appear on an order are only deactivated.
pub async fn remove_product(db: &PgPool, id: Uuid) -> sqlx::Result<ProductRemoval> {
    let mut tx = db.begin().await?;
    let referenced: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM order_items WHERE product_id = $1)").bind(id).fetch_one(&mut *tx).await?;
    let outcome = if referenced.0 {
        let r = sqlx::query("UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1").bind(id).execute(&mut *tx).await?;
        if r.rows_affected() > 0 { ProductRemoval::Deactivated } else { ProductRemoval::NotFound }
    } else {
        let r = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&mut *tx).await?;
        if r.rows_affected() > 0 { ProductRemoval::Deleted } else { ProductRemoval::NotFound }
    };
    tx.commit().await?;
    Ok(outcome)
}

#[derive(sqlx::FromRow)]
struct CatalogRow { id: Uuid, name: String, sku: Option<String>, image: Option<String>, price_cents: i64, stock_quantity: i32, is_active: bool }

/// Pricing view of the given products; unknown ids are simply absent.
pub async fn catalog_entries(db: &PgPool, ids: &[Uuid]) -> sqlx::Result<Vec<CatalogEntry>> {
    let rows = sqlx::query_as::<_, CatalogRow>("SELECT id, name, sku, images[1] AS image, price_cents, stock_quantity, is_active FROM products WHERE id = ANY($1)")
        .bind(ids).fetch_all(db).await?;
    Ok(rows
        .into_iter()
        .map(|r| CatalogEntry { product_id: r.id, name: r.name, sku: r.sku, image: r.image, unit_price_cents: r.price_cents, stock_quantity: r.stock_quantity, is_active: r.is_active })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql(f: &ProductFilter) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM products WHERE TRUE");
        push_product_filters(&mut qb, f);
        qb.sql().to_string()
    }

    #[test]
    fn test_public_filter_hides_inactive() {
        assert_eq!(sql(&ProductFilter::default()), "SELECT * FROM products WHERE TRUE AND is_active");
        assert_eq!(sql(&ProductFilter { include_inactive: true, ..Default::default() }), "SELECT * FROM products WHERE TRUE");
    }

    #[test]
    fn test_filters_bind_in_order() {
        let f = ProductFilter { search: Some("opale".into()), min_price: Some(1000), in_stock: Some(true), ..Default::default() };
        assert_eq!(sql(&f), "SELECT * FROM products WHERE TRUE AND is_active AND (name ILIKE $1 OR description ILIKE $2) AND price_cents >= $3 AND stock_quantity > 0");
    }

    #[test]
    fn test_blank_search_is_ignored() {
        assert!(!sql(&ProductFilter { search: Some("  ".into()), ..Default::default() }).contains("ILIKE"));
    }

    #[test]
    fn test_sort_parse() {
        let sort: ProductSort = serde_json::from_str("\"price_desc\"").unwrap();
        assert_eq!(sort, ProductSort::PriceDesc);
        assert!(ProductSort::default().order_by().contains("created_at DESC"));
    }
}
