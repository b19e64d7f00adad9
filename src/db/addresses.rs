//! Address book. A user has at most one default address; the partial unique
//! index on `addresses (user_id) WHERE is_default` backs this up.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::Address;

#[derive(Debug, Clone)]
pub struct AddressInput {
    pub label: Option<String>,
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    pub phone: Option<String>,
}

impl From<Address> for AddressInput {
    fn from(a: Address) -> Self {
        Self { label: a.label, full_name: a.full_name, line1: a.line1, line2: a.line2, postal_code: a.postal_code, city: a.city, country: a.country, phone: a.phone }
    }
}

pub async fn list(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<Address>> {
    sqlx::query_as::<_, Address>("SELECT * FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC").bind(user_id).fetch_all(db).await
}

pub async fn find(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<Address>> {
    sqlx::query_as::<_, Address>("SELECT * FROM addresses WHERE id = $1 AND user_id = $2").bind(id).bind(user_id).fetch_optional(db).await
}

async fn clear_default(conn: &mut PgConnection, user_id: Uuid) -> sqlx::Result<()> {
    sqlx::query("UPDATE addresses SET is_default = FALSE, updated_at = NOW() WHERE user_id = $1 AND is_default").bind(user_id).execute(conn).await?;
    Ok(())
}

/// The first address of a user is always the default.
pub async fn create(db: &PgPool, user_id: Uuid, a: &AddressInput, make_default: bool) -> sqlx::Result<Address> {
    let mut tx = db.begin().await?;
    // Serialises concurrent first inserts for the same user.
    sqlx::query("SELECT id FROM profiles WHERE id = $1 FOR UPDATE").bind(user_id).execute(&mut *tx).await?;
    let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM addresses WHERE user_id = $1").bind(user_id).fetch_one(&mut *tx).await?;
    let is_default = make_default || existing.0 == 0;
    if is_default { clear_default(&mut tx, user_id).await?; }
    let address = sqlx::query_as::<_, Address>("INSERT INTO addresses (id, user_id, label, full_name, line1, line2, postal_code, city, country, phone, is_default) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *")
        .bind(Uuid::now_v7()).bind(user_id).bind(&a.label).bind(&a.full_name).bind(&a.line1).bind(&a.line2)
        .bind(&a.postal_code).bind(&a.city).bind(&a.country).bind(&a.phone).bind(is_default)
        .fetch_one(&mut *tx).await?;
    tx.commit().await?;
    Ok(address)
}

pub async fn update(db: &PgPool, user_id: Uuid, id: Uuid, a: &AddressInput) -> sqlx::Result<Option<Address>> {
    sqlx::query_as::<_, Address>("UPDATE addresses SET label = $3, full_name = $4, line1 = $5, line2 = $6, postal_code = $7, city = $8, country = $9, phone = $10, updated_at = NOW() WHERE id = $1 AND user_id = $2 RETURNING *")
        .bind(id).bind(user_id).bind(&a.label).bind(&a.full_name).bind(&a.line1).bind(&a.line2)
        .bind(&a.postal_code).bind(&a.city).bind(&a.country).bind(&a.phone)
        .fetch_optional(db).await
}

pub async fn set_default(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<Address>> {
    let mut tx = db.begin().await?;
    let owned: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM addresses WHERE id = $1 AND user_id = $2 FOR UPDATE").bind(id).bind(user_id).fetch_optional(&mut *tx).await?;
    if owned.is_none() { return Ok(None); }
    clear_default(&mut tx, user_id).await?;
    let address = sqlx::query_as::<_, Address>("UPDATE addresses SET is_default = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *").bind(id).fetch_one(&mut *tx).await?;
    tx.commit().await?;
    Ok(Some(address))
}

/// Deleting the default promotes the most recently created remaining address.
pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    let mut tx = db.begin().await?;
    let deleted: Option<(bool,)> = sqlx::query_as("DELETE FROM addresses WHERE id = $1 AND user_id = $2 RETURNING is_default").bind(id).bind(user_id).fetch_optional(&mut *tx).await?;
    let Some((was_default,)) = deleted else { return Ok(false) };
    if was_default {
        sqlx::query("UPDATE addresses SET is_default = TRUE, updated_at = NOW() WHERE id = (SELECT id FROM addresses WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1)")
            .bind(user_id).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(true)
}
