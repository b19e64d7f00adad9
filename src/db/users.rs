use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::like_pattern;
use crate::models::Profile;

#[derive(Debug, Clone, Serialize)]
pub struct ProfileWithStats {
    #[serde(flatten)]
    pub profile: Profile,
    pub order_count: i64,
    pub total_spent_cents: i64,
}

pub async fn role_of(db: &PgPool, id: Uuid) -> sqlx::Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT role FROM profiles WHERE id = $1").bind(id).fetch_optional(db).await?;
    Ok(row.map(|r| r.0))
}

pub async fn find(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Profile>> {
    sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1").bind(id).fetch_optional(db).await
}

pub async fn update_profile(db: &PgPool, id: Uuid, full_name: Option<&str>, phone: Option<&str>) -> sqlx::Result<Option<Profile>> {
    sqlx::query_as::<_, Profile>("UPDATE profiles SET full_name = $2, phone = $3, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(full_name).bind(phone).fetch_optional(db).await
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub search: Option<String>,
    pub role: Option<String>,
}

fn push_user_filters(qb: &mut QueryBuilder<'_, Postgres>, f: &UserFilter) {
    if let Some(role) = &f.role { qb.push(" AND role = ").push_bind(role.clone()); }
    if let Some(term) = f.search.as_deref().filter(|t| !t.trim().is_empty()) {
        let pattern = like_pattern(term);
        qb.push(" AND (email ILIKE ").push_bind(pattern.clone()).push(" OR full_name ILIKE ").push_bind(pattern).push(")");
    }
}

pub async fn list(db: &PgPool, f: &UserFilter, limit: u32, offset: i64) -> sqlx::Result<(Vec<Profile>, i64)> {
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM profiles WHERE TRUE");
    push_user_filters(&mut count, f);
    let total: (i64,) = count.build_query_as().fetch_one(db).await?;

    let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM profiles WHERE TRUE");
    push_user_filters(&mut select, f);
    select.push(" ORDER BY created_at DESC LIMIT ").push_bind(i64::from(limit)).push(" OFFSET ").push_bind(offset);
    let users = select.build_query_as::<Profile>().fetch_all(db).await?;
    Ok((users, total.0))
}

/// Spending counts paid and partially refunded orders.
pub async fn with_stats(db: &PgPool, profile: Profile) -> sqlx::Result<ProfileWithStats> {
    let (order_count, total_spent_cents): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(COALESCE(amount_paid_cents, total_cents)) FILTER (WHERE payment_status IN ('paid', 'partially_refunded')), 0)::bigint FROM orders WHERE user_id = $1",
    )
    .bind(profile.id)
    .fetch_one(db)
    .await?;
    Ok(ProfileWithStats { profile, order_count, total_spent_cents })
}

pub async fn set_role(db: &PgPool, id: Uuid, role: &str) -> sqlx::Result<Option<Profile>> {
    sqlx::query_as::<_, Profile>("UPDATE profiles SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING *").bind(id).bind(role).fetch_optional(db).await
}
