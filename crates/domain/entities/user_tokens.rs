use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infra::db::postgres::schema::user_tokens;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = user_tokens)]
pub struct UserTokenEntity {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub token_type: String,
    pub used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Pending gateway order waiting for its payment confirmation.
#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = user_tokens)]
pub struct InsertUserTokenEntity {
    pub user_id: i64,
    pub token: String,
    pub token_type: String,
    pub used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
