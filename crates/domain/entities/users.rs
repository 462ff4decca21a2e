use diesel::prelude::*;

use crate::infra::db::postgres::schema::users;

/// The handful of user columns billing responses expose. Credentials and
/// login bookkeeping stay with the auth service.
#[derive(Debug, Clone, PartialEq, Selectable, Queryable)]
#[diesel(table_name = users)]
pub struct UserSummaryEntity {
    pub id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}
