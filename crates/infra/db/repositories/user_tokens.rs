use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into};
use std::sync::Arc;

use crate::{
    domain::{
        entities::user_tokens::InsertUserTokenEntity,
        repositories::user_tokens::UserTokenRepository,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::user_tokens},
};

pub struct UserTokenPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserTokenPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserTokenRepository for UserTokenPostgres {
    async fn insert_pending_token(&self, token: InsertUserTokenEntity) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let id = insert_into(user_tokens::table)
            .values(&token)
            .returning(user_tokens::id)
            .get_result::<i64>(&mut conn)?;

        Ok(id)
    }
}
