use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::user_tokens::InsertUserTokenEntity;

#[automock]
#[async_trait]
pub trait UserTokenRepository {
    async fn insert_pending_token(&self, token: InsertUserTokenEntity) -> Result<i64>;
}
