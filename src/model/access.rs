use uuid::Uuid;

use crate::{
    model::{
        ModelManager,
        error::{DatabaseError, DatabaseResult},
    },
    web::AuthenticatedUser,
};

/// Rows that belong to one user: an uploaded H5P content or file, a quiz attempt.
#[async_trait::async_trait]
pub trait HasOwner {
    async fn owner_id(&self, mm: &ModelManager) -> DatabaseResult<Uuid>;
}

/// Admins reach every row; anyone else only the rows they own.
pub async fn check_access<T: HasOwner + Sync>(
    mm: &ModelManager,
    actor: &AuthenticatedUser,
    resource: &T,
) -> DatabaseResult<()> {
    if actor.is_admin() {
        return Ok(());
    }

    check_ownership(mm, actor, resource).await
}

/// Only the owner passes; admins get no bypass.
pub async fn check_ownership<T: HasOwner + Sync>(
    mm: &ModelManager,
    actor: &AuthenticatedUser,
    resource: &T,
) -> DatabaseResult<()> {
    if resource.owner_id(mm).await? == actor.user_id() {
        Ok(())
    } else {
        Err(DatabaseError::Forbidden)
    }
}
