use crate::model::access::HasOwner;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// An uploaded file kept on disk until `expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct H5pTemporaryFile {
    id: Uuid,
    filename: String,
    #[serde(skip)]
    path: String,
    size: i64,
    mimetype: String,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct H5pTemporaryFileCreate {
    pub filename: String,
    pub path: String,
    pub size: i64,
    pub mimetype: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemporaryFileStats {
    pub total_files: i64,
    pub expired_files: i64,
    pub total_size: i64,
}

impl ResourceTyped for H5pTemporaryFile {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::H5pTemporaryFile
    }
}

#[async_trait]
impl HasOwner for H5pTemporaryFile {
    async fn owner_id(&self, _mm: &ModelManager) -> DatabaseResult<Uuid> {
        Ok(self.user_id)
    }
}

impl H5pTemporaryFile {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub async fn create(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        data: H5pTemporaryFileCreate,
    ) -> DatabaseResult<Self> {
        let expires_at = Utc::now() + Duration::hours(data.expiration_hours);
        let file = sqlx::query_as(
            r#"
            INSERT INTO h5p_temporary_files (id, filename, path, size, mimetype, user_id, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.filename)
        .bind(&data.path)
        .bind(data.size)
        .bind(&data.mimetype)
        .bind(actor.user_id())
        .bind(expires_at)
        .fetch_one(mm.executor())
        .await?;
        Ok(file)
    }

    pub async fn find_by_id(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM h5p_temporary_files WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn all_active_by_user(mm: &ModelManager, user_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM h5p_temporary_files WHERE user_id = $1 AND expires_at > NOW() ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn all_expired(mm: &ModelManager) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM h5p_temporary_files WHERE expires_at <= NOW()")
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn delete(self, mm: &ModelManager) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM h5p_temporary_files WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    /// Pushes the expiry back by `hours`, starting from the current expiry.
    pub async fn extend(self, mm: &ModelManager, hours: i64) -> DatabaseResult<Self> {
        let expires_at = self.expires_at + Duration::hours(hours);
        let file = sqlx::query_as("UPDATE h5p_temporary_files SET expires_at = $1 WHERE id = $2 RETURNING *")
            .bind(expires_at)
            .bind(self.id)
            .fetch_one(mm.executor())
            .await?;
        Ok(file)
    }

    pub async fn stats(mm: &ModelManager) -> DatabaseResult<TemporaryFileStats> {
        let stats = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total_files,
                COUNT(*) FILTER (WHERE expires_at <= NOW()) AS expired_files,
                COALESCE(SUM(size), 0)::BIGINT AS total_size
            FROM h5p_temporary_files
            "#,
        )
        .fetch_one(mm.executor())
        .await?;
        Ok(stats)
    }
}
