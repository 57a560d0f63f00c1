use crate::model::access::HasOwner;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository, repo::PaginatableRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// An installed piece of H5P content; files live under the content storage directory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct H5pContent {
    id: Uuid,
    title: String,
    library: String,
    params: Value,
    metadata: Value,
    is_public: bool,
    uploader_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct H5pContentCreateUpdate {
    pub title: String,
    pub library: String,
    pub params: Value,
    pub metadata: Value,
    pub is_public: bool,
}

impl From<&H5pContent> for H5pContentCreateUpdate {
    fn from(content: &H5pContent) -> Self {
        Self {
            title: content.title.clone(),
            library: content.library.clone(),
            params: content.params.clone(),
            metadata: content.metadata.clone(),
            is_public: content.is_public,
        }
    }
}

impl ResourceTyped for H5pContent {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::H5pContent
    }
}

impl H5pContent {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }

    pub fn uploader_id(&self) -> Uuid {
        self.uploader_id
    }
}

#[async_trait]
impl CrudRepository<H5pContent, H5pContentCreateUpdate, Uuid> for H5pContent {
    async fn create(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        data: H5pContentCreateUpdate,
    ) -> DatabaseResult<Self> {
        let content = sqlx::query_as(
            r#"
            INSERT INTO h5p_contents (id, title, library, params, metadata, is_public, uploader_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.title)
        .bind(&data.library)
        .bind(&data.params)
        .bind(&data.metadata)
        .bind(data.is_public)
        .bind(actor.user_id())
        .fetch_one(mm.executor())
        .await?;
        Ok(content)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: H5pContentCreateUpdate,
    ) -> DatabaseResult<Self> {
        let content = sqlx::query_as(
            r#"
            UPDATE h5p_contents
            SET title = $1, library = $2, params = $3, metadata = $4, is_public = $5, updated_at = NOW()
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(&data.library)
        .bind(&data.params)
        .bind(&data.metadata)
        .bind(data.is_public)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(content)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM h5p_contents WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM h5p_contents WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }
}

#[async_trait]
impl PaginatableRepository<H5pContent> for H5pContent {
    /// Staff see everything, others only public content and their own uploads.
    async fn list(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            r#"
            SELECT * FROM h5p_contents
            WHERE $1 OR is_public OR uploader_id = $2
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(actor.is_staff())
        .bind(actor.user_id())
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM h5p_contents WHERE $1 OR is_public OR uploader_id = $2")
                .bind(actor.is_staff())
                .bind(actor.user_id())
                .fetch_one(mm.executor())
                .await?;
        Ok(result)
    }
}

#[async_trait]
impl HasOwner for H5pContent {
    async fn owner_id(&self, _mm: &ModelManager) -> DatabaseResult<Uuid> {
        Ok(self.uploader_id)
    }
}

/// Scope of the content lookups that go through page blocks.
#[derive(Debug, Clone, Copy)]
pub enum ContentScope {
    PageBlock(Uuid),
    Page(Uuid),
    Lesson(Uuid),
    Book(Uuid),
    Class(Uuid),
}

impl H5pContent {
    /// Distinct contents referenced by H5P blocks inside `scope`.
    pub async fn all_in_scope(mm: &ModelManager, scope: ContentScope) -> DatabaseResult<Vec<Self>> {
        let (filter, id) = match scope {
            ContentScope::PageBlock(id) => ("pb.id = $1", id),
            ContentScope::Page(id) => ("p.id = $1", id),
            ContentScope::Lesson(id) => ("l.id = $1", id),
            ContentScope::Book(id) => ("l.book_id = $1", id),
            ContentScope::Class(id) => {
                ("l.book_id IN (SELECT book_id FROM book_classes WHERE class_id = $1)", id)
            }
        };

        let sql = format!(
            r#"
            SELECT DISTINCT c.* FROM h5p_contents c
            JOIN page_blocks pb ON pb.h5p_content_id = c.id
            JOIN pages p ON p.id = pb.page_id
            JOIN lessons l ON l.id = p.lesson_id
            WHERE {filter}
            ORDER BY c.created_at DESC
            "#
        );
        let result = sqlx::query_as(&sql).bind(id).fetch_all(mm.executor()).await?;
        Ok(result)
    }

    pub async fn count_all(mm: &ModelManager) -> DatabaseResult<i64> {
        let result = sqlx::query_scalar("SELECT COUNT(*) FROM h5p_contents")
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }
}
