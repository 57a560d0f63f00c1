use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    id: Uuid,
    book_id: Uuid,
    title: String,
    description: Option<String>,
    #[sqlx(rename = "order_index")]
    order: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ChapterCreateUpdate {
    pub book_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Appended after the last chapter when `None`.
    pub order: Option<i32>,
}

impl From<&Chapter> for ChapterCreateUpdate {
    fn from(chapter: &Chapter) -> Self {
        Self {
            book_id: chapter.book_id,
            title: chapter.title.clone(),
            description: chapter.description.clone(),
            order: Some(chapter.order),
        }
    }
}

impl ResourceTyped for Chapter {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Chapter
    }
}

impl Chapter {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn book_id(&self) -> Uuid {
        self.book_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn order(&self) -> i32 {
        self.order
    }
}

#[async_trait]
impl CrudRepository<Chapter, ChapterCreateUpdate, Uuid> for Chapter {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: ChapterCreateUpdate,
    ) -> DatabaseResult<Self> {
        let chapter = sqlx::query_as(
            r#"
            INSERT INTO chapters (id, book_id, title, description, order_index)
            VALUES ($1, $2, $3, $4,
                COALESCE($5, (SELECT COALESCE(MAX(order_index), 0) + 1 FROM chapters WHERE book_id = $2)))
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.book_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.order)
        .fetch_one(mm.executor())
        .await?;
        Ok(chapter)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: ChapterCreateUpdate,
    ) -> DatabaseResult<Self> {
        let chapter = sqlx::query_as(
            r#"
            UPDATE chapters SET title = $1, description = $2, order_index = COALESCE($3, order_index), updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.order)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(chapter)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM chapters WHERE id = $1")
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
        let result = sqlx::query_as("SELECT * FROM chapters WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }
}

impl Chapter {
    pub async fn all_by_book(mm: &ModelManager, book_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM chapters WHERE book_id = $1 ORDER BY order_index ASC")
            .bind(book_id)
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn count_lessons(&self, mm: &ModelManager) -> DatabaseResult<i64> {
        let result = sqlx::query_scalar("SELECT COUNT(*) FROM lessons WHERE chapter_id = $1")
            .bind(self.id)
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }
}
