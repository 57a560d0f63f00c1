use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// A page of a lesson, holding an ordered list of page blocks.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonPage {
    id: Uuid,
    lesson_id: Uuid,
    title: Option<String>,
    #[sqlx(rename = "order_index")]
    order: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LessonPageCreateUpdate {
    pub lesson_id: Uuid,
    pub title: Option<String>,
    /// Appended after the last page when `None`.
    pub order: Option<i32>,
}

impl From<&LessonPage> for LessonPageCreateUpdate {
    fn from(page: &LessonPage) -> Self {
        Self {
            lesson_id: page.lesson_id,
            title: page.title.clone(),
            order: Some(page.order),
        }
    }
}

impl ResourceTyped for LessonPage {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Page
    }
}

impl LessonPage {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn lesson_id(&self) -> Uuid {
        self.lesson_id
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn order(&self) -> i32 {
        self.order
    }
}

#[async_trait]
impl CrudRepository<LessonPage, LessonPageCreateUpdate, Uuid> for LessonPage {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: LessonPageCreateUpdate,
    ) -> DatabaseResult<Self> {
        let page = sqlx::query_as(
            r#"
            INSERT INTO pages (id, lesson_id, title, order_index)
            VALUES ($1, $2, $3,
                COALESCE($4, (SELECT COALESCE(MAX(order_index), 0) + 1 FROM pages WHERE lesson_id = $2)))
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.lesson_id)
        .bind(&data.title)
        .bind(data.order)
        .fetch_one(mm.executor())
        .await?;
        Ok(page)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: LessonPageCreateUpdate,
    ) -> DatabaseResult<Self> {
        let page = sqlx::query_as(
            r#"
            UPDATE pages SET title = $1, order_index = COALESCE($2, order_index), updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(data.order)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(page)
    }

    /// Deletes the page and closes the gap in the lesson's page order.
    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        let mut tx = mm.executor().begin().await?;

        sqlx::query("DELETE FROM pages WHERE id = $1")
            .bind(self.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE pages SET order_index = order_index - 1 WHERE lesson_id = $1 AND order_index > $2")
            .bind(self.lesson_id)
            .bind(self.order)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM pages WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }
}

impl LessonPage {
    pub async fn all_by_lesson(mm: &ModelManager, lesson_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM pages WHERE lesson_id = $1 ORDER BY order_index ASC")
            .bind(lesson_id)
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }
}
