use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder, prelude::FromRow};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    id: Uuid,
    book_id: Uuid,
    chapter_id: Option<Uuid>,
    title: String,
    description: Option<String>,
    #[sqlx(rename = "order_index")]
    order: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LessonCreateUpdate {
    pub book_id: Uuid,
    pub chapter_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub order: i32,
}

impl From<&Lesson> for LessonCreateUpdate {
    fn from(lesson: &Lesson) -> Self {
        Self {
            book_id: lesson.book_id,
            chapter_id: lesson.chapter_id,
            title: lesson.title.clone(),
            description: lesson.description.clone(),
            order: lesson.order,
        }
    }
}

/// Filters of the lesson search.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LessonFilter {
    pub keyword: Option<String>,
    pub book_id: Option<Uuid>,
    pub chapter_id: Option<Uuid>,
}

impl ResourceTyped for Lesson {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Lesson
    }
}

impl Lesson {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn book_id(&self) -> Uuid {
        self.book_id
    }

    pub fn chapter_id(&self) -> Option<Uuid> {
        self.chapter_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn order(&self) -> i32 {
        self.order
    }
}

#[async_trait]
impl CrudRepository<Lesson, LessonCreateUpdate, Uuid> for Lesson {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: LessonCreateUpdate,
    ) -> DatabaseResult<Self> {
        let lesson = sqlx::query_as(
            r#"
            INSERT INTO lessons (id, book_id, chapter_id, title, description, order_index)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.book_id)
        .bind(data.chapter_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.order)
        .fetch_one(mm.executor())
        .await?;
        Ok(lesson)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: LessonCreateUpdate,
    ) -> DatabaseResult<Self> {
        let lesson = sqlx::query_as(
            r#"
            UPDATE lessons
            SET chapter_id = $1, title = $2, description = $3, order_index = $4, updated_at = NOW()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(data.chapter_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.order)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(lesson)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM lessons WHERE id = $1")
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
        let result = sqlx::query_as("SELECT * FROM lessons WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }
}

/// Neighbours of a lesson inside its chapter (or among the chapterless lessons of its book).
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonNavigation {
    pub current: Lesson,
    pub previous: Option<Lesson>,
    pub next: Option<Lesson>,
    pub scope_title: String,
    pub total_lessons: usize,
}

impl Lesson {
    /// Whether another lesson of the same scope already uses `order`.
    pub async fn order_taken(
        mm: &ModelManager,
        book_id: Uuid,
        chapter_id: Option<Uuid>,
        order: i32,
        except: Option<Uuid>,
    ) -> DatabaseResult<bool> {
        let taken = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM lessons
                WHERE order_index = $1
                  AND ($2::uuid IS NULL AND chapter_id IS NULL AND book_id = $3
                       OR chapter_id = $2)
                  AND ($4::uuid IS NULL OR id <> $4)
            )
            "#,
        )
        .bind(order)
        .bind(chapter_id)
        .bind(book_id)
        .bind(except)
        .fetch_one(mm.executor())
        .await?;
        Ok(taken)
    }

    pub async fn all_by_book(mm: &ModelManager, book_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            r#"
            SELECT l.* FROM lessons l
            LEFT JOIN chapters c ON c.id = l.chapter_id
            WHERE l.book_id = $1
            ORDER BY c.order_index ASC NULLS LAST, l.order_index ASC
            "#,
        )
        .bind(book_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn all_by_chapter(mm: &ModelManager, chapter_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM lessons WHERE chapter_id = $1 ORDER BY order_index ASC")
            .bind(chapter_id)
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn all_without_chapter(mm: &ModelManager, book_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM lessons WHERE book_id = $1 AND chapter_id IS NULL ORDER BY order_index ASC",
        )
        .bind(book_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn search(mm: &ModelManager, filter: &LessonFilter) -> DatabaseResult<Vec<Self>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM lessons WHERE TRUE");

        if let Some(keyword) = filter.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
            let pattern = format!("%{}%", keyword.trim());
            query
                .push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(book_id) = filter.book_id {
            query.push(" AND book_id = ").push_bind(book_id);
        }
        if let Some(chapter_id) = filter.chapter_id {
            query.push(" AND chapter_id = ").push_bind(chapter_id);
        }
        query.push(" ORDER BY book_id, order_index ASC");

        let lessons = query.build_query_as().fetch_all(mm.executor()).await?;
        Ok(lessons)
    }

    pub async fn count_pages(&self, mm: &ModelManager) -> DatabaseResult<i64> {
        let result = sqlx::query_scalar("SELECT COUNT(*) FROM pages WHERE lesson_id = $1")
            .bind(self.id)
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn navigation(self, mm: &ModelManager) -> DatabaseResult<LessonNavigation> {
        let (siblings, scope_title) = match self.chapter_id {
            Some(chapter_id) => {
                let title: Option<String> = sqlx::query_scalar("SELECT title FROM chapters WHERE id = $1")
                    .bind(chapter_id)
                    .fetch_optional(mm.executor())
                    .await?;
                (Self::all_by_chapter(mm, chapter_id).await?, title.unwrap_or_default())
            }
            None => {
                let title: Option<String> = sqlx::query_scalar("SELECT title FROM books WHERE id = $1")
                    .bind(self.book_id)
                    .fetch_optional(mm.executor())
                    .await?;
                (Self::all_without_chapter(mm, self.book_id).await?, title.unwrap_or_default())
            }
        };

        let position = siblings.iter().position(|l| l.id == self.id);
        let previous = position
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| siblings.get(i))
            .cloned();
        let next = position.and_then(|i| siblings.get(i + 1)).cloned();

        Ok(LessonNavigation {
            total_lessons: siblings.len(),
            current: self,
            previous,
            next,
            scope_title,
        })
    }

    /// Sets `order_index = position + 1` for every id; returns the ids that do not exist.
    pub async fn reorder(mm: &ModelManager, lesson_ids: &[Uuid]) -> DatabaseResult<Vec<Uuid>> {
        let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM lessons WHERE id = ANY($1)")
            .bind(lesson_ids)
            .fetch_all(mm.executor())
            .await?;
        let missing: Vec<Uuid> = lesson_ids
            .iter()
            .filter(|id| !found.contains(id))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Ok(missing);
        }

        let mut tx = mm.executor().begin().await?;
        for (index, id) in lesson_ids.iter().enumerate() {
            sqlx::query("UPDATE lessons SET order_index = $1, updated_at = NOW() WHERE id = $2")
                .bind(index as i32 + 1)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(Vec::new())
    }
}
