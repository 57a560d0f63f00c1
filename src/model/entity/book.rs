use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Postgres, prelude::FromRow};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    id: Uuid,
    title: String,
    subject: String,
    grade: i32,
    description: Option<String>,
    cover_image: Option<String>,
    publisher: Option<String>,
    is_published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BookCreateUpdate {
    pub title: String,
    pub subject: String,
    pub grade: i32,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub publisher: Option<String>,
    pub is_published: bool,
    /// `None` keeps the current class links.
    pub class_ids: Option<Vec<Uuid>>,
}

impl From<&Book> for BookCreateUpdate {
    fn from(book: &Book) -> Self {
        Self {
            title: book.title.clone(),
            subject: book.subject.clone(),
            grade: book.grade,
            description: book.description.clone(),
            cover_image: book.cover_image.clone(),
            publisher: book.publisher.clone(),
            is_published: book.is_published,
            class_ids: None,
        }
    }
}

/// Filters of the book listing.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BookFilter {
    pub search: Option<String>,
    pub subject: Option<String>,
    pub grade: Option<i32>,
    pub is_published: Option<bool>,
    pub class_id: Option<Uuid>,
}

impl ResourceTyped for Book {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Book
    }
}

impl Book {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn grade(&self) -> i32 {
        self.grade
    }

    pub fn is_published(&self) -> bool {
        self.is_published
    }
}

async fn replace_classes(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    book_id: Uuid,
    class_ids: &[Uuid],
) -> DatabaseResult<()> {
    sqlx::query("DELETE FROM book_classes WHERE book_id = $1")
        .bind(book_id)
        .execute(&mut **tx)
        .await?;

    for class_id in class_ids {
        sqlx::query("INSERT INTO book_classes (book_id, class_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(book_id)
            .bind(class_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl CrudRepository<Book, BookCreateUpdate, Uuid> for Book {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: BookCreateUpdate,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.executor().begin().await?;

        let book: Book = sqlx::query_as(
            r#"
            INSERT INTO books (id, title, subject, grade, description, cover_image, publisher, is_published)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.title)
        .bind(&data.subject)
        .bind(data.grade)
        .bind(&data.description)
        .bind(&data.cover_image)
        .bind(&data.publisher)
        .bind(data.is_published)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(class_ids) = &data.class_ids {
            replace_classes(&mut tx, book.id, class_ids).await?;
        }

        tx.commit().await?;
        Ok(book)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: BookCreateUpdate,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.executor().begin().await?;

        let book: Book = sqlx::query_as(
            r#"
            UPDATE books
            SET title = $1, subject = $2, grade = $3, description = $4, cover_image = $5,
                publisher = $6, is_published = $7, updated_at = NOW()
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(&data.subject)
        .bind(data.grade)
        .bind(&data.description)
        .bind(&data.cover_image)
        .bind(&data.publisher)
        .bind(data.is_published)
        .bind(self.id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(class_ids) = &data.class_ids {
            replace_classes(&mut tx, book.id, class_ids).await?;
        }

        tx.commit().await?;
        Ok(book)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM books WHERE id = $1")
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
        let result = sqlx::query_as("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }
}

impl Book {
    pub async fn search(mm: &ModelManager, filter: &BookFilter) -> DatabaseResult<Vec<Self>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT b.* FROM books b WHERE TRUE");

        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim());
            query
                .push(" AND (b.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR b.description ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR b.subject ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR b.publisher ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(subject) = &filter.subject {
            query.push(" AND b.subject = ").push_bind(subject.clone());
        }
        if let Some(grade) = filter.grade {
            query.push(" AND b.grade = ").push_bind(grade);
        }
        if let Some(is_published) = filter.is_published {
            query.push(" AND b.is_published = ").push_bind(is_published);
        }
        if let Some(class_id) = filter.class_id {
            query
                .push(" AND EXISTS (SELECT 1 FROM book_classes bc WHERE bc.book_id = b.id AND bc.class_id = ")
                .push_bind(class_id)
                .push(")");
        }
        query.push(" ORDER BY b.grade ASC, b.subject ASC, b.created_at DESC");

        let books = query.build_query_as().fetch_all(mm.executor()).await?;
        Ok(books)
    }

    pub async fn toggle_publish(self, mm: &ModelManager) -> DatabaseResult<Self> {
        let book = sqlx::query_as(
            "UPDATE books SET is_published = NOT is_published, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(book)
    }

    pub async fn count_children(&self, mm: &ModelManager) -> DatabaseResult<(i64, i64)> {
        let counts = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM chapters WHERE book_id = $1),
                (SELECT COUNT(*) FROM lessons WHERE book_id = $1)
            "#,
        )
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(counts)
    }
}
