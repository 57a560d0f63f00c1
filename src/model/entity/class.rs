use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// A grade-level class ("Lớp 1" ... "Lớp 5"); grade levels are unique.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchoolClass {
    id: Uuid,
    name: String,
    grade_level: i32,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchoolClassCreateUpdate {
    pub name: String,
    pub grade_level: i32,
    pub description: Option<String>,
}

impl From<&SchoolClass> for SchoolClassCreateUpdate {
    fn from(class: &SchoolClass) -> Self {
        Self {
            name: class.name.clone(),
            grade_level: class.grade_level,
            description: class.description.clone(),
        }
    }
}

impl ResourceTyped for SchoolClass {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Class
    }
}

impl SchoolClass {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grade_level(&self) -> i32 {
        self.grade_level
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

#[async_trait]
impl CrudRepository<SchoolClass, SchoolClassCreateUpdate, Uuid> for SchoolClass {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: SchoolClassCreateUpdate,
    ) -> DatabaseResult<Self> {
        let class = sqlx::query_as(
            "INSERT INTO classes (id, name, grade_level, description) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&data.name)
        .bind(data.grade_level)
        .bind(&data.description)
        .fetch_one(mm.executor())
        .await?;

        Ok(class)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: SchoolClassCreateUpdate,
    ) -> DatabaseResult<Self> {
        let class = sqlx::query_as(
            r#"
            UPDATE classes SET name = $1, grade_level = $2, description = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(data.grade_level)
        .bind(&data.description)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;

        Ok(class)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM classes WHERE id = $1")
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
        let result = sqlx::query_as("SELECT * FROM classes WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }
}

/// Class with its member and book counts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummaryRow {
    pub id: Uuid,
    pub name: String,
    pub grade_level: i32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub member_count: i64,
    pub book_count: i64,
}

const CLASS_SUMMARY_SELECT: &str = r#"
    SELECT c.*,
        (SELECT COUNT(*) FROM class_memberships cm WHERE cm.class_id = c.id) AS member_count,
        (SELECT COUNT(*) FROM book_classes bc WHERE bc.class_id = c.id) AS book_count
    FROM classes c
"#;

impl ClassSummaryRow {
    pub async fn all(mm: &ModelManager) -> DatabaseResult<Vec<Self>> {
        let rows = sqlx::query_as(&format!("{CLASS_SUMMARY_SELECT} ORDER BY c.grade_level ASC"))
            .fetch_all(mm.executor())
            .await?;
        Ok(rows)
    }

    pub async fn find_by_id(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let row = sqlx::query_as(&format!("{CLASS_SUMMARY_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(row)
    }
}

impl SchoolClass {
    pub async fn find_by_grade(mm: &ModelManager, grade_level: i32) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM classes WHERE grade_level = $1")
            .bind(grade_level)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    /// Returns the ids from `ids` that do not name an existing class.
    pub async fn missing_ids(mm: &ModelManager, ids: &[Uuid]) -> DatabaseResult<Vec<Uuid>> {
        let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM classes WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(mm.executor())
            .await?;
        Ok(ids.iter().filter(|id| !found.contains(id)).copied().collect())
    }

    pub async fn all_by_book(mm: &ModelManager, book_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            r#"
            SELECT c.* FROM classes c
            JOIN book_classes bc ON bc.class_id = c.id
            WHERE bc.book_id = $1
            ORDER BY c.grade_level ASC
            "#,
        )
        .bind(book_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn count_books(&self, mm: &ModelManager) -> DatabaseResult<i64> {
        let result = sqlx::query_scalar("SELECT COUNT(*) FROM book_classes WHERE class_id = $1")
            .bind(self.id)
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassMembership {
    id: Uuid,
    user_id: Uuid,
    class_id: Uuid,
    joined_at: DateTime<Utc>,
}

impl ResourceTyped for ClassMembership {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::ClassMembership
    }
}

/// Membership joined with the member's public profile.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassMemberRow {
    pub id: Uuid,
    pub joined_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
}

impl ClassMembership {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn class_id(&self) -> Uuid {
        self.class_id
    }

    pub async fn create(mm: &ModelManager, class_id: Uuid, user_id: Uuid) -> DatabaseResult<Self> {
        let membership = sqlx::query_as(
            "INSERT INTO class_memberships (id, user_id, class_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(class_id)
        .fetch_one(mm.executor())
        .await?;
        Ok(membership)
    }

    pub async fn find(mm: &ModelManager, class_id: Uuid, user_id: Uuid) -> DatabaseResult<Option<Self>> {
        let membership =
            sqlx::query_as("SELECT * FROM class_memberships WHERE class_id = $1 AND user_id = $2")
                .bind(class_id)
                .bind(user_id)
                .fetch_optional(mm.executor())
                .await?;
        Ok(membership)
    }

    pub async fn delete(self, mm: &ModelManager) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM class_memberships WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    pub async fn members(mm: &ModelManager, class_id: Uuid) -> DatabaseResult<Vec<ClassMemberRow>> {
        let rows = sqlx::query_as(
            r#"
            SELECT cm.id, cm.joined_at, u.id AS user_id, u.email, u.first_name, u.last_name, u.avatar
            FROM class_memberships cm
            JOIN users u ON u.id = cm.user_id
            WHERE cm.class_id = $1
            ORDER BY u.last_name ASC NULLS LAST, u.first_name ASC NULLS LAST
            "#,
        )
        .bind(class_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(rows)
    }

    pub async fn count_members(mm: &ModelManager, class_id: Uuid) -> DatabaseResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM class_memberships WHERE class_id = $1")
            .bind(class_id)
            .fetch_one(mm.executor())
            .await?;
        Ok(count)
    }

    /// Whether `user_id` belongs to any class the book is assigned to.
    pub async fn is_member_of_book(mm: &ModelManager, user_id: Uuid, book_id: Uuid) -> DatabaseResult<bool> {
        let exists = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM class_memberships cm
                JOIN book_classes bc ON bc.class_id = cm.class_id
                WHERE cm.user_id = $1 AND bc.book_id = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(mm.executor())
        .await?;
        Ok(exists)
    }
}
