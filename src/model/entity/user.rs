use crate::model::repo::ResourceTyped;
use crate::web::AuthenticatedUser;
use crate::web::UserRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository, repo::PaginatableRepository};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    id: uuid::Uuid,
    email: String,
    #[serde(skip)]
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    role: String,
    is_active: bool,
    avatar: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserEntityCreateUpdate {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub avatar: Option<String>,
}

impl UserEntityCreateUpdate {
    pub fn student(email: String, password_hash: String) -> Self {
        Self {
            email,
            password_hash,
            first_name: None,
            last_name: None,
            role: UserRole::Student,
            is_active: true,
            avatar: None,
        }
    }
}

impl From<&UserEntity> for UserEntityCreateUpdate {
    fn from(user: &UserEntity) -> Self {
        Self {
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role(),
            is_active: user.is_active,
            avatar: user.avatar.clone(),
        }
    }
}

impl ResourceTyped for UserEntity {
    fn get_resource_type() -> crate::model::repo::ResourceType {
        crate::model::repo::ResourceType::User
    }
}

impl UserEntity {
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn hash(&self) -> &str {
        &self.password_hash
    }

    pub fn first_name(&self) -> Option<&str> {
        self.first_name.as_deref()
    }

    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    /// "First Last", falling back to the email.
    pub fn full_name(&self) -> String {
        let name = [self.first_name(), self.last_name()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.email.clone()
        } else {
            name
        }
    }

    pub fn role(&self) -> UserRole {
        UserRole::from(self.role.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }
}

#[async_trait::async_trait]
impl CrudRepository<UserEntity, UserEntityCreateUpdate, uuid::Uuid> for UserEntity {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: UserEntityCreateUpdate,
    ) -> DatabaseResult<Self> {
        let user = sqlx::query_as(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, role, is_active, avatar)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.email.to_lowercase())
        .bind(&data.password_hash)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(data.role.as_str())
        .bind(data.is_active)
        .bind(&data.avatar)
        .fetch_one(mm.executor())
        .await?;

        Ok(user)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: UserEntityCreateUpdate,
    ) -> DatabaseResult<Self> {
        let user = sqlx::query_as(
            r#"
            UPDATE users
            SET first_name = $1, last_name = $2, role = $3, is_active = $4, avatar = $5,
                email = $6, updated_at = NOW()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(data.role.as_str())
        .bind(data.is_active)
        .bind(&data.avatar)
        .bind(data.email.to_lowercase())
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;

        Ok(user)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: uuid::Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }
}

#[async_trait::async_trait]
impl PaginatableRepository<UserEntity> for UserEntity {
    async fn list(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(mm.executor())
            .await?;

        Ok(result)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserStatsRow {
    pub progress_records: i64,
    pub completed_records: i64,
    pub quiz_attempts: i64,
    pub tracking_events: i64,
    pub h5p_contents: i64,
}

impl UserEntity {
    pub async fn find_by_email(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        email: &str,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email.to_lowercase())
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn all_by_role(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        role: UserRole,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM users WHERE role = $1 ORDER BY last_name ASC NULLS LAST, first_name ASC NULLS LAST",
        )
        .bind(role.as_str())
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    /// Active students that are not members of `class_id`.
    pub async fn available_students(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        class_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            r#"
            SELECT u.* FROM users u
            WHERE u.role = 'STUDENT'
              AND u.is_active = TRUE
              AND NOT EXISTS (
                  SELECT 1 FROM class_memberships cm
                  WHERE cm.user_id = u.id AND cm.class_id = $1
              )
            ORDER BY u.last_name ASC NULLS LAST, u.first_name ASC NULLS LAST
            "#,
        )
        .bind(class_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn stats(&self, mm: &ModelManager) -> DatabaseResult<UserStatsRow> {
        let row = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM student_progress WHERE user_id = $1) AS progress_records,
                (SELECT COUNT(*) FROM student_progress WHERE user_id = $1 AND status = 'COMPLETED') AS completed_records,
                (SELECT COUNT(*) FROM quiz_attempts qa
                    JOIN student_progress sp ON sp.id = qa.student_progress_id
                    WHERE sp.user_id = $1) AS quiz_attempts,
                (SELECT COUNT(*) FROM tracking_events WHERE user_id = $1) AS tracking_events,
                (SELECT COUNT(*) FROM h5p_contents WHERE uploader_id = $1) AS h5p_contents
            "#,
        )
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(row)
    }

    pub async fn set_password(&mut self, mm: &ModelManager, password_hash: String) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(&password_hash)
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        self.password_hash = password_hash;
        Ok(())
    }
}
