use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// Quiz settings attached to a QUIZ page block (at most one per block).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizConfig {
    id: Uuid,
    page_block_id: Uuid,
    title: String,
    description: Option<String>,
    passing_score: f64,
    weight: f64,
    max_attempts: Option<i32>,
    time_limit: Option<i32>,
    shuffle_questions: bool,
    show_feedback: bool,
    show_correct_answers: bool,
    allow_review: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct QuizConfigCreateUpdate {
    pub page_block_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub passing_score: f64,
    pub weight: f64,
    pub max_attempts: Option<i32>,
    pub time_limit: Option<i32>,
    pub shuffle_questions: bool,
    pub show_feedback: bool,
    pub show_correct_answers: bool,
    pub allow_review: bool,
}

impl From<&QuizConfig> for QuizConfigCreateUpdate {
    fn from(config: &QuizConfig) -> Self {
        Self {
            page_block_id: config.page_block_id,
            title: config.title.clone(),
            description: config.description.clone(),
            passing_score: config.passing_score,
            weight: config.weight,
            max_attempts: config.max_attempts,
            time_limit: config.time_limit,
            shuffle_questions: config.shuffle_questions,
            show_feedback: config.show_feedback,
            show_correct_answers: config.show_correct_answers,
            allow_review: config.allow_review,
        }
    }
}

impl ResourceTyped for QuizConfig {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::QuizConfig
    }
}

impl QuizConfig {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn page_block_id(&self) -> Uuid {
        self.page_block_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn passing_score(&self) -> f64 {
        self.passing_score
    }

    pub fn max_attempts(&self) -> Option<i32> {
        self.max_attempts
    }

    pub fn time_limit(&self) -> Option<i32> {
        self.time_limit
    }

    pub fn shuffle_questions(&self) -> bool {
        self.shuffle_questions
    }

    pub fn show_correct_answers(&self) -> bool {
        self.show_correct_answers
    }
}

#[async_trait]
impl CrudRepository<QuizConfig, QuizConfigCreateUpdate, Uuid> for QuizConfig {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: QuizConfigCreateUpdate,
    ) -> DatabaseResult<Self> {
        let config = sqlx::query_as(
            r#"
            INSERT INTO quiz_configs (
                id, page_block_id, title, description, passing_score, weight, max_attempts, time_limit,
                shuffle_questions, show_feedback, show_correct_answers, allow_review
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.page_block_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.passing_score)
        .bind(data.weight)
        .bind(data.max_attempts)
        .bind(data.time_limit)
        .bind(data.shuffle_questions)
        .bind(data.show_feedback)
        .bind(data.show_correct_answers)
        .bind(data.allow_review)
        .fetch_one(mm.executor())
        .await?;
        Ok(config)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: QuizConfigCreateUpdate,
    ) -> DatabaseResult<Self> {
        let config = sqlx::query_as(
            r#"
            UPDATE quiz_configs
            SET title = $1, description = $2, passing_score = $3, weight = $4, max_attempts = $5,
                time_limit = $6, shuffle_questions = $7, show_feedback = $8, show_correct_answers = $9,
                allow_review = $10, updated_at = NOW()
            WHERE id = $11
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.passing_score)
        .bind(data.weight)
        .bind(data.max_attempts)
        .bind(data.time_limit)
        .bind(data.shuffle_questions)
        .bind(data.show_feedback)
        .bind(data.show_correct_answers)
        .bind(data.allow_review)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(config)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM quiz_configs WHERE id = $1")
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
        let result = sqlx::query_as("SELECT * FROM quiz_configs WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }
}

impl QuizConfig {
    pub async fn find_by_page_block(mm: &ModelManager, page_block_id: Uuid) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM quiz_configs WHERE page_block_id = $1")
            .bind(page_block_id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }
}
