use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// One question of a quiz. The answer key lives in `metadata`:
/// `options[].isCorrect` for multiple choice, `correctAnswer` for true/false.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    id: Uuid,
    quiz_config_id: Uuid,
    question_text: String,
    question_type: String,
    #[sqlx(rename = "order_index")]
    order: i32,
    points: f64,
    h5p_content_id: Option<Uuid>,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct QuizQuestionCreateUpdate {
    pub quiz_config_id: Uuid,
    pub question_text: String,
    pub question_type: String,
    pub order: i32,
    pub points: f64,
    pub h5p_content_id: Option<Uuid>,
    pub metadata: Value,
}

impl From<&QuizQuestion> for QuizQuestionCreateUpdate {
    fn from(question: &QuizQuestion) -> Self {
        Self {
            quiz_config_id: question.quiz_config_id,
            question_text: question.question_text.clone(),
            question_type: question.question_type.clone(),
            order: question.order,
            points: question.points,
            h5p_content_id: question.h5p_content_id,
            metadata: question.metadata.clone(),
        }
    }
}

impl ResourceTyped for QuizQuestion {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::QuizQuestion
    }
}

impl QuizQuestion {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn quiz_config_id(&self) -> Uuid {
        self.quiz_config_id
    }

    pub fn question_text(&self) -> &str {
        &self.question_text
    }

    pub fn question_type(&self) -> &str {
        &self.question_type
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn points(&self) -> f64 {
        self.points
    }

    pub fn h5p_content_id(&self) -> Option<Uuid> {
        self.h5p_content_id
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }
}

#[async_trait]
impl CrudRepository<QuizQuestion, QuizQuestionCreateUpdate, Uuid> for QuizQuestion {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: QuizQuestionCreateUpdate,
    ) -> DatabaseResult<Self> {
        let question = sqlx::query_as(
            r#"
            INSERT INTO quiz_questions (id, quiz_config_id, question_text, question_type, order_index, points, h5p_content_id, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.quiz_config_id)
        .bind(&data.question_text)
        .bind(&data.question_type)
        .bind(data.order)
        .bind(data.points)
        .bind(data.h5p_content_id)
        .bind(&data.metadata)
        .fetch_one(mm.executor())
        .await?;
        Ok(question)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: QuizQuestionCreateUpdate,
    ) -> DatabaseResult<Self> {
        let question = sqlx::query_as(
            r#"
            UPDATE quiz_questions
            SET question_text = $1, question_type = $2, order_index = $3, points = $4,
                h5p_content_id = $5, metadata = $6, updated_at = NOW()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(&data.question_text)
        .bind(&data.question_type)
        .bind(data.order)
        .bind(data.points)
        .bind(data.h5p_content_id)
        .bind(&data.metadata)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(question)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM quiz_questions WHERE id = $1")
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
        let result = sqlx::query_as("SELECT * FROM quiz_questions WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }
}

impl QuizQuestion {
    pub async fn all_by_quiz_config(mm: &ModelManager, quiz_config_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM quiz_questions WHERE quiz_config_id = $1 ORDER BY order_index ASC")
            .bind(quiz_config_id)
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }
}
