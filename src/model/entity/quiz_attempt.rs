use crate::model::access::HasOwner;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    id: Uuid,
    student_progress_id: Uuid,
    attempt_number: i32,
    score: Option<f64>,
    max_score: Option<f64>,
    is_pass: bool,
    duration: Option<i32>,
    statement: Option<Value>,
    submitted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

/// Final figures written when an attempt is submitted.
#[derive(Debug, Clone)]
pub struct QuizAttemptResult {
    pub score: f64,
    pub max_score: f64,
    pub is_pass: bool,
    pub duration: i32,
}

impl ResourceTyped for QuizAttempt {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::QuizAttempt
    }
}

#[async_trait]
impl HasOwner for QuizAttempt {
    async fn owner_id(&self, mm: &ModelManager) -> DatabaseResult<Uuid> {
        let user_id = sqlx::query_scalar("SELECT user_id FROM student_progress WHERE id = $1")
            .bind(self.student_progress_id)
            .fetch_one(mm.executor())
            .await?;
        Ok(user_id)
    }
}

impl QuizAttempt {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn student_progress_id(&self) -> Uuid {
        self.student_progress_id
    }

    pub fn attempt_number(&self) -> i32 {
        self.attempt_number
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn is_pass(&self) -> bool {
        self.is_pass
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    /// Opens a new attempt numbered after the last one of the progress record.
    pub async fn start(mm: &ModelManager, student_progress_id: Uuid) -> DatabaseResult<Self> {
        let attempt = sqlx::query_as(
            r#"
            INSERT INTO quiz_attempts (id, student_progress_id, attempt_number, is_pass)
            VALUES ($1, $2,
                (SELECT COALESCE(MAX(attempt_number), 0) + 1 FROM quiz_attempts WHERE student_progress_id = $2),
                FALSE)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_progress_id)
        .fetch_one(mm.executor())
        .await?;
        Ok(attempt)
    }

    /// Stores an attempt whose outcome was computed elsewhere (e.g. by the H5P player).
    pub async fn record(
        mm: &ModelManager,
        student_progress_id: Uuid,
        score: Option<f64>,
        is_pass: bool,
        statement: Option<Value>,
    ) -> DatabaseResult<Self> {
        let attempt = sqlx::query_as(
            r#"
            INSERT INTO quiz_attempts (id, student_progress_id, attempt_number, score, is_pass, statement, submitted_at)
            VALUES ($1, $2,
                (SELECT COALESCE(MAX(attempt_number), 0) + 1 FROM quiz_attempts WHERE student_progress_id = $2),
                $3, $4, $5, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_progress_id)
        .bind(score)
        .bind(is_pass)
        .bind(statement)
        .fetch_one(mm.executor())
        .await?;
        Ok(attempt)
    }

    pub async fn find_by_id(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM quiz_attempts WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn count_by_progress(mm: &ModelManager, student_progress_id: Uuid) -> DatabaseResult<i64> {
        let result = sqlx::query_scalar("SELECT COUNT(*) FROM quiz_attempts WHERE student_progress_id = $1")
            .bind(student_progress_id)
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn all_by_progress(mm: &ModelManager, student_progress_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM quiz_attempts WHERE student_progress_id = $1 ORDER BY attempt_number DESC",
        )
        .bind(student_progress_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    /// Attempts of `user_id` on the quiz of `page_block_id`, newest first.
    pub async fn history(mm: &ModelManager, user_id: Uuid, page_block_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            r#"
            SELECT qa.* FROM quiz_attempts qa
            JOIN student_progress sp ON sp.id = qa.student_progress_id
            WHERE sp.user_id = $1 AND sp.page_block_id = $2
            ORDER BY qa.attempt_number DESC
            "#,
        )
        .bind(user_id)
        .bind(page_block_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn submit(self, mm: &ModelManager, result: &QuizAttemptResult) -> DatabaseResult<Self> {
        let attempt = sqlx::query_as(
            r#"
            UPDATE quiz_attempts
            SET score = $1, max_score = $2, is_pass = $3, duration = $4, submitted_at = NOW()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(result.score)
        .bind(result.max_score)
        .bind(result.is_pass)
        .bind(result.duration)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(attempt)
    }
}

/// A submitted attempt joined with the student who made it.
#[derive(Debug, Clone, FromRow)]
pub struct AttemptWithStudentRow {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub attempt_number: i32,
    pub score: Option<f64>,
    pub is_pass: bool,
    pub duration: Option<i32>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl AttemptWithStudentRow {
    /// Attempts on the quiz of `page_block_id`, optionally limited to one user.
    pub async fn all_by_page_block(
        mm: &ModelManager,
        page_block_id: Uuid,
        user_id: Option<Uuid>,
    ) -> DatabaseResult<Vec<Self>> {
        let rows = sqlx::query_as(
            r#"
            SELECT u.id AS user_id, u.email, u.first_name, u.last_name,
                qa.attempt_number, qa.score, qa.is_pass, qa.duration, qa.submitted_at
            FROM quiz_attempts qa
            JOIN student_progress sp ON sp.id = qa.student_progress_id
            JOIN users u ON u.id = sp.user_id
            WHERE sp.page_block_id = $1 AND ($2::uuid IS NULL OR sp.user_id = $2)
                AND qa.submitted_at IS NOT NULL
            ORDER BY u.id, qa.attempt_number ASC
            "#,
        )
        .bind(page_block_id)
        .bind(user_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(rows)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    id: Uuid,
    quiz_attempt_id: Uuid,
    question_id: Uuid,
    user_answer: Value,
    is_correct: bool,
    points_earned: f64,
    time_spent: i32,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct QuestionResponseCreate {
    pub quiz_attempt_id: Uuid,
    pub question_id: Uuid,
    pub user_answer: Value,
    pub is_correct: bool,
    pub points_earned: f64,
    pub time_spent: i32,
}

impl ResourceTyped for QuestionResponse {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::QuestionResponse
    }
}

impl QuestionResponse {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn question_id(&self) -> Uuid {
        self.question_id
    }

    pub fn user_answer(&self) -> &Value {
        &self.user_answer
    }

    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    pub fn points_earned(&self) -> f64 {
        self.points_earned
    }

    pub fn time_spent(&self) -> i32 {
        self.time_spent
    }

    pub async fn create(mm: &ModelManager, data: QuestionResponseCreate) -> DatabaseResult<Self> {
        let response = sqlx::query_as(
            r#"
            INSERT INTO question_responses (id, quiz_attempt_id, question_id, user_answer, is_correct, points_earned, time_spent)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.quiz_attempt_id)
        .bind(data.question_id)
        .bind(&data.user_answer)
        .bind(data.is_correct)
        .bind(data.points_earned)
        .bind(data.time_spent)
        .fetch_one(mm.executor())
        .await?;
        Ok(response)
    }

    pub async fn all_by_attempt(mm: &ModelManager, quiz_attempt_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM question_responses WHERE quiz_attempt_id = $1 ORDER BY created_at ASC")
            .bind(quiz_attempt_id)
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn all_by_quiz_config(mm: &ModelManager, quiz_config_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            r#"
            SELECT r.* FROM question_responses r
            JOIN quiz_questions q ON q.id = r.question_id
            WHERE q.quiz_config_id = $1
            "#,
        )
        .bind(quiz_config_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }
}
