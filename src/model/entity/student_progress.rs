use std::collections::BTreeMap;

use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder, prelude::FromRow};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NOT_STARTED" => Some(Self::NotStarted),
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETED" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Progress of one user on one page block.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgress {
    id: Uuid,
    user_id: Uuid,
    page_block_id: Uuid,
    status: String,
    completed_at: Option<DateTime<Utc>>,
    last_accessed: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ResourceTyped for StudentProgress {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::StudentProgress
    }
}

impl StudentProgress {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn page_block_id(&self) -> Uuid {
        self.page_block_id
    }

    pub fn status(&self) -> ProgressStatus {
        ProgressStatus::parse(&self.status).unwrap_or(ProgressStatus::NotStarted)
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Creates or updates the record of (user, block). COMPLETED stamps `completed_at`,
    /// any other status leaves an earlier stamp in place.
    pub async fn upsert(
        mm: &ModelManager,
        user_id: Uuid,
        page_block_id: Uuid,
        status: ProgressStatus,
    ) -> DatabaseResult<Self> {
        let progress = sqlx::query_as(
            r#"
            INSERT INTO student_progress (id, user_id, page_block_id, status, completed_at, last_accessed)
            VALUES ($1, $2, $3, $4, CASE WHEN $4 = 'COMPLETED' THEN NOW() END, NOW())
            ON CONFLICT (user_id, page_block_id) DO UPDATE SET
                status = EXCLUDED.status,
                completed_at = COALESCE(EXCLUDED.completed_at, student_progress.completed_at),
                last_accessed = NOW(),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(page_block_id)
        .bind(status.as_str())
        .fetch_one(mm.executor())
        .await?;
        Ok(progress)
    }

    pub async fn set_status(self, mm: &ModelManager, status: ProgressStatus) -> DatabaseResult<Self> {
        let progress = sqlx::query_as(
            r#"
            UPDATE student_progress
            SET status = $1,
                completed_at = CASE WHEN $1 = 'COMPLETED' THEN NOW() ELSE completed_at END,
                last_accessed = NOW(),
                updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(status.as_str())
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(progress)
    }

    /// Result of a submitted quiz attempt: a pass completes the block, a fail reopens it.
    pub async fn record_quiz_outcome(self, mm: &ModelManager, passed: bool) -> DatabaseResult<Self> {
        let status = if passed {
            ProgressStatus::Completed
        } else {
            ProgressStatus::InProgress
        };
        let progress = sqlx::query_as(
            r#"
            UPDATE student_progress
            SET status = $1,
                completed_at = CASE WHEN $2 THEN NOW() END,
                last_accessed = NOW(),
                updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(status.as_str())
        .bind(passed)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(progress)
    }

    pub async fn find_by_id(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM student_progress WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn find(mm: &ModelManager, user_id: Uuid, page_block_id: Uuid) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM student_progress WHERE user_id = $1 AND page_block_id = $2")
            .bind(user_id)
            .bind(page_block_id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn delete(self, mm: &ModelManager) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM student_progress WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }
}

/// Progress joined with the block, page and lesson it refers to.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDetailRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub page_block_id: Uuid,
    pub status: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_accessed: DateTime<Utc>,
    pub block_title: String,
    pub block_type: String,
    pub page_id: Uuid,
    pub lesson_id: Uuid,
    pub lesson_title: String,
}

impl ProgressDetailRow {
    pub async fn all_by_user(mm: &ModelManager, user_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let rows = sqlx::query_as(
            r#"
            SELECT sp.id, sp.user_id, sp.page_block_id, sp.status, sp.completed_at, sp.last_accessed,
                pb.title AS block_title, pb.block_type, p.id AS page_id, l.id AS lesson_id, l.title AS lesson_title
            FROM student_progress sp
            JOIN page_blocks pb ON pb.id = sp.page_block_id
            JOIN pages p ON p.id = pb.page_id
            JOIN lessons l ON l.id = p.lesson_id
            WHERE sp.user_id = $1
            ORDER BY sp.last_accessed DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(rows)
    }
}

/// Progress on a lesson's blocks with the student and their latest attempt.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgressRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub page_block_id: Uuid,
    pub block_title: String,
    pub block_order: i32,
    pub status: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_accessed: DateTime<Utc>,
    pub latest_attempt_id: Option<Uuid>,
    pub latest_attempt_number: Option<i32>,
    pub latest_score: Option<f64>,
    pub latest_is_pass: Option<bool>,
    pub latest_submitted_at: Option<DateTime<Utc>>,
}

impl LessonProgressRow {
    pub async fn all_by_lesson(mm: &ModelManager, lesson_id: Uuid, user_id: Option<Uuid>) -> DatabaseResult<Vec<Self>> {
        let rows = sqlx::query_as(
            r#"
            SELECT sp.id, u.id AS user_id, u.email, u.first_name, u.last_name,
                pb.id AS page_block_id, pb.title AS block_title, pb.order_index AS block_order,
                sp.status, sp.completed_at, sp.last_accessed,
                qa.id AS latest_attempt_id, qa.attempt_number AS latest_attempt_number,
                qa.score AS latest_score, qa.is_pass AS latest_is_pass, qa.submitted_at AS latest_submitted_at
            FROM student_progress sp
            JOIN users u ON u.id = sp.user_id
            JOIN page_blocks pb ON pb.id = sp.page_block_id
            JOIN pages p ON p.id = pb.page_id
            LEFT JOIN LATERAL (
                SELECT * FROM quiz_attempts
                WHERE student_progress_id = sp.id
                ORDER BY submitted_at DESC NULLS LAST, attempt_number DESC
                LIMIT 1
            ) qa ON TRUE
            WHERE p.lesson_id = $1 AND ($2::uuid IS NULL OR sp.user_id = $2)
            ORDER BY p.order_index ASC, pb.order_index ASC, u.last_name ASC NULLS LAST
            "#,
        )
        .bind(lesson_id)
        .bind(user_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(rows)
    }
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProgressSummaryFilter {
    pub user_id: Option<Uuid>,
    pub lesson_id: Option<Uuid>,
    pub book_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub total_progress: i64,
    pub progress_by_status: BTreeMap<String, i64>,
    pub completion_rate: f64,
}

impl ProgressSummary {
    pub fn from_counts(counts: Vec<(String, i64)>) -> Self {
        let total_progress = counts.iter().map(|(_, n)| n).sum::<i64>();
        let progress_by_status: BTreeMap<String, i64> = counts.into_iter().collect();
        let completed = progress_by_status
            .get(ProgressStatus::Completed.as_str())
            .copied()
            .unwrap_or(0);
        let completion_rate = if total_progress > 0 {
            completed as f64 / total_progress as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_progress,
            progress_by_status,
            completion_rate,
        }
    }

    /// Lesson wins over book, book over class.
    pub async fn compute(mm: &ModelManager, filter: &ProgressSummaryFilter) -> DatabaseResult<Self> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT sp.status, COUNT(*) FROM student_progress sp
            JOIN page_blocks pb ON pb.id = sp.page_block_id
            JOIN pages p ON p.id = pb.page_id
            JOIN lessons l ON l.id = p.lesson_id
            WHERE TRUE
            "#,
        );

        if let Some(user_id) = filter.user_id {
            query.push(" AND sp.user_id = ").push_bind(user_id);
        }
        if let Some(lesson_id) = filter.lesson_id {
            query.push(" AND l.id = ").push_bind(lesson_id);
        } else if let Some(book_id) = filter.book_id {
            query.push(" AND l.book_id = ").push_bind(book_id);
        } else if let Some(class_id) = filter.class_id {
            query
                .push(" AND l.book_id IN (SELECT book_id FROM book_classes WHERE class_id = ")
                .push_bind(class_id)
                .push(")");
        }
        query.push(" GROUP BY sp.status");

        let counts: Vec<(String, i64)> = query.build_query_as().fetch_all(mm.executor()).await?;
        Ok(Self::from_counts(counts))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn summary_completion_rate() {
        let summary = ProgressSummary::from_counts(vec![
            ("COMPLETED".to_string(), 3),
            ("IN_PROGRESS".to_string(), 1),
        ]);
        assert_eq!(summary.total_progress, 4);
        assert_eq!(summary.progress_by_status.get("COMPLETED"), Some(&3));
        assert!((summary.completion_rate - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_summary_has_zero_rate() {
        let summary = ProgressSummary::from_counts(Vec::new());
        assert_eq!(summary.total_progress, 0);
        assert_eq!(summary.completion_rate, 0.0);
    }

    #[test]
    fn status_column_values() {
        assert_eq!(ProgressStatus::parse("IN_PROGRESS"), Some(ProgressStatus::InProgress));
        assert_eq!(ProgressStatus::Completed.as_str(), "COMPLETED");
        assert_eq!(
            serde_json::to_string(&ProgressStatus::NotStarted).unwrap(),
            "\"NOT_STARTED\""
        );
    }
}
