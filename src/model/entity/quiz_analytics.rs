use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// Stored aggregate of the attempts on one quiz, for everybody (`user_id = NULL`) or one user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnalytics {
    id: Uuid,
    page_block_id: Uuid,
    user_id: Option<Uuid>,
    total_attempts: i32,
    average_score: f64,
    highest_score: f64,
    lowest_score: f64,
    pass_rate: f64,
    average_time_spent: Option<f64>,
    last_calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizAnalyticsUpsert {
    pub total_attempts: i32,
    pub average_score: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
    pub pass_rate: f64,
    pub average_time_spent: Option<f64>,
}

impl ResourceTyped for QuizAnalytics {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::QuizAnalytics
    }
}

impl QuizAnalytics {
    pub fn total_attempts(&self) -> i32 {
        self.total_attempts
    }

    pub async fn find(mm: &ModelManager, page_block_id: Uuid, user_id: Option<Uuid>) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM quiz_analytics WHERE page_block_id = $1 AND user_id IS NOT DISTINCT FROM $2",
        )
        .bind(page_block_id)
        .bind(user_id)
        .fetch_optional(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn upsert(
        mm: &ModelManager,
        page_block_id: Uuid,
        user_id: Option<Uuid>,
        data: &QuizAnalyticsUpsert,
    ) -> DatabaseResult<Self> {
        let analytics = sqlx::query_as(
            r#"
            INSERT INTO quiz_analytics (
                id, page_block_id, user_id, total_attempts, average_score, highest_score,
                lowest_score, pass_rate, average_time_spent
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (page_block_id, COALESCE(user_id, '00000000-0000-0000-0000-000000000000'::uuid))
            DO UPDATE SET
                total_attempts = EXCLUDED.total_attempts,
                average_score = EXCLUDED.average_score,
                highest_score = EXCLUDED.highest_score,
                lowest_score = EXCLUDED.lowest_score,
                pass_rate = EXCLUDED.pass_rate,
                average_time_spent = EXCLUDED.average_time_spent,
                last_calculated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(page_block_id)
        .bind(user_id)
        .bind(data.total_attempts)
        .bind(data.average_score)
        .bind(data.highest_score)
        .bind(data.lowest_score)
        .bind(data.pass_rate)
        .bind(data.average_time_spent)
        .fetch_one(mm.executor())
        .await?;
        Ok(analytics)
    }
}
