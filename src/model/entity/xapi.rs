use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct XapiVerb {
    id: Uuid,
    iri: String,
    display: String,
}

impl XapiVerb {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn iri(&self) -> &str {
        &self.iri
    }

    /// Resolves a short verb name ("completed") against the stored IRIs.
    pub async fn find_by_name(mm: &ModelManager, name: &str) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM xapi_verbs WHERE iri LIKE '%/' || $1 LIMIT 1")
            .bind(name)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct XapiStatement {
    id: Uuid,
    statement_id: Uuid,
    actor_id: Uuid,
    verb_id: Uuid,
    object_id: String,
    object_type: String,
    quiz_attempt_id: Option<Uuid>,
    h5p_content_id: Option<Uuid>,
    result_score_raw: Option<f64>,
    result_score_min: Option<f64>,
    result_score_max: Option<f64>,
    result_score_scaled: Option<f64>,
    result_success: Option<bool>,
    result_completion: Option<bool>,
    result_response: Option<String>,
    result_duration: Option<String>,
    context: Option<Value>,
    stored_at: DateTime<Utc>,
}

/// Optional `result` part of a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XapiResult {
    pub score: Option<f64>,
    pub max_score: Option<f64>,
    pub success: Option<bool>,
    pub completion: Option<bool>,
    pub response: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone)]
pub struct XapiStatementCreate {
    pub actor_id: Uuid,
    pub verb_id: Uuid,
    pub object_id: String,
    pub quiz_attempt_id: Option<Uuid>,
    pub h5p_content_id: Option<Uuid>,
    pub result: XapiResult,
    pub context: Value,
}

impl ResourceTyped for XapiStatement {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::XapiStatement
    }
}

impl XapiStatement {
    pub fn verb_id(&self) -> Uuid {
        self.verb_id
    }

    pub fn result_duration(&self) -> Option<&str> {
        self.result_duration.as_deref()
    }

    pub async fn create(mm: &ModelManager, data: XapiStatementCreate) -> DatabaseResult<Self> {
        let scaled = match (data.result.score, data.result.max_score) {
            (Some(score), Some(max)) if max > 0.0 => Some(score / max),
            _ => None,
        };

        let statement = sqlx::query_as(
            r#"
            INSERT INTO xapi_statements (
                id, statement_id, actor_id, verb_id, object_id, object_type, quiz_attempt_id, h5p_content_id,
                result_score_raw, result_score_min, result_score_max, result_score_scaled,
                result_success, result_completion, result_response, result_duration, context
            )
            VALUES ($1, $2, $3, $4, $5, 'Activity', $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(Uuid::new_v4())
        .bind(data.actor_id)
        .bind(data.verb_id)
        .bind(&data.object_id)
        .bind(data.quiz_attempt_id)
        .bind(data.h5p_content_id)
        .bind(data.result.score)
        .bind(data.result.score.map(|_| 0.0_f64))
        .bind(data.result.max_score)
        .bind(scaled)
        .bind(data.result.success)
        .bind(data.result.completion)
        .bind(&data.result.response)
        .bind(&data.result.duration)
        .bind(&data.context)
        .fetch_one(mm.executor())
        .await?;
        Ok(statement)
    }

    pub async fn all_by_attempt(mm: &ModelManager, quiz_attempt_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM xapi_statements WHERE quiz_attempt_id = $1 ORDER BY stored_at ASC")
            .bind(quiz_attempt_id)
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }
}
