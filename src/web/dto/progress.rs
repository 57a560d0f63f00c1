use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::model::entity::ProgressStatus;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpsertBody {
    pub user_id: Uuid,
    pub page_block_id: Uuid,
    /// Defaults to IN_PROGRESS.
    pub status: Option<ProgressStatus>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ProgressStatusBody {
    pub status: ProgressStatus,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttemptRecordBody {
    pub student_progress_id: Uuid,
    #[validate(range(min = 0.0, max = 100.0))]
    pub score: Option<f64>,
    pub is_pass: bool,
    pub statement: Option<Value>,
}
