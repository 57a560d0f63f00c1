use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::{
    model::entity::{QuizConfig, QuizQuestion},
    quiz::StudentQuestion,
};

fn default_passing_score() -> f64 {
    70.0
}

fn default_weight() -> f64 {
    1.0
}

fn default_points() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn empty_object() -> Value {
    json!({})
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizConfigCreateBody {
    pub page_block_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_passing_score")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub passing_score: f64,
    #[serde(default = "default_weight")]
    #[validate(range(min = 0.0))]
    pub weight: f64,
    #[validate(range(min = 1))]
    pub max_attempts: Option<i32>,
    #[validate(range(min = 1))]
    pub time_limit: Option<i32>,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default = "default_true")]
    pub show_feedback: bool,
    #[serde(default)]
    pub show_correct_answers: bool,
    #[serde(default = "default_true")]
    pub allow_review: bool,
}

#[derive(Debug, Default, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizConfigUpdateBody {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub passing_score: Option<f64>,
    #[validate(range(min = 0.0))]
    pub weight: Option<f64>,
    #[validate(range(min = 1))]
    pub max_attempts: Option<i32>,
    #[validate(range(min = 1))]
    pub time_limit: Option<i32>,
    pub shuffle_questions: Option<bool>,
    pub show_feedback: Option<bool>,
    pub show_correct_answers: Option<bool>,
    pub allow_review: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizConfigWithQuestions {
    #[serde(flatten)]
    pub config: QuizConfig,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionCreateBody {
    pub quiz_config_id: Uuid,
    #[validate(length(min = 1))]
    pub question_text: String,
    /// `multiple-choice`, `true-false`, ...
    #[validate(length(min = 1, max = 50))]
    pub question_type: String,
    #[validate(range(min = 1))]
    pub order: i32,
    #[serde(default = "default_points")]
    #[validate(range(min = 0.0))]
    pub points: f64,
    pub h5p_content_id: Option<Uuid>,
    #[serde(default = "empty_object")]
    pub metadata: Value,
}

#[derive(Debug, Default, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionUpdateBody {
    #[validate(length(min = 1))]
    pub question_text: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub question_type: Option<String>,
    #[validate(range(min = 1))]
    pub order: Option<i32>,
    #[validate(range(min = 0.0))]
    pub points: Option<f64>,
    pub h5p_content_id: Option<Uuid>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartAttemptBody {
    pub page_block_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartAttemptResponse {
    pub attempt_id: Uuid,
    pub attempt_number: i32,
    pub questions: Vec<StudentQuestion>,
    pub time_limit: Option<i32>,
    pub total_points: f64,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerBody {
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub user_answer: Value,
    #[validate(range(min = 0))]
    pub time_spent: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerResponse {
    pub response_id: Uuid,
    pub question_id: Uuid,
    pub is_correct: bool,
    pub points_earned: f64,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    pub question_id: Uuid,
    pub user_answer: Value,
    pub time_spent: Option<i32>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteAttemptBody {
    pub attempt_id: Uuid,
    #[serde(default)]
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: Uuid,
    pub question_text: String,
    pub user_answer: Option<Value>,
    pub is_correct: bool,
    pub points_earned: f64,
    pub points: f64,
    /// Only present when the quiz shows correct answers.
    pub correct_answer: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteAttemptResponse {
    pub attempt_id: Uuid,
    pub attempt_number: i32,
    pub score: f64,
    pub earned_points: f64,
    pub total_points: f64,
    pub passing_score: f64,
    pub is_pass: bool,
    /// Seconds since the attempt started.
    pub duration: i32,
    pub submitted_at: Option<DateTime<Utc>>,
    pub question_results: Vec<QuestionResult>,
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AnalyticsQuery {
    pub user_id: Option<Uuid>,
}
