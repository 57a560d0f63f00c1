use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct TtsBody {
    #[validate(length(min = 1, max = 5000))]
    pub text: String,
    pub lang: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TtsResponse {
    pub audio_url: Option<String>,
}
