use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct H5pContentCreateBody {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    /// Main library, e.g. `H5P.MultiChoice 1.16`.
    #[validate(length(min = 1, max = 255))]
    pub library: String,
    pub params: Value,
    pub metadata: Option<Value>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Default, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct H5pContentUpdateBody {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub library: Option<String>,
    pub params: Option<Value>,
    pub metadata: Option<Value>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExtendQuery {
    /// Hours added to the current expiry; defaults to the configured lifetime.
    pub hours: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub removed_files: usize,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub libraries: i64,
    pub contents: i64,
}
