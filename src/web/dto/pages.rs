use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::model::entity::BlockContentInput;

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageCreateBody {
    pub lesson_id: Uuid,
    #[validate(length(max = 255))]
    pub title: Option<String>,
    #[validate(range(min = 1))]
    pub order: Option<i32>,
}

#[derive(Debug, Default, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageUpdateBody {
    #[validate(length(max = 255))]
    pub title: Option<String>,
    #[validate(range(min = 1))]
    pub order: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageBlockCreateBody {
    pub page_id: Uuid,
    /// TEXT, VIDEO, H5P or QUIZ.
    pub block_type: String,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    pub text_content: Option<String>,
    pub video_url: Option<String>,
    pub h5p_content_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub order: Option<i32>,
}

impl PageBlockCreateBody {
    pub fn content_input(&self) -> BlockContentInput<'_> {
        BlockContentInput {
            text: self.text_content.as_deref(),
            video_url: self.video_url.as_deref(),
            h5p_content_id: self.h5p_content_id,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageBlockUpdateBody {
    pub block_type: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub text_content: Option<String>,
    pub video_url: Option<String>,
    pub h5p_content_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub order: Option<i32>,
}

impl PageBlockUpdateBody {
    /// Whether the stored content has to be rebuilt.
    pub fn changes_content(&self) -> bool {
        self.block_type.is_some()
            || self.text_content.is_some()
            || self.video_url.is_some()
            || self.h5p_content_id.is_some()
    }
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReorderBlocksBody {
    #[validate(length(min = 1))]
    pub block_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BlockStatisticsQuery {
    pub page_id: Option<Uuid>,
}
