use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::model::entity::{LessonPage, PageBlock};

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonCreateBody {
    pub book_id: Uuid,
    pub chapter_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub order: i32,
}

#[derive(Debug, Default, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonUpdateBody {
    pub chapter_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub order: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReorderLessonsBody {
    #[validate(length(min = 1))]
    pub lesson_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageWithBlocks {
    #[serde(flatten)]
    pub page: LessonPage,
    pub blocks: Vec<PageBlock>,
}

impl PageWithBlocks {
    /// Groups `blocks` under their pages, keeping the order of both inputs.
    pub fn group(pages: Vec<LessonPage>, blocks: Vec<PageBlock>) -> Vec<Self> {
        pages
            .into_iter()
            .map(|page| {
                let blocks = blocks
                    .iter()
                    .filter(|b| b.page_id() == page.id())
                    .cloned()
                    .collect();
                Self { page, blocks }
            })
            .collect()
    }
}
