use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::model::entity::{Book, Chapter, Lesson, SchoolClass};

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookCreateBody {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[validate(range(min = 1, max = 12))]
    pub grade: i32,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub publisher: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub class_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookUpdateBody {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub subject: Option<String>,
    #[validate(range(min = 1, max = 12))]
    pub grade: Option<i32>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub publisher: Option<String>,
    pub is_published: Option<bool>,
    /// Replaces the linked classes when present.
    pub class_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookDetailResponse {
    #[serde(flatten)]
    pub book: Book,
    pub classes: Vec<SchoolClass>,
    pub chapter_count: i64,
    pub lesson_count: i64,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChapterWithLessons {
    #[serde(flatten)]
    pub chapter: Chapter,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookContentResponse {
    pub book: Book,
    pub chapters: Vec<ChapterWithLessons>,
    pub lessons_without_chapter: Vec<Lesson>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChapterCreateBody {
    pub book_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub order: Option<i32>,
}

#[derive(Debug, Default, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChapterUpdateBody {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub order: Option<i32>,
}
