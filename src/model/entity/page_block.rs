use std::collections::BTreeMap;

use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{Postgres, QueryBuilder, prelude::FromRow};
use uuid::Uuid;

pub const DUPLICATE_SUFFIX: &str = " (Bản sao)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockType {
    Text,
    Video,
    H5p,
    Quiz,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Video => "VIDEO",
            Self::H5p => "H5P",
            Self::Quiz => "QUIZ",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TEXT" => Some(Self::Text),
            "VIDEO" => Some(Self::Video),
            "H5P" => Some(Self::H5p),
            "QUIZ" => Some(Self::Quiz),
            _ => None,
        }
    }
}

/// Raw inputs a block's `content` is built from.
#[derive(Debug, Clone, Default)]
pub struct BlockContentInput<'a> {
    pub text: Option<&'a str>,
    pub video_url: Option<&'a str>,
    pub h5p_content_id: Option<Uuid>,
}

/// Builds the `content` JSON of a block, or the reason the inputs do not fit its type.
pub fn build_block_content(block_type: BlockType, input: &BlockContentInput<'_>) -> Result<Value, String> {
    let present = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);

    match block_type {
        BlockType::Text => present(input.text)
            .map(|text| json!({ "text": text }))
            .ok_or_else(|| "Text content is required for TEXT blocks".to_string()),
        BlockType::Video => present(input.video_url)
            .map(|url| json!({ "url": url }))
            .ok_or_else(|| "Video URL is required for VIDEO blocks".to_string()),
        BlockType::H5p => input
            .h5p_content_id
            .map(|id| json!({ "h5pContentId": id }))
            .ok_or_else(|| "H5P content id is required for H5P blocks".to_string()),
        BlockType::Quiz => Ok(json!({})),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageBlock {
    id: Uuid,
    page_id: Uuid,
    block_type: String,
    title: String,
    description: Option<String>,
    content: Value,
    h5p_content_id: Option<Uuid>,
    audio_url: Option<String>,
    #[sqlx(rename = "order_index")]
    order: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PageBlockCreateUpdate {
    pub page_id: Uuid,
    pub block_type: BlockType,
    pub title: String,
    pub description: Option<String>,
    pub content: Value,
    pub h5p_content_id: Option<Uuid>,
    /// Appended after the last block of the page when `None`.
    pub order: Option<i32>,
}

impl From<&PageBlock> for PageBlockCreateUpdate {
    fn from(block: &PageBlock) -> Self {
        Self {
            page_id: block.page_id,
            block_type: block.block_type(),
            title: block.title.clone(),
            description: block.description.clone(),
            content: block.content.clone(),
            h5p_content_id: block.h5p_content_id,
            order: Some(block.order),
        }
    }
}

impl ResourceTyped for PageBlock {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::PageBlock
    }
}

impl PageBlock {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn page_id(&self) -> Uuid {
        self.page_id
    }

    pub fn block_type(&self) -> BlockType {
        BlockType::parse(&self.block_type).unwrap_or(BlockType::Text)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    pub fn h5p_content_id(&self) -> Option<Uuid> {
        self.h5p_content_id
    }

    pub fn audio_url(&self) -> Option<&str> {
        self.audio_url.as_deref()
    }

    pub fn order(&self) -> i32 {
        self.order
    }
}

#[async_trait]
impl CrudRepository<PageBlock, PageBlockCreateUpdate, Uuid> for PageBlock {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: PageBlockCreateUpdate,
    ) -> DatabaseResult<Self> {
        let block = sqlx::query_as(
            r#"
            INSERT INTO page_blocks (id, page_id, block_type, title, description, content, h5p_content_id, order_index)
            VALUES ($1, $2, $3, $4, $5, $6, $7,
                COALESCE($8, (SELECT COALESCE(MAX(order_index), 0) + 1 FROM page_blocks WHERE page_id = $2)))
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.page_id)
        .bind(data.block_type.as_str())
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.content)
        .bind(data.h5p_content_id)
        .bind(data.order)
        .fetch_one(mm.executor())
        .await?;
        Ok(block)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: PageBlockCreateUpdate,
    ) -> DatabaseResult<Self> {
        let block = sqlx::query_as(
            r#"
            UPDATE page_blocks
            SET block_type = $1, title = $2, description = $3, content = $4, h5p_content_id = $5,
                order_index = COALESCE($6, order_index), updated_at = NOW()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(data.block_type.as_str())
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.content)
        .bind(data.h5p_content_id)
        .bind(data.order)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(block)
    }

    /// Deletes the block and closes the gap in the page's block order.
    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        let mut tx = mm.executor().begin().await?;

        sqlx::query("DELETE FROM page_blocks WHERE id = $1")
            .bind(self.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE page_blocks SET order_index = order_index - 1 WHERE page_id = $1 AND order_index > $2",
        )
        .bind(self.page_id)
        .bind(self.order)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM page_blocks WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PageBlockFilter {
    pub keyword: Option<String>,
    pub page_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageBlockStatistics {
    pub total: i64,
    pub by_type: BTreeMap<String, i64>,
    pub with_progress: i64,
    pub without_progress: i64,
}

impl PageBlock {
    pub async fn all_by_page(mm: &ModelManager, page_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM page_blocks WHERE page_id = $1 ORDER BY order_index ASC")
            .bind(page_id)
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn all_by_pages(mm: &ModelManager, page_ids: &[Uuid]) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM page_blocks WHERE page_id = ANY($1) ORDER BY page_id, order_index ASC",
        )
        .bind(page_ids)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn search(mm: &ModelManager, filter: &PageBlockFilter) -> DatabaseResult<Vec<Self>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM page_blocks WHERE TRUE");

        if let Some(keyword) = filter.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
            let pattern = format!("%{}%", keyword.trim());
            query
                .push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(page_id) = filter.page_id {
            query.push(" AND page_id = ").push_bind(page_id);
        }
        query.push(" ORDER BY page_id, order_index ASC");

        let blocks = query.build_query_as().fetch_all(mm.executor()).await?;
        Ok(blocks)
    }

    pub async fn statistics(mm: &ModelManager, page_id: Option<Uuid>) -> DatabaseResult<PageBlockStatistics> {
        let by_type: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT block_type, COUNT(*) FROM page_blocks
            WHERE $1::uuid IS NULL OR page_id = $1
            GROUP BY block_type
            "#,
        )
        .bind(page_id)
        .fetch_all(mm.executor())
        .await?;

        let with_progress: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM page_blocks pb
            WHERE ($1::uuid IS NULL OR pb.page_id = $1)
              AND EXISTS (SELECT 1 FROM student_progress sp WHERE sp.page_block_id = pb.id)
            "#,
        )
        .bind(page_id)
        .fetch_one(mm.executor())
        .await?;

        let total = by_type.iter().map(|(_, n)| n).sum();
        Ok(PageBlockStatistics {
            total,
            by_type: by_type.into_iter().collect(),
            with_progress,
            without_progress: total - with_progress,
        })
    }

    /// Ids from `block_ids` that are not blocks of `page_id`.
    pub async fn foreign_ids(mm: &ModelManager, page_id: Uuid, block_ids: &[Uuid]) -> DatabaseResult<Vec<Uuid>> {
        let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM page_blocks WHERE page_id = $1 AND id = ANY($2)")
            .bind(page_id)
            .bind(block_ids)
            .fetch_all(mm.executor())
            .await?;
        Ok(block_ids.iter().filter(|id| !found.contains(id)).copied().collect())
    }

    pub async fn reorder(mm: &ModelManager, block_ids: &[Uuid]) -> DatabaseResult<()> {
        let mut tx = mm.executor().begin().await?;
        for (index, id) in block_ids.iter().enumerate() {
            sqlx::query("UPDATE page_blocks SET order_index = $1, updated_at = NOW() WHERE id = $2")
                .bind(index as i32 + 1)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Copies the block to the end of its page.
    pub async fn duplicate(&self, mm: &ModelManager, actor: &AuthenticatedUser) -> DatabaseResult<Self> {
        let mut data = PageBlockCreateUpdate::from(self);
        data.title = format!("{}{}", self.title, DUPLICATE_SUFFIX);
        data.order = None;
        Self::create(mm, actor, data).await
    }

    pub async fn set_audio_url(self, mm: &ModelManager, audio_url: &str) -> DatabaseResult<Self> {
        let block = sqlx::query_as("UPDATE page_blocks SET audio_url = $1, updated_at = NOW() WHERE id = $2 RETURNING *")
            .bind(audio_url)
            .bind(self.id)
            .fetch_one(mm.executor())
            .await?;
        Ok(block)
    }

    /// Book the block belongs to, through its page and lesson.
    pub async fn book_id(&self, mm: &ModelManager) -> DatabaseResult<Option<Uuid>> {
        let book_id = sqlx::query_scalar(
            r#"
            SELECT l.book_id FROM pages p
            JOIN lessons l ON l.id = p.lesson_id
            WHERE p.id = $1
            "#,
        )
        .bind(self.page_id)
        .fetch_optional(mm.executor())
        .await?;
        Ok(book_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn text_block_requires_text() {
        let input = BlockContentInput {
            text: Some("  "),
            ..Default::default()
        };
        assert!(build_block_content(BlockType::Text, &input).is_err());

        let input = BlockContentInput {
            text: Some("Xin chào"),
            ..Default::default()
        };
        assert_eq!(
            build_block_content(BlockType::Text, &input).unwrap(),
            json!({ "text": "Xin chào" })
        );
    }

    #[test]
    fn video_and_h5p_blocks_require_their_source() {
        let empty = BlockContentInput::default();
        assert!(build_block_content(BlockType::Video, &empty).is_err());
        assert!(build_block_content(BlockType::H5p, &empty).is_err());

        let id = Uuid::new_v4();
        let input = BlockContentInput {
            video_url: Some("https://video.example/1.mp4"),
            h5p_content_id: Some(id),
            ..Default::default()
        };
        assert_eq!(
            build_block_content(BlockType::Video, &input).unwrap(),
            json!({ "url": "https://video.example/1.mp4" })
        );
        assert_eq!(
            build_block_content(BlockType::H5p, &input).unwrap(),
            json!({ "h5pContentId": id })
        );
    }

    #[test]
    fn quiz_block_has_empty_content() {
        let input = BlockContentInput {
            text: Some("ignored"),
            ..Default::default()
        };
        assert_eq!(build_block_content(BlockType::Quiz, &input).unwrap(), json!({}));
    }

    #[test]
    fn block_type_round_trips_through_its_column_value() {
        for t in [BlockType::Text, BlockType::Video, BlockType::H5p, BlockType::Quiz] {
            assert_eq!(BlockType::parse(t.as_str()), Some(t));
        }
        assert_eq!(BlockType::parse("AUDIO"), None);
    }
}
