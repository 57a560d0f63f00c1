use serde_json::json;
use uuid::Uuid;

use crate::model::{
    DatabaseResult, ModelManager,
    entity::{XapiResult, XapiStatement, XapiStatementCreate, XapiVerb},
};

pub const PLATFORM: &str = "Hệ thống học tập tiểu học";
pub const LANGUAGE: &str = "vi-VN";

/// Where a statement points to.
#[derive(Debug, Clone, Copy)]
pub struct StatementTarget {
    pub page_block_id: Uuid,
    pub quiz_attempt_id: Uuid,
    pub h5p_content_id: Option<Uuid>,
}

/// Records an xAPI statement for `verb` ("attempted", "answered", ...).
/// Returns `None` without writing when the verb is not registered.
pub async fn emit(
    mm: &ModelManager,
    actor_id: Uuid,
    verb: &str,
    target: StatementTarget,
    result: XapiResult,
) -> DatabaseResult<Option<XapiStatement>> {
    let Some(verb_row) = XapiVerb::find_by_name(mm, verb).await? else {
        tracing::warn!("xAPI verb '{verb}' is not registered, statement skipped");
        return Ok(None);
    };

    let statement = XapiStatement::create(
        mm,
        XapiStatementCreate {
            actor_id,
            verb_id: verb_row.id(),
            object_id: target.page_block_id.to_string(),
            quiz_attempt_id: Some(target.quiz_attempt_id),
            h5p_content_id: target.h5p_content_id,
            result,
            context: json!({ "platform": PLATFORM, "language": LANGUAGE }),
        },
    )
    .await?;

    Ok(Some(statement))
}
