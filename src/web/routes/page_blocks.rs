use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    model::{
        CrudRepository, ResourceTyped,
        entity::{
            BlockContentInput, BlockType, H5pContent, PageBlock, PageBlockCreateUpdate, PageBlockFilter,
            PageBlockStatistics, build_block_content,
        },
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::{
            pages::{BlockStatisticsQuery, PageBlockCreateBody, PageBlockUpdateBody, ReorderBlocksBody},
            validate_body,
        },
        error::ErrorResponse,
        middlewares,
        routes::pages::find_page,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", post(page_blocks_create_handler))
        .route("/search", get(page_blocks_search_handler))
        .route("/statistics", get(page_blocks_statistics_handler))
        .route("/page/{page_id}", get(page_blocks_by_page_handler))
        .route("/page/{page_id}/reorder", post(page_blocks_reorder_handler))
        .route(
            "/{id}",
            get(page_blocks_get_handler)
                .patch(page_blocks_update_handler)
                .delete(page_blocks_delete_handler),
        )
        .route("/{id}/duplicate", post(page_blocks_duplicate_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

pub(crate) async fn find_block(state: &AppState, user: &AuthenticatedUser, id: Uuid) -> WebResult<PageBlock> {
    PageBlock::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(PageBlock::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(PageBlock::get_resource_type()))
}

fn parse_block_type(value: &str) -> WebResult<BlockType> {
    BlockType::parse(value).ok_or_else(|| {
        WebError::resource_bad_request(
            PageBlock::get_resource_type(),
            format!("unknown block type '{value}', expected TEXT, VIDEO, H5P or QUIZ"),
        )
    })
}

/// Builds the block content and, for H5P blocks, checks the referenced content exists.
async fn resolve_content(
    state: &AppState,
    user: &AuthenticatedUser,
    block_type: BlockType,
    input: &BlockContentInput<'_>,
) -> WebResult<(serde_json::Value, Option<Uuid>)> {
    let content = build_block_content(block_type, input)
        .map_err(|reason| WebError::resource_bad_request(PageBlock::get_resource_type(), reason))?;

    if block_type != BlockType::H5p {
        return Ok((content, None));
    }

    let h5p_content_id = input.h5p_content_id;
    if let Some(id) = h5p_content_id {
        H5pContent::find_by_id(state.pool(), user, id)
            .await
            .map_err(|e| WebError::resource_fetch_error(H5pContent::get_resource_type(), e))?
            .ok_or_else(|| WebError::resource_not_found(H5pContent::get_resource_type()))?;
    }
    Ok((content, h5p_content_id))
}

#[utoipa::path(
    post,
    path = "/api/v1/page-blocks",
    request_body = PageBlockCreateBody,
    responses(
        (status = 201, description = "Block created", body = PageBlock),
        (status = 400, description = "Unknown type or content missing for the type", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Page or H5P content not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "page-blocks"
)]
async fn page_blocks_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<PageBlockCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(PageBlock::get_resource_type())?;
    validate_body(&payload, PageBlock::get_resource_type())?;

    let block_type = parse_block_type(&payload.block_type)?;
    let page = find_page(&state, user, payload.page_id).await?;
    let (content, h5p_content_id) = resolve_content(&state, user, block_type, &payload.content_input()).await?;

    let data = PageBlockCreateUpdate {
        page_id: page.id(),
        block_type,
        title: payload.title,
        description: payload.description,
        content,
        h5p_content_id,
        order: payload.order,
    };
    let created = PageBlock::create(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(PageBlock::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/page-blocks/page/{page_id}",
    params(("page_id" = Uuid, Path, description = "Page id")),
    responses(
        (status = 200, description = "Blocks of the page in order", body = Vec<PageBlock>),
        (status = 404, description = "Page not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "page-blocks"
)]
async fn page_blocks_by_page_handler(
    ctx: RequestContext,
    Path(page_id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let page = find_page(&state, user, page_id).await?;

    let blocks = PageBlock::all_by_page(state.pool(), page.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(PageBlock::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(blocks)))
}

#[utoipa::path(
    get,
    path = "/api/v1/page-blocks/search",
    params(PageBlockFilter),
    responses(
        (status = 200, description = "Matching blocks", body = Vec<PageBlock>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "page-blocks"
)]
async fn page_blocks_search_handler(
    ctx: RequestContext,
    Query(filter): Query<PageBlockFilter>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?;

    let blocks = PageBlock::search(state.pool(), &filter)
        .await
        .map_err(|e| WebError::resource_fetch_error(PageBlock::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(blocks)))
}

#[utoipa::path(
    get,
    path = "/api/v1/page-blocks/statistics",
    params(BlockStatisticsQuery),
    responses(
        (status = 200, description = "Block counters", body = PageBlockStatistics),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "page-blocks"
)]
async fn page_blocks_statistics_handler(
    ctx: RequestContext,
    Query(query): Query<BlockStatisticsQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?;

    let statistics = PageBlock::statistics(state.pool(), query.page_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(PageBlock::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(statistics)))
}

#[utoipa::path(
    get,
    path = "/api/v1/page-blocks/{id}",
    params(("id" = Uuid, Path, description = "Block id")),
    responses(
        (status = 200, description = "Block found", body = PageBlock),
        (status = 404, description = "Block not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "page-blocks"
)]
async fn page_blocks_get_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let block = find_block(&state, user, id).await?;
    Ok((StatusCode::OK, Json(block)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/page-blocks/{id}",
    params(("id" = Uuid, Path, description = "Block id")),
    request_body = PageBlockUpdateBody,
    responses(
        (status = 200, description = "Block updated", body = PageBlock),
        (status = 400, description = "Content does not fit the block type", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Block or H5P content not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "page-blocks"
)]
async fn page_blocks_update_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<PageBlockUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(PageBlock::get_resource_type())?;
    validate_body(&payload, PageBlock::get_resource_type())?;
    let block = find_block(&state, user, id).await?;

    let mut data = PageBlockCreateUpdate::from(&block);
    if payload.changes_content() {
        let block_type = match payload.block_type.as_deref() {
            Some(value) => parse_block_type(value)?,
            None => block.block_type(),
        };
        let current = block.content();
        let input = BlockContentInput {
            text: payload
                .text_content
                .as_deref()
                .or_else(|| current.get("text").and_then(|v| v.as_str())),
            video_url: payload
                .video_url
                .as_deref()
                .or_else(|| current.get("url").and_then(|v| v.as_str())),
            h5p_content_id: payload.h5p_content_id.or(block.h5p_content_id()),
        };
        let (content, h5p_content_id) = resolve_content(&state, user, block_type, &input).await?;
        data.block_type = block_type;
        data.content = content;
        data.h5p_content_id = h5p_content_id;
    }
    if let Some(title) = payload.title {
        data.title = title;
    }
    if payload.description.is_some() {
        data.description = payload.description;
    }
    if payload.order.is_some() {
        data.order = payload.order;
    }

    let updated = block
        .update(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(PageBlock::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/page-blocks/{id}",
    params(("id" = Uuid, Path, description = "Block id")),
    responses(
        (status = 204, description = "Block deleted, later blocks moved up"),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Block not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "page-blocks"
)]
async fn page_blocks_delete_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(PageBlock::get_resource_type())?;
    let block = find_block(&state, user, id).await?;

    block
        .delete(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(PageBlock::get_resource_type(), e))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/page-blocks/page/{page_id}/reorder",
    params(("page_id" = Uuid, Path, description = "Page id")),
    request_body = ReorderBlocksBody,
    responses(
        (status = 200, description = "Blocks of the page in their new order", body = Vec<PageBlock>),
        (status = 400, description = "A block does not belong to the page", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Page not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "page-blocks"
)]
async fn page_blocks_reorder_handler(
    ctx: RequestContext,
    Path(page_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ReorderBlocksBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(PageBlock::get_resource_type())?;
    validate_body(&payload, PageBlock::get_resource_type())?;
    let page = find_page(&state, user, page_id).await?;

    let foreign = PageBlock::foreign_ids(state.pool(), page.id(), &payload.block_ids)
        .await
        .map_err(|e| WebError::resource_fetch_error(PageBlock::get_resource_type(), e))?;
    if !foreign.is_empty() {
        let names: Vec<String> = foreign.iter().map(Uuid::to_string).collect();
        return Err(WebError::resource_bad_request(
            PageBlock::get_resource_type(),
            format!("blocks do not belong to the page: {}", names.join(", ")),
        ));
    }

    PageBlock::reorder(state.pool(), &payload.block_ids)
        .await
        .map_err(|e| WebError::resource_fetch_error(PageBlock::get_resource_type(), e))?;
    let blocks = PageBlock::all_by_page(state.pool(), page.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(PageBlock::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(blocks)))
}

#[utoipa::path(
    post,
    path = "/api/v1/page-blocks/{id}/duplicate",
    params(("id" = Uuid, Path, description = "Block id")),
    responses(
        (status = 201, description = "Copy appended to the page", body = PageBlock),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Block not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "page-blocks"
)]
async fn page_blocks_duplicate_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(PageBlock::get_resource_type())?;
    let block = find_block(&state, user, id).await?;

    let copy = block
        .duplicate(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(PageBlock::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(copy)))
}
