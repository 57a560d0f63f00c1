use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use crate::{
    Config,
    model::{ResourceTyped, entity::PageBlock},
    tts::{self, TtsError},
    web::{
        AppState, RequestContext, WebError, WebResult,
        dto::{
            tts::{TtsBody, TtsResponse},
            validate_body,
        },
        error::ErrorResponse,
        middlewares,
        routes::page_blocks::find_block,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route(
            "/{page_block_id}",
            get(tts_get_handler).post(tts_generate_handler),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/v1/tts/{page_block_id}",
    params(("page_block_id" = Uuid, Path, description = "Page block id")),
    request_body = TtsBody,
    responses(
        (status = 200, description = "Public URL of the block audio", body = TtsResponse),
        (status = 404, description = "Page block not found", body = ErrorResponse),
        (status = 500, description = "Speech synthesis unavailable", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "tts"
)]
async fn tts_generate_handler(
    ctx: RequestContext,
    Path(page_block_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<TtsBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    validate_body(&payload, PageBlock::get_resource_type())?;
    let block = find_block(&state, user, page_block_id).await?;

    if let Some(url) = block.audio_url() {
        return Ok((
            StatusCode::OK,
            Json(TtsResponse {
                audio_url: Some(url.to_string()),
            }),
        ));
    }

    let config = Config::get_or_init(false)
        .await
        .tts()
        .ok_or_else(|| WebError::server_tts_error(TtsError::NotConfigured))?;
    let lang = payload.lang.as_deref().unwrap_or(tts::DEFAULT_LANGUAGE);

    let audio = tts::synthesize(state.http(), config, &payload.text, lang)
        .await
        .map_err(WebError::server_tts_error)?;
    let url = tts::upload_audio(state.http(), config, block.id(), audio)
        .await
        .map_err(WebError::server_tts_error)?;
    tracing::info!("generated audio for page block {}", block.id());

    let block = block
        .set_audio_url(state.pool(), &url)
        .await
        .map_err(|e| WebError::resource_fetch_error(PageBlock::get_resource_type(), e))?;

    Ok((
        StatusCode::OK,
        Json(TtsResponse {
            audio_url: block.audio_url().map(str::to_string),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/tts/{page_block_id}",
    params(("page_block_id" = Uuid, Path, description = "Page block id")),
    responses(
        (status = 200, description = "Stored audio URL, null when none", body = TtsResponse),
        (status = 404, description = "Page block not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "tts"
)]
async fn tts_get_handler(
    ctx: RequestContext,
    Path(page_block_id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let block = find_block(&state, user, page_block_id).await?;

    Ok((
        StatusCode::OK,
        Json(TtsResponse {
            audio_url: block.audio_url().map(str::to_string),
        }),
    ))
}
