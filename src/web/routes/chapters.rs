use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    model::{
        CrudRepository, ResourceTyped,
        entity::{Chapter, ChapterCreateUpdate},
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::{
            books::{ChapterCreateBody, ChapterUpdateBody},
            validate_body,
        },
        error::ErrorResponse,
        middlewares,
        routes::books::find_book,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", post(chapters_create_handler))
        .route("/book/{book_id}", get(chapters_by_book_handler))
        .route(
            "/{id}",
            get(chapters_get_handler)
                .patch(chapters_update_handler)
                .delete(chapters_delete_handler),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

pub(crate) async fn find_chapter(state: &AppState, user: &AuthenticatedUser, id: Uuid) -> WebResult<Chapter> {
    Chapter::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Chapter::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Chapter::get_resource_type()))
}

#[utoipa::path(
    post,
    path = "/api/v1/chapters",
    request_body = ChapterCreateBody,
    responses(
        (status = 201, description = "Chapter created", body = Chapter),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Book not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "chapters"
)]
async fn chapters_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<ChapterCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(Chapter::get_resource_type())?;
    validate_body(&payload, Chapter::get_resource_type())?;
    let book = find_book(&state, user, payload.book_id).await?;

    let data = ChapterCreateUpdate {
        book_id: book.id(),
        title: payload.title,
        description: payload.description,
        order: payload.order,
    };
    let created = Chapter::create(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(Chapter::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/chapters/book/{book_id}",
    params(("book_id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "Chapters of the book in order", body = Vec<Chapter>),
        (status = 404, description = "Book not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "chapters"
)]
async fn chapters_by_book_handler(
    ctx: RequestContext,
    Path(book_id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let book = find_book(&state, user, book_id).await?;

    let chapters = Chapter::all_by_book(state.pool(), book.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Chapter::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(chapters)))
}

#[utoipa::path(
    get,
    path = "/api/v1/chapters/{id}",
    params(("id" = Uuid, Path, description = "Chapter id")),
    responses(
        (status = 200, description = "Chapter found", body = Chapter),
        (status = 404, description = "Chapter not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "chapters"
)]
async fn chapters_get_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let chapter = find_chapter(&state, user, id).await?;
    Ok((StatusCode::OK, Json(chapter)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/chapters/{id}",
    params(("id" = Uuid, Path, description = "Chapter id")),
    request_body = ChapterUpdateBody,
    responses(
        (status = 200, description = "Chapter updated", body = Chapter),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Chapter not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "chapters"
)]
async fn chapters_update_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ChapterUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(Chapter::get_resource_type())?;
    validate_body(&payload, Chapter::get_resource_type())?;
    let chapter = find_chapter(&state, user, id).await?;

    let mut data = ChapterCreateUpdate::from(&chapter);
    if let Some(title) = payload.title {
        data.title = title;
    }
    if payload.description.is_some() {
        data.description = payload.description;
    }
    if payload.order.is_some() {
        data.order = payload.order;
    }

    let updated = chapter
        .update(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(Chapter::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/chapters/{id}",
    params(("id" = Uuid, Path, description = "Chapter id")),
    responses(
        (status = 204, description = "Chapter deleted"),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Chapter not found", body = ErrorResponse),
        (status = 409, description = "Chapter still has lessons", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "chapters"
)]
async fn chapters_delete_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(Chapter::get_resource_type())?;
    let chapter = find_chapter(&state, user, id).await?;

    let lessons = chapter
        .count_lessons(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(Chapter::get_resource_type(), e))?;
    if lessons > 0 {
        return Err(WebError::resource_conflict(
            Chapter::get_resource_type(),
            format!("chapter still has {lessons} lesson(s)"),
        ));
    }

    chapter
        .delete(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(Chapter::get_resource_type(), e))?;

    Ok(StatusCode::NO_CONTENT)
}
