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
        entity::{LessonPage, LessonPageCreateUpdate, PageBlock},
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::{
            lessons::PageWithBlocks,
            pages::{PageCreateBody, PageUpdateBody},
            validate_body,
        },
        error::ErrorResponse,
        middlewares,
        routes::lessons::find_lesson,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", post(pages_create_handler))
        .route("/lesson/{lesson_id}", get(pages_by_lesson_handler))
        .route(
            "/{id}",
            get(pages_get_handler)
                .patch(pages_update_handler)
                .delete(pages_delete_handler),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

pub(crate) async fn find_page(state: &AppState, user: &AuthenticatedUser, id: Uuid) -> WebResult<LessonPage> {
    LessonPage::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(LessonPage::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(LessonPage::get_resource_type()))
}

#[utoipa::path(
    post,
    path = "/api/v1/pages",
    request_body = PageCreateBody,
    responses(
        (status = 201, description = "Page created", body = LessonPage),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "pages"
)]
async fn pages_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<PageCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(LessonPage::get_resource_type())?;
    validate_body(&payload, LessonPage::get_resource_type())?;
    let lesson = find_lesson(&state, user, payload.lesson_id).await?;

    let data = LessonPageCreateUpdate {
        lesson_id: lesson.id(),
        title: payload.title,
        order: payload.order,
    };
    let created = LessonPage::create(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(LessonPage::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/pages/lesson/{lesson_id}",
    params(("lesson_id" = Uuid, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Pages of the lesson in order", body = Vec<LessonPage>),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "pages"
)]
async fn pages_by_lesson_handler(
    ctx: RequestContext,
    Path(lesson_id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = find_lesson(&state, user, lesson_id).await?;

    let pages = LessonPage::all_by_lesson(state.pool(), lesson.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(LessonPage::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(pages)))
}

#[utoipa::path(
    get,
    path = "/api/v1/pages/{id}",
    params(("id" = Uuid, Path, description = "Page id")),
    responses(
        (status = 200, description = "Page with its blocks", body = PageWithBlocks),
        (status = 404, description = "Page not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "pages"
)]
async fn pages_get_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let page = find_page(&state, user, id).await?;

    let blocks = PageBlock::all_by_page(state.pool(), page.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(PageBlock::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(PageWithBlocks { page, blocks })))
}

#[utoipa::path(
    patch,
    path = "/api/v1/pages/{id}",
    params(("id" = Uuid, Path, description = "Page id")),
    request_body = PageUpdateBody,
    responses(
        (status = 200, description = "Page updated", body = LessonPage),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Page not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "pages"
)]
async fn pages_update_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<PageUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(LessonPage::get_resource_type())?;
    validate_body(&payload, LessonPage::get_resource_type())?;
    let page = find_page(&state, user, id).await?;

    let mut data = LessonPageCreateUpdate::from(&page);
    if payload.title.is_some() {
        data.title = payload.title;
    }
    if payload.order.is_some() {
        data.order = payload.order;
    }

    let updated = page
        .update(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(LessonPage::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/pages/{id}",
    params(("id" = Uuid, Path, description = "Page id")),
    responses(
        (status = 204, description = "Page deleted, later pages moved up"),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Page not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "pages"
)]
async fn pages_delete_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(LessonPage::get_resource_type())?;
    let page = find_page(&state, user, id).await?;

    page.delete(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(LessonPage::get_resource_type(), e))?;

    Ok(StatusCode::NO_CONTENT)
}
