use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    model::{
        CrudRepository, ResourceTyped,
        entity::{Chapter, Lesson, LessonCreateUpdate, LessonFilter, LessonNavigation, LessonPage, PageBlock},
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::{
            lessons::{LessonCreateBody, LessonUpdateBody, PageWithBlocks, ReorderLessonsBody},
            validate_body,
        },
        error::ErrorResponse,
        middlewares,
        routes::{books::find_book, chapters::find_chapter},
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", post(lessons_create_handler))
        .route("/search", get(lessons_search_handler))
        .route("/reorder", patch(lessons_reorder_handler))
        .route("/book/{book_id}", get(lessons_by_book_handler))
        .route("/chapter/{chapter_id}", get(lessons_by_chapter_handler))
        .route(
            "/{id}",
            get(lessons_get_handler)
                .put(lessons_update_handler)
                .delete(lessons_delete_handler),
        )
        .route("/{id}/pages", get(lessons_pages_handler))
        .route("/{id}/navigation", get(lessons_navigation_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

pub(crate) async fn find_lesson(state: &AppState, user: &AuthenticatedUser, id: Uuid) -> WebResult<Lesson> {
    Lesson::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Lesson::get_resource_type()))
}

/// Loads `chapter_id` and checks that it belongs to `book_id`.
async fn chapter_of_book(
    state: &AppState,
    user: &AuthenticatedUser,
    book_id: Uuid,
    chapter_id: Uuid,
) -> WebResult<Chapter> {
    let chapter = find_chapter(state, user, chapter_id).await?;
    if chapter.book_id() != book_id {
        return Err(WebError::resource_bad_request(
            Lesson::get_resource_type(),
            "chapter does not belong to the book",
        ));
    }
    Ok(chapter)
}

async fn ensure_order_free(
    state: &AppState,
    book_id: Uuid,
    chapter_id: Option<Uuid>,
    order: i32,
    except: Option<Uuid>,
) -> WebResult<()> {
    let taken = Lesson::order_taken(state.pool(), book_id, chapter_id, order, except)
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?;
    if taken {
        return Err(WebError::resource_conflict(
            Lesson::get_resource_type(),
            format!("order {order} is already used in this scope"),
        ));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/v1/lessons",
    request_body = LessonCreateBody,
    responses(
        (status = 201, description = "Lesson created", body = Lesson),
        (status = 400, description = "Chapter belongs to another book", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Book or chapter not found", body = ErrorResponse),
        (status = 409, description = "Order already used", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "lessons"
)]
async fn lessons_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<LessonCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(Lesson::get_resource_type())?;
    validate_body(&payload, Lesson::get_resource_type())?;

    let book = find_book(&state, user, payload.book_id).await?;
    if let Some(chapter_id) = payload.chapter_id {
        chapter_of_book(&state, user, book.id(), chapter_id).await?;
    }
    ensure_order_free(&state, book.id(), payload.chapter_id, payload.order, None).await?;

    let data = LessonCreateUpdate {
        book_id: book.id(),
        chapter_id: payload.chapter_id,
        title: payload.title,
        description: payload.description,
        order: payload.order,
    };
    let created = Lesson::create(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/lessons/search",
    params(LessonFilter),
    responses(
        (status = 200, description = "Matching lessons", body = Vec<Lesson>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "lessons"
)]
async fn lessons_search_handler(
    ctx: RequestContext,
    Query(filter): Query<LessonFilter>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?;

    let lessons = Lesson::search(state.pool(), &filter)
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(lessons)))
}

#[utoipa::path(
    get,
    path = "/api/v1/lessons/book/{book_id}",
    params(("book_id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "Lessons of the book by chapter then order", body = Vec<Lesson>),
        (status = 404, description = "Book not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "lessons"
)]
async fn lessons_by_book_handler(
    ctx: RequestContext,
    Path(book_id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let book = find_book(&state, user, book_id).await?;

    let lessons = Lesson::all_by_book(state.pool(), book.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(lessons)))
}

#[utoipa::path(
    get,
    path = "/api/v1/lessons/chapter/{chapter_id}",
    params(("chapter_id" = Uuid, Path, description = "Chapter id")),
    responses(
        (status = 200, description = "Lessons of the chapter", body = Vec<Lesson>),
        (status = 404, description = "Chapter not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "lessons"
)]
async fn lessons_by_chapter_handler(
    ctx: RequestContext,
    Path(chapter_id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let chapter = find_chapter(&state, user, chapter_id).await?;

    let lessons = Lesson::all_by_chapter(state.pool(), chapter.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(lessons)))
}

#[utoipa::path(
    get,
    path = "/api/v1/lessons/{id}",
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Lesson found", body = Lesson),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "lessons"
)]
async fn lessons_get_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = find_lesson(&state, user, id).await?;
    Ok((StatusCode::OK, Json(lesson)))
}

#[utoipa::path(
    get,
    path = "/api/v1/lessons/{id}/pages",
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Pages of the lesson with their blocks", body = Vec<PageWithBlocks>),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "lessons"
)]
async fn lessons_pages_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = find_lesson(&state, user, id).await?;

    let pages = LessonPage::all_by_lesson(state.pool(), lesson.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(LessonPage::get_resource_type(), e))?;
    let page_ids: Vec<Uuid> = pages.iter().map(LessonPage::id).collect();
    let blocks = PageBlock::all_by_pages(state.pool(), &page_ids)
        .await
        .map_err(|e| WebError::resource_fetch_error(PageBlock::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(PageWithBlocks::group(pages, blocks))))
}

#[utoipa::path(
    get,
    path = "/api/v1/lessons/{id}/navigation",
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Previous and next lesson in the same scope", body = LessonNavigation),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "lessons"
)]
async fn lessons_navigation_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = find_lesson(&state, user, id).await?;

    let navigation = lesson
        .navigation(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(navigation)))
}

#[utoipa::path(
    put,
    path = "/api/v1/lessons/{id}",
    params(("id" = Uuid, Path, description = "Lesson id")),
    request_body = LessonUpdateBody,
    responses(
        (status = 200, description = "Lesson updated", body = Lesson),
        (status = 400, description = "Chapter belongs to another book", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Lesson or chapter not found", body = ErrorResponse),
        (status = 409, description = "Order already used", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "lessons"
)]
async fn lessons_update_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<LessonUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(Lesson::get_resource_type())?;
    validate_body(&payload, Lesson::get_resource_type())?;
    let lesson = find_lesson(&state, user, id).await?;

    let mut data = LessonCreateUpdate::from(&lesson);
    if let Some(chapter_id) = payload.chapter_id {
        chapter_of_book(&state, user, lesson.book_id(), chapter_id).await?;
        data.chapter_id = Some(chapter_id);
    }
    if let Some(title) = payload.title {
        data.title = title;
    }
    if payload.description.is_some() {
        data.description = payload.description;
    }
    if let Some(order) = payload.order {
        data.order = order;
    }

    if data.order != lesson.order() || data.chapter_id != lesson.chapter_id() {
        ensure_order_free(&state, lesson.book_id(), data.chapter_id, data.order, Some(lesson.id())).await?;
    }

    let updated = lesson
        .update(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/lessons/{id}",
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses(
        (status = 204, description = "Lesson deleted"),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
        (status = 409, description = "Lesson still has pages", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "lessons"
)]
async fn lessons_delete_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_admin(Lesson::get_resource_type())?;
    let lesson = find_lesson(&state, user, id).await?;

    let pages = lesson
        .count_pages(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?;
    if pages > 0 {
        return Err(WebError::resource_conflict(
            Lesson::get_resource_type(),
            format!("lesson still has {pages} page(s)"),
        ));
    }

    lesson
        .delete(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    patch,
    path = "/api/v1/lessons/reorder",
    request_body = ReorderLessonsBody,
    responses(
        (status = 204, description = "Lessons reordered"),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Unknown lesson ids", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "lessons"
)]
async fn lessons_reorder_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<ReorderLessonsBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(Lesson::get_resource_type())?;
    validate_body(&payload, Lesson::get_resource_type())?;

    let missing = Lesson::reorder(state.pool(), &payload.lesson_ids)
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?;
    if !missing.is_empty() {
        let names: Vec<String> = missing.iter().map(Uuid::to_string).collect();
        return Err(WebError::resource_not_found_with(
            Lesson::get_resource_type(),
            format!("lessons not found: {}", names.join(", ")),
        ));
    }

    Ok(StatusCode::NO_CONTENT)
}
