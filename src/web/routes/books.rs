use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    model::{
        CrudRepository, ResourceTyped,
        entity::{Book, BookCreateUpdate, BookFilter, Chapter, Lesson, SchoolClass},
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::{
            books::{BookContentResponse, BookCreateBody, BookDetailResponse, BookUpdateBody, ChapterWithLessons},
            validate_body,
        },
        error::ErrorResponse,
        middlewares,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", get(books_list_handler).post(books_create_handler))
        .route("/class/{class_id}", get(books_by_class_handler))
        .route("/subject/{subject}/grade/{grade}", get(books_by_subject_grade_handler))
        .route(
            "/{id}",
            get(books_get_handler)
                .patch(books_update_handler)
                .delete(books_delete_handler),
        )
        .route("/{id}/content", get(books_content_handler))
        .route("/{id}/publish", patch(books_publish_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

pub(crate) async fn find_book(state: &AppState, user: &AuthenticatedUser, id: Uuid) -> WebResult<Book> {
    Book::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Book::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Book::get_resource_type()))
}

/// Rejects class ids that do not exist, naming them.
async fn check_classes(state: &AppState, class_ids: &[Uuid]) -> WebResult<()> {
    if class_ids.is_empty() {
        return Ok(());
    }

    let missing = SchoolClass::missing_ids(state.pool(), class_ids)
        .await
        .map_err(|e| WebError::resource_fetch_error(SchoolClass::get_resource_type(), e))?;
    if missing.is_empty() {
        return Ok(());
    }

    let names: Vec<String> = missing.iter().map(Uuid::to_string).collect();
    Err(WebError::resource_not_found_with(
        SchoolClass::get_resource_type(),
        format!("classes not found: {}", names.join(", ")),
    ))
}

async fn search_books(state: &AppState, filter: &BookFilter) -> WebResult<Vec<Book>> {
    Book::search(state.pool(), filter)
        .await
        .map_err(|e| WebError::resource_fetch_error(Book::get_resource_type(), e))
}

#[utoipa::path(
    post,
    path = "/api/v1/books",
    request_body = BookCreateBody,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Unknown class ids", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "books"
)]
async fn books_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<BookCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(Book::get_resource_type())?;
    validate_body(&payload, Book::get_resource_type())?;
    check_classes(&state, &payload.class_ids).await?;

    let data = BookCreateUpdate {
        title: payload.title,
        subject: payload.subject,
        grade: payload.grade,
        description: payload.description,
        cover_image: payload.cover_image,
        publisher: payload.publisher,
        is_published: payload.is_published,
        class_ids: Some(payload.class_ids),
    };
    let created = Book::create(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(Book::get_resource_type(), e))?;

    tracing::info!("user {} created book {}", user.user_id(), created.id());
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/books",
    params(BookFilter),
    responses(
        (status = 200, description = "Matching books", body = Vec<Book>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "books"
)]
async fn books_list_handler(
    ctx: RequestContext,
    Query(filter): Query<BookFilter>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?;
    let books = search_books(&state, &filter).await?;
    Ok((StatusCode::OK, Json(books)))
}

#[utoipa::path(
    get,
    path = "/api/v1/books/class/{class_id}",
    params(("class_id" = Uuid, Path, description = "Class id")),
    responses(
        (status = 200, description = "Books assigned to the class", body = Vec<Book>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "books"
)]
async fn books_by_class_handler(
    ctx: RequestContext,
    Path(class_id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?;
    let filter = BookFilter {
        class_id: Some(class_id),
        ..Default::default()
    };
    let books = search_books(&state, &filter).await?;
    Ok((StatusCode::OK, Json(books)))
}

#[utoipa::path(
    get,
    path = "/api/v1/books/subject/{subject}/grade/{grade}",
    params(
        ("subject" = String, Path, description = "Subject name"),
        ("grade" = i32, Path, description = "Grade"),
    ),
    responses(
        (status = 200, description = "Books of the subject and grade", body = Vec<Book>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "books"
)]
async fn books_by_subject_grade_handler(
    ctx: RequestContext,
    Path((subject, grade)): Path<(String, i32)>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?;
    let filter = BookFilter {
        subject: Some(subject),
        grade: Some(grade),
        ..Default::default()
    };
    let books = search_books(&state, &filter).await?;
    Ok((StatusCode::OK, Json(books)))
}

#[utoipa::path(
    get,
    path = "/api/v1/books/{id}",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book with classes and counters", body = BookDetailResponse),
        (status = 404, description = "Book not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "books"
)]
async fn books_get_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let book = find_book(&state, user, id).await?;

    let classes = SchoolClass::all_by_book(state.pool(), book.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(SchoolClass::get_resource_type(), e))?;
    let (chapter_count, lesson_count) = book
        .count_children(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(Book::get_resource_type(), e))?;

    Ok((
        StatusCode::OK,
        Json(BookDetailResponse {
            book,
            classes,
            chapter_count,
            lesson_count,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/books/{id}/content",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "Chapters with lessons and chapterless lessons", body = BookContentResponse),
        (status = 404, description = "Book not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "books"
)]
async fn books_content_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let book = find_book(&state, user, id).await?;

    let chapter_rows = Chapter::all_by_book(state.pool(), book.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Chapter::get_resource_type(), e))?;

    let mut chapters = Vec::with_capacity(chapter_rows.len());
    for chapter in chapter_rows {
        let lessons = Lesson::all_by_chapter(state.pool(), chapter.id())
            .await
            .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?;
        chapters.push(ChapterWithLessons { chapter, lessons });
    }

    let lessons_without_chapter = Lesson::all_without_chapter(state.pool(), book.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?;

    Ok((
        StatusCode::OK,
        Json(BookContentResponse {
            book,
            chapters,
            lessons_without_chapter,
        }),
    ))
}

#[utoipa::path(
    patch,
    path = "/api/v1/books/{id}",
    params(("id" = Uuid, Path, description = "Book id")),
    request_body = BookUpdateBody,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Book or classes not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "books"
)]
async fn books_update_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<BookUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(Book::get_resource_type())?;
    validate_body(&payload, Book::get_resource_type())?;
    let book = find_book(&state, user, id).await?;

    if let Some(class_ids) = payload.class_ids.as_deref() {
        check_classes(&state, class_ids).await?;
    }

    let mut data = BookCreateUpdate::from(&book);
    if let Some(title) = payload.title {
        data.title = title;
    }
    if let Some(subject) = payload.subject {
        data.subject = subject;
    }
    if let Some(grade) = payload.grade {
        data.grade = grade;
    }
    if payload.description.is_some() {
        data.description = payload.description;
    }
    if payload.cover_image.is_some() {
        data.cover_image = payload.cover_image;
    }
    if payload.publisher.is_some() {
        data.publisher = payload.publisher;
    }
    if let Some(is_published) = payload.is_published {
        data.is_published = is_published;
    }
    data.class_ids = payload.class_ids;

    let updated = book
        .update(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(Book::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/books/{id}/publish",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "Publication flag toggled", body = Book),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Book not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "books"
)]
async fn books_publish_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(Book::get_resource_type())?;
    let book = find_book(&state, user, id).await?;

    let toggled = book
        .toggle_publish(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(Book::get_resource_type(), e))?;

    tracing::info!("book {} published: {}", toggled.id(), toggled.is_published());
    Ok((StatusCode::OK, Json(toggled)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/books/{id}",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 400, description = "Book still has chapters or lessons", body = ErrorResponse),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 404, description = "Book not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "books"
)]
async fn books_delete_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_admin(Book::get_resource_type())?;
    let book = find_book(&state, user, id).await?;

    let (chapters, lessons) = book
        .count_children(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(Book::get_resource_type(), e))?;
    if chapters > 0 || lessons > 0 {
        return Err(WebError::resource_bad_request(
            Book::get_resource_type(),
            format!("book still has {chapters} chapter(s) and {lessons} lesson(s)"),
        ));
    }

    book.delete(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(Book::get_resource_type(), e))?;

    Ok(StatusCode::NO_CONTENT)
}
