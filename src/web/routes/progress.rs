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
        ResourceTyped,
        entity::{
            ClassMembership, LessonProgressRow, ProgressDetailRow, ProgressStatus, ProgressSummary,
            ProgressSummaryFilter, QuizAttempt, StudentProgress,
        },
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, UserRole, WebError, WebResult,
        dto::{
            progress::{ProgressStatusBody, ProgressUpsertBody, QuizAttemptRecordBody},
            validate_body,
        },
        error::ErrorResponse,
        middlewares,
        routes::{lessons::find_lesson, page_blocks::find_block, users::find_user},
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", post(progress_upsert_handler))
        .route("/my-progress", get(progress_mine_handler))
        .route("/summary", get(progress_summary_handler))
        .route("/quiz-attempt", post(progress_record_attempt_handler))
        .route("/user/{user_id}", get(progress_by_user_handler))
        .route("/lesson/{lesson_id}", get(progress_by_lesson_handler))
        .route(
            "/{id}",
            get(progress_get_handler)
                .patch(progress_update_handler)
                .delete(progress_delete_handler),
        )
        .route("/{id}/quiz-attempts", get(progress_attempts_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

/// Progress record visible to its owner and to staff.
async fn find_progress(state: &AppState, user: &AuthenticatedUser, id: Uuid) -> WebResult<StudentProgress> {
    let progress = StudentProgress::find_by_id(state.pool(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(StudentProgress::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(StudentProgress::get_resource_type()))?;
    user.require_self_or_staff(progress.user_id(), StudentProgress::get_resource_type())?;
    Ok(progress)
}

async fn user_progress(state: &AppState, user_id: Uuid) -> WebResult<Vec<ProgressDetailRow>> {
    ProgressDetailRow::all_by_user(state.pool(), user_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(StudentProgress::get_resource_type(), e))
}

#[utoipa::path(
    post,
    path = "/api/v1/student-progress",
    request_body = ProgressUpsertBody,
    responses(
        (status = 200, description = "Progress stored", body = StudentProgress),
        (status = 403, description = "Not allowed for this user or block", body = ErrorResponse),
        (status = 404, description = "User or page block not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "student-progress"
)]
async fn progress_upsert_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<ProgressUpsertBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_self_or_staff(payload.user_id, StudentProgress::get_resource_type())?;
    let learner = find_user(&state, user, payload.user_id).await?;
    let block = find_block(&state, user, payload.page_block_id).await?;

    if learner.role() == UserRole::Student {
        let book_id = block
            .book_id(state.pool())
            .await
            .map_err(|e| WebError::resource_fetch_error(StudentProgress::get_resource_type(), e))?;
        let member = match book_id {
            Some(book_id) => ClassMembership::is_member_of_book(state.pool(), learner.id(), book_id)
                .await
                .map_err(|e| WebError::resource_fetch_error(StudentProgress::get_resource_type(), e))?,
            None => false,
        };
        if !member {
            tracing::debug!(
                "student {} is not enrolled in a class of block {}",
                learner.id(),
                block.id()
            );
            return Err(WebError::resource_forbidden(StudentProgress::get_resource_type()));
        }
    }

    let progress = StudentProgress::upsert(
        state.pool(),
        learner.id(),
        block.id(),
        payload.status.unwrap_or(ProgressStatus::InProgress),
    )
    .await
    .map_err(|e| WebError::resource_fetch_error(StudentProgress::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(progress)))
}

#[utoipa::path(
    get,
    path = "/api/v1/student-progress/user/{user_id}",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Progress of the user, recent first", body = Vec<ProgressDetailRow>),
        (status = 403, description = "Someone else's progress", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "student-progress"
)]
async fn progress_by_user_handler(
    ctx: RequestContext,
    Path(user_id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_self_or_staff(user_id, StudentProgress::get_resource_type())?;
    let rows = user_progress(&state, user_id).await?;
    Ok((StatusCode::OK, Json(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/student-progress/my-progress",
    responses(
        (status = 200, description = "Own progress, recent first", body = Vec<ProgressDetailRow>),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "student-progress"
)]
async fn progress_mine_handler(ctx: RequestContext, State(state): State<AppState>) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let rows = user_progress(&state, user.user_id()).await?;
    Ok((StatusCode::OK, Json(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/student-progress/summary",
    params(ProgressSummaryFilter),
    responses(
        (status = 200, description = "Counts per status and completion rate", body = ProgressSummary),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "student-progress"
)]
async fn progress_summary_handler(
    ctx: RequestContext,
    Query(mut filter): Query<ProgressSummaryFilter>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    if user.is_student() {
        filter.user_id = Some(user.user_id());
    }

    let summary = ProgressSummary::compute(state.pool(), &filter)
        .await
        .map_err(|e| WebError::resource_fetch_error(StudentProgress::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(summary)))
}

#[utoipa::path(
    get,
    path = "/api/v1/student-progress/lesson/{lesson_id}",
    params(("lesson_id" = Uuid, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Progress on the lesson blocks with latest attempts", body = Vec<LessonProgressRow>),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "student-progress"
)]
async fn progress_by_lesson_handler(
    ctx: RequestContext,
    Path(lesson_id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = find_lesson(&state, user, lesson_id).await?;
    let only = user.is_student().then(|| user.user_id());

    let rows = LessonProgressRow::all_by_lesson(state.pool(), lesson.id(), only)
        .await
        .map_err(|e| WebError::resource_fetch_error(StudentProgress::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/student-progress/{id}",
    params(("id" = Uuid, Path, description = "Progress id")),
    responses(
        (status = 200, description = "Progress found", body = StudentProgress),
        (status = 403, description = "Someone else's progress", body = ErrorResponse),
        (status = 404, description = "Progress not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "student-progress"
)]
async fn progress_get_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let progress = find_progress(&state, user, id).await?;
    Ok((StatusCode::OK, Json(progress)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/student-progress/{id}",
    params(("id" = Uuid, Path, description = "Progress id")),
    request_body = ProgressStatusBody,
    responses(
        (status = 200, description = "Status changed", body = StudentProgress),
        (status = 403, description = "Someone else's progress", body = ErrorResponse),
        (status = 404, description = "Progress not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "student-progress"
)]
async fn progress_update_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ProgressStatusBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let progress = find_progress(&state, user, id).await?;

    let updated = progress
        .set_status(state.pool(), payload.status)
        .await
        .map_err(|e| WebError::resource_fetch_error(StudentProgress::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/student-progress/{id}",
    params(("id" = Uuid, Path, description = "Progress id")),
    responses(
        (status = 204, description = "Progress deleted"),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 404, description = "Progress not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "student-progress"
)]
async fn progress_delete_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_admin(StudentProgress::get_resource_type())?;
    let progress = find_progress(&state, user, id).await?;

    progress
        .delete(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(StudentProgress::get_resource_type(), e))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/student-progress/quiz-attempt",
    request_body = QuizAttemptRecordBody,
    responses(
        (status = 201, description = "Attempt recorded", body = QuizAttempt),
        (status = 403, description = "Someone else's progress", body = ErrorResponse),
        (status = 404, description = "Progress not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "student-progress"
)]
async fn progress_record_attempt_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<QuizAttemptRecordBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    validate_body(&payload, QuizAttempt::get_resource_type())?;
    let progress = find_progress(&state, user, payload.student_progress_id).await?;

    let attempt = QuizAttempt::record(
        state.pool(),
        progress.id(),
        payload.score,
        payload.is_pass,
        payload.statement,
    )
    .await
    .map_err(|e| WebError::resource_fetch_error(QuizAttempt::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(attempt)))
}

#[utoipa::path(
    get,
    path = "/api/v1/student-progress/{id}/quiz-attempts",
    params(("id" = Uuid, Path, description = "Progress id")),
    responses(
        (status = 200, description = "Attempts, newest first", body = Vec<QuizAttempt>),
        (status = 403, description = "Someone else's progress", body = ErrorResponse),
        (status = 404, description = "Progress not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "student-progress"
)]
async fn progress_attempts_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let progress = find_progress(&state, user, id).await?;

    let attempts = QuizAttempt::all_by_progress(state.pool(), progress.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizAttempt::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(attempts)))
}
