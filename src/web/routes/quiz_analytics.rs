use std::collections::HashSet;

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
        entity::{AttemptWithStudentRow, ClassMembership, QuestionResponse, QuizAnalytics, QuizQuestion},
    },
    quiz::analytics::{
        ClassQuizAnalytics, QuestionAnalytics, StudentPerformance, class_analytics, question_analytics,
        student_performances, summarize_attempts,
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::quiz::AnalyticsQuery,
        error::ErrorResponse,
        middlewares,
        routes::{
            classes::find_class,
            quiz::{config_of_block, find_config},
        },
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/quiz/{page_block_id}", get(analytics_quiz_handler))
        .route("/questions/{quiz_config_id}", get(analytics_questions_handler))
        .route("/students/{quiz_config_id}", get(analytics_students_handler))
        .route("/class/{quiz_config_id}/{class_id}", get(analytics_class_handler))
        .route("/calculate/{page_block_id}", post(analytics_calculate_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

async fn questions_with_responses(
    state: &AppState,
    quiz_config_id: Uuid,
) -> WebResult<Vec<QuestionAnalytics>> {
    let questions = QuizQuestion::all_by_quiz_config(state.pool(), quiz_config_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizQuestion::get_resource_type(), e))?;
    let responses = QuestionResponse::all_by_quiz_config(state.pool(), quiz_config_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuestionResponse::get_resource_type(), e))?;
    Ok(question_analytics(&questions, &responses))
}

async fn performances(state: &AppState, page_block_id: Uuid) -> WebResult<Vec<StudentPerformance>> {
    let rows = AttemptWithStudentRow::all_by_page_block(state.pool(), page_block_id, None)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizAnalytics::get_resource_type(), e))?;
    Ok(student_performances(&rows))
}

fn require_staff(user: &AuthenticatedUser) -> WebResult<()> {
    user.require_staff(QuizAnalytics::get_resource_type())
}

#[utoipa::path(
    get,
    path = "/api/v1/quiz-analytics/quiz/{page_block_id}",
    params(("page_block_id" = Uuid, Path, description = "Page block id"), AnalyticsQuery),
    responses(
        (status = 200, description = "Stored analytics", body = QuizAnalytics),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Never calculated", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz-analytics"
)]
async fn analytics_quiz_handler(
    ctx: RequestContext,
    Path(page_block_id): Path<Uuid>,
    Query(query): Query<AnalyticsQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    require_staff(user)?;

    let analytics = QuizAnalytics::find(state.pool(), page_block_id, query.user_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizAnalytics::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(QuizAnalytics::get_resource_type()))?;

    Ok((StatusCode::OK, Json(analytics)))
}

#[utoipa::path(
    get,
    path = "/api/v1/quiz-analytics/questions/{quiz_config_id}",
    params(("quiz_config_id" = Uuid, Path, description = "Quiz config id")),
    responses(
        (status = 200, description = "Per question statistics", body = Vec<QuestionAnalytics>),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Quiz not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz-analytics"
)]
async fn analytics_questions_handler(
    ctx: RequestContext,
    Path(quiz_config_id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    require_staff(user)?;
    let config = find_config(&state, user, quiz_config_id).await?;

    let analytics = questions_with_responses(&state, config.id()).await?;
    Ok((StatusCode::OK, Json(analytics)))
}

#[utoipa::path(
    get,
    path = "/api/v1/quiz-analytics/students/{quiz_config_id}",
    params(("quiz_config_id" = Uuid, Path, description = "Quiz config id")),
    responses(
        (status = 200, description = "Per student performance", body = Vec<StudentPerformance>),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Quiz not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz-analytics"
)]
async fn analytics_students_handler(
    ctx: RequestContext,
    Path(quiz_config_id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    require_staff(user)?;
    let config = find_config(&state, user, quiz_config_id).await?;

    let performances = performances(&state, config.page_block_id()).await?;
    Ok((StatusCode::OK, Json(performances)))
}

#[utoipa::path(
    get,
    path = "/api/v1/quiz-analytics/class/{quiz_config_id}/{class_id}",
    params(
        ("quiz_config_id" = Uuid, Path, description = "Quiz config id"),
        ("class_id" = Uuid, Path, description = "Class id"),
    ),
    responses(
        (status = 200, description = "Quiz results of the class members", body = ClassQuizAnalytics),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Quiz or class not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz-analytics"
)]
async fn analytics_class_handler(
    ctx: RequestContext,
    Path((quiz_config_id, class_id)): Path<(Uuid, Uuid)>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    require_staff(user)?;
    let config = find_config(&state, user, quiz_config_id).await?;
    let class = find_class(&state, user, class_id).await?;

    let members: HashSet<Uuid> = ClassMembership::members(state.pool(), class.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(ClassMembership::get_resource_type(), e))?
        .into_iter()
        .map(|m| m.user_id)
        .collect();

    let analytics = class_analytics(
        config.id(),
        config.title(),
        &members,
        performances(&state, config.page_block_id()).await?,
        questions_with_responses(&state, config.id()).await?,
    );
    Ok((StatusCode::OK, Json(analytics)))
}

#[utoipa::path(
    post,
    path = "/api/v1/quiz-analytics/calculate/{page_block_id}",
    params(("page_block_id" = Uuid, Path, description = "Page block id"), AnalyticsQuery),
    responses(
        (status = 200, description = "Recomputed analytics", body = QuizAnalytics),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "No quiz or no submitted attempt", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz-analytics"
)]
async fn analytics_calculate_handler(
    ctx: RequestContext,
    Path(page_block_id): Path<Uuid>,
    Query(query): Query<AnalyticsQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    require_staff(user)?;
    let config = config_of_block(&state, page_block_id).await?;

    let rows = AttemptWithStudentRow::all_by_page_block(state.pool(), config.page_block_id(), query.user_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizAnalytics::get_resource_type(), e))?;
    let summary = summarize_attempts(&rows).ok_or_else(|| {
        WebError::resource_not_found_with(QuizAnalytics::get_resource_type(), "no submitted attempt to analyze")
    })?;

    let analytics = QuizAnalytics::upsert(state.pool(), config.page_block_id(), query.user_id, &summary)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizAnalytics::get_resource_type(), e))?;
    tracing::info!(
        "quiz analytics recalculated for block {} over {} attempt(s)",
        page_block_id,
        analytics.total_attempts()
    );

    Ok((StatusCode::OK, Json(analytics)))
}
