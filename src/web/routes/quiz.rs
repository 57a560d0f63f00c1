use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    model::{
        CrudRepository, ResourceTyped, check_ownership,
        entity::{
            ProgressStatus, QuestionResponse, QuestionResponseCreate, QuizAttempt, QuizAttemptResult, QuizConfig,
            QuizConfigCreateUpdate, QuizQuestion, QuizQuestionCreateUpdate, StudentProgress, XapiResult,
            XapiStatement,
        },
    },
    quiz::{
        check_answer, iso_duration, percentage, sanitize_questions,
        scoring::{correct_answer, is_pass},
        xapi::{self, StatementTarget},
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::{
            quiz::{
                CompleteAttemptBody, CompleteAttemptResponse, QuestionResult, QuizConfigCreateBody,
                QuizConfigUpdateBody, QuizConfigWithQuestions, QuizQuestionCreateBody, QuizQuestionUpdateBody,
                StartAttemptBody, StartAttemptResponse, SubmitAnswerBody, SubmitAnswerResponse,
            },
            validate_body,
        },
        error::ErrorResponse,
        middlewares,
        routes::page_blocks::find_block,
    },
};

/// Maximum score written on a submitted attempt; scores are percentages.
const ATTEMPT_MAX_SCORE: f64 = 100.0;

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/config", post(quiz_config_create_handler))
        .route("/config/page-block/{page_block_id}", get(quiz_config_by_block_handler))
        .route(
            "/config/{id}",
            put(quiz_config_update_handler).delete(quiz_config_delete_handler),
        )
        .route("/question", post(quiz_question_create_handler))
        .route("/question/quiz-config/{quiz_config_id}", get(quiz_question_by_config_handler))
        .route(
            "/question/{id}",
            put(quiz_question_update_handler).delete(quiz_question_delete_handler),
        )
        .route("/attempt/start", post(quiz_attempt_start_handler))
        .route("/attempt/submit-answer", post(quiz_attempt_submit_answer_handler))
        .route("/attempt/complete", post(quiz_attempt_complete_handler))
        .route("/attempt/history/{page_block_id}", get(quiz_attempt_history_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

pub(crate) async fn find_config(state: &AppState, user: &AuthenticatedUser, id: Uuid) -> WebResult<QuizConfig> {
    QuizConfig::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizConfig::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(QuizConfig::get_resource_type()))
}

pub(crate) async fn config_of_block(state: &AppState, page_block_id: Uuid) -> WebResult<QuizConfig> {
    QuizConfig::find_by_page_block(state.pool(), page_block_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizConfig::get_resource_type(), e))?
        .ok_or_else(|| {
            WebError::resource_not_found_with(QuizConfig::get_resource_type(), "no quiz configured for this page block")
        })
}

async fn find_question(state: &AppState, user: &AuthenticatedUser, id: Uuid) -> WebResult<QuizQuestion> {
    QuizQuestion::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizQuestion::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(QuizQuestion::get_resource_type()))
}

async fn questions_of(state: &AppState, quiz_config_id: Uuid) -> WebResult<Vec<QuizQuestion>> {
    QuizQuestion::all_by_quiz_config(state.pool(), quiz_config_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizQuestion::get_resource_type(), e))
}

async fn emit_statement(
    state: &AppState,
    user: &AuthenticatedUser,
    verb: &str,
    target: StatementTarget,
    result: XapiResult,
) -> WebResult<()> {
    xapi::emit(state.pool(), user.user_id(), verb, target, result)
        .await
        .map_err(|e| WebError::resource_fetch_error(XapiStatement::get_resource_type(), e))?;
    Ok(())
}

/// An open attempt of the caller with its progress record and quiz.
struct AttemptScope {
    attempt: QuizAttempt,
    progress: StudentProgress,
    config: QuizConfig,
}

async fn open_attempt(state: &AppState, user: &AuthenticatedUser, attempt_id: Uuid) -> WebResult<AttemptScope> {
    let attempt = QuizAttempt::find_by_id(state.pool(), attempt_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizAttempt::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(QuizAttempt::get_resource_type()))?;

    check_ownership(state.pool(), user, &attempt)
        .await
        .map_err(|e| WebError::resource_access_error(QuizAttempt::get_resource_type(), e))?;

    if attempt.is_submitted() {
        return Err(WebError::resource_bad_request(
            QuizAttempt::get_resource_type(),
            "attempt has already been submitted",
        ));
    }

    let progress = StudentProgress::find_by_id(state.pool(), attempt.student_progress_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(StudentProgress::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(StudentProgress::get_resource_type()))?;
    let config = config_of_block(state, progress.page_block_id()).await?;

    Ok(AttemptScope {
        attempt,
        progress,
        config,
    })
}

fn ensure_in_quiz(config: &QuizConfig, question: &QuizQuestion) -> WebResult<()> {
    if question.quiz_config_id() != config.id() {
        return Err(WebError::resource_bad_request(
            QuizQuestion::get_resource_type(),
            "question is not part of this quiz",
        ));
    }
    Ok(())
}

/// Scores and stores one answer, then emits "answered".
async fn record_answer(
    state: &AppState,
    user: &AuthenticatedUser,
    scope: &AttemptScope,
    question: &QuizQuestion,
    user_answer: serde_json::Value,
    time_spent: Option<i32>,
) -> WebResult<QuestionResponse> {
    let check = check_answer(question.question_type(), question.metadata(), question.points(), &user_answer);
    let response = QuestionResponse::create(
        state.pool(),
        QuestionResponseCreate {
            quiz_attempt_id: scope.attempt.id(),
            question_id: question.id(),
            user_answer: user_answer.clone(),
            is_correct: check.is_correct,
            points_earned: check.points_earned,
            time_spent: time_spent.unwrap_or(0),
        },
    )
    .await
    .map_err(|e| WebError::resource_fetch_error(QuestionResponse::get_resource_type(), e))?;

    emit_statement(
        state,
        user,
        "answered",
        StatementTarget {
            page_block_id: scope.progress.page_block_id(),
            quiz_attempt_id: scope.attempt.id(),
            h5p_content_id: question.h5p_content_id(),
        },
        XapiResult {
            score: Some(check.points_earned),
            max_score: Some(question.points()),
            success: Some(check.is_correct),
            response: Some(user_answer.to_string()),
            duration: time_spent.map(|s| iso_duration(s as i64)),
            ..Default::default()
        },
    )
    .await?;

    Ok(response)
}

#[utoipa::path(
    post,
    path = "/api/v1/quiz/config",
    request_body = QuizConfigCreateBody,
    responses(
        (status = 201, description = "Quiz configured", body = QuizConfig),
        (status = 400, description = "The block already has a quiz", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Page block not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz"
)]
async fn quiz_config_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<QuizConfigCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(QuizConfig::get_resource_type())?;
    validate_body(&payload, QuizConfig::get_resource_type())?;
    let block = find_block(&state, user, payload.page_block_id).await?;

    let existing = QuizConfig::find_by_page_block(state.pool(), block.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizConfig::get_resource_type(), e))?;
    if existing.is_some() {
        return Err(WebError::resource_bad_request(
            QuizConfig::get_resource_type(),
            "page block already has a quiz",
        ));
    }

    let data = QuizConfigCreateUpdate {
        page_block_id: block.id(),
        title: payload.title,
        description: payload.description,
        passing_score: payload.passing_score,
        weight: payload.weight,
        max_attempts: payload.max_attempts,
        time_limit: payload.time_limit,
        shuffle_questions: payload.shuffle_questions,
        show_feedback: payload.show_feedback,
        show_correct_answers: payload.show_correct_answers,
        allow_review: payload.allow_review,
    };
    let created = QuizConfig::create(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizConfig::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/quiz/config/page-block/{page_block_id}",
    params(("page_block_id" = Uuid, Path, description = "Page block id")),
    responses(
        (status = 200, description = "Quiz with its questions", body = QuizConfigWithQuestions),
        (status = 404, description = "No quiz on this block", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz"
)]
async fn quiz_config_by_block_handler(
    ctx: RequestContext,
    Path(page_block_id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let _user = ctx.user()?;
    let config = config_of_block(&state, page_block_id).await?;
    let questions = questions_of(&state, config.id()).await?;

    Ok((StatusCode::OK, Json(QuizConfigWithQuestions { config, questions })))
}

#[utoipa::path(
    put,
    path = "/api/v1/quiz/config/{id}",
    params(("id" = Uuid, Path, description = "Quiz config id")),
    request_body = QuizConfigUpdateBody,
    responses(
        (status = 200, description = "Quiz updated", body = QuizConfig),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Quiz not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz"
)]
async fn quiz_config_update_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<QuizConfigUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(QuizConfig::get_resource_type())?;
    validate_body(&payload, QuizConfig::get_resource_type())?;
    let config = find_config(&state, user, id).await?;

    let mut data = QuizConfigCreateUpdate::from(&config);
    if let Some(title) = payload.title {
        data.title = title;
    }
    if payload.description.is_some() {
        data.description = payload.description;
    }
    if let Some(passing_score) = payload.passing_score {
        data.passing_score = passing_score;
    }
    if let Some(weight) = payload.weight {
        data.weight = weight;
    }
    if payload.max_attempts.is_some() {
        data.max_attempts = payload.max_attempts;
    }
    if payload.time_limit.is_some() {
        data.time_limit = payload.time_limit;
    }
    if let Some(shuffle) = payload.shuffle_questions {
        data.shuffle_questions = shuffle;
    }
    if let Some(show_feedback) = payload.show_feedback {
        data.show_feedback = show_feedback;
    }
    if let Some(show_correct) = payload.show_correct_answers {
        data.show_correct_answers = show_correct;
    }
    if let Some(allow_review) = payload.allow_review {
        data.allow_review = allow_review;
    }

    let updated = config
        .update(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizConfig::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/quiz/config/{id}",
    params(("id" = Uuid, Path, description = "Quiz config id")),
    responses(
        (status = 204, description = "Quiz deleted with its questions"),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Quiz not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz"
)]
async fn quiz_config_delete_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(QuizConfig::get_resource_type())?;
    let config = find_config(&state, user, id).await?;

    config
        .delete(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizConfig::get_resource_type(), e))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/quiz/question",
    request_body = QuizQuestionCreateBody,
    responses(
        (status = 201, description = "Question added", body = QuizQuestion),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Quiz not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz"
)]
async fn quiz_question_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<QuizQuestionCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(QuizQuestion::get_resource_type())?;
    validate_body(&payload, QuizQuestion::get_resource_type())?;
    let config = find_config(&state, user, payload.quiz_config_id).await?;

    let data = QuizQuestionCreateUpdate {
        quiz_config_id: config.id(),
        question_text: payload.question_text,
        question_type: payload.question_type,
        order: payload.order,
        points: payload.points,
        h5p_content_id: payload.h5p_content_id,
        metadata: payload.metadata,
    };
    let created = QuizQuestion::create(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizQuestion::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/quiz/question/quiz-config/{quiz_config_id}",
    params(("quiz_config_id" = Uuid, Path, description = "Quiz config id")),
    responses(
        (status = 200, description = "Questions in order", body = Vec<QuizQuestion>),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Quiz not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz"
)]
async fn quiz_question_by_config_handler(
    ctx: RequestContext,
    Path(quiz_config_id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(QuizQuestion::get_resource_type())?;
    let config = find_config(&state, user, quiz_config_id).await?;
    let questions = questions_of(&state, config.id()).await?;

    Ok((StatusCode::OK, Json(questions)))
}

#[utoipa::path(
    put,
    path = "/api/v1/quiz/question/{id}",
    params(("id" = Uuid, Path, description = "Question id")),
    request_body = QuizQuestionUpdateBody,
    responses(
        (status = 200, description = "Question updated", body = QuizQuestion),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Question not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz"
)]
async fn quiz_question_update_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<QuizQuestionUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(QuizQuestion::get_resource_type())?;
    validate_body(&payload, QuizQuestion::get_resource_type())?;
    let question = find_question(&state, user, id).await?;

    let mut data = QuizQuestionCreateUpdate::from(&question);
    if let Some(text) = payload.question_text {
        data.question_text = text;
    }
    if let Some(question_type) = payload.question_type {
        data.question_type = question_type;
    }
    if let Some(order) = payload.order {
        data.order = order;
    }
    if let Some(points) = payload.points {
        data.points = points;
    }
    if payload.h5p_content_id.is_some() {
        data.h5p_content_id = payload.h5p_content_id;
    }
    if let Some(metadata) = payload.metadata {
        data.metadata = metadata;
    }

    let updated = question
        .update(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizQuestion::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/quiz/question/{id}",
    params(("id" = Uuid, Path, description = "Question id")),
    responses(
        (status = 204, description = "Question deleted"),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Question not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz"
)]
async fn quiz_question_delete_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(QuizQuestion::get_resource_type())?;
    let question = find_question(&state, user, id).await?;

    question
        .delete(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizQuestion::get_resource_type(), e))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/quiz/attempt/start",
    request_body = StartAttemptBody,
    responses(
        (status = 201, description = "Attempt opened", body = StartAttemptResponse),
        (status = 400, description = "No attempts left", body = ErrorResponse),
        (status = 404, description = "No quiz on this block", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz"
)]
async fn quiz_attempt_start_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<StartAttemptBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let config = config_of_block(&state, payload.page_block_id).await?;

    let existing = StudentProgress::find(state.pool(), user.user_id(), config.page_block_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(StudentProgress::get_resource_type(), e))?;
    if let (Some(progress), Some(max_attempts)) = (&existing, config.max_attempts()) {
        let used = QuizAttempt::count_by_progress(state.pool(), progress.id())
            .await
            .map_err(|e| WebError::resource_fetch_error(QuizAttempt::get_resource_type(), e))?;
        if used >= max_attempts as i64 {
            return Err(WebError::resource_bad_request(
                QuizAttempt::get_resource_type(),
                format!("maximum number of attempts ({max_attempts}) reached"),
            ));
        }
    }

    let progress = StudentProgress::upsert(
        state.pool(),
        user.user_id(),
        config.page_block_id(),
        ProgressStatus::InProgress,
    )
    .await
    .map_err(|e| WebError::resource_fetch_error(StudentProgress::get_resource_type(), e))?;
    let attempt = QuizAttempt::start(state.pool(), progress.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizAttempt::get_resource_type(), e))?;

    emit_statement(
        &state,
        user,
        "attempted",
        StatementTarget {
            page_block_id: config.page_block_id(),
            quiz_attempt_id: attempt.id(),
            h5p_content_id: None,
        },
        XapiResult::default(),
    )
    .await?;

    let questions = questions_of(&state, config.id()).await?;
    let total_points: f64 = questions.iter().map(QuizQuestion::points).sum();
    tracing::debug!(
        "user {} started attempt {} on quiz {}",
        user.user_id(),
        attempt.attempt_number(),
        config.id()
    );

    let response = StartAttemptResponse {
        attempt_id: attempt.id(),
        attempt_number: attempt.attempt_number(),
        questions: sanitize_questions(&questions, config.shuffle_questions()),
        time_limit: config.time_limit(),
        total_points,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    post,
    path = "/api/v1/quiz/attempt/submit-answer",
    request_body = SubmitAnswerBody,
    responses(
        (status = 201, description = "Answer recorded", body = SubmitAnswerResponse),
        (status = 400, description = "Attempt submitted or question from another quiz", body = ErrorResponse),
        (status = 403, description = "Attempt of another user", body = ErrorResponse),
        (status = 404, description = "Attempt or question not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz"
)]
async fn quiz_attempt_submit_answer_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<SubmitAnswerBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    validate_body(&payload, QuestionResponse::get_resource_type())?;
    let scope = open_attempt(&state, user, payload.attempt_id).await?;
    let question = find_question(&state, user, payload.question_id).await?;
    ensure_in_quiz(&scope.config, &question)?;

    let response = record_answer(
        &state,
        user,
        &scope,
        &question,
        payload.user_answer,
        payload.time_spent,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitAnswerResponse {
            response_id: response.id(),
            question_id: response.question_id(),
            is_correct: response.is_correct(),
            points_earned: response.points_earned(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/quiz/attempt/complete",
    request_body = CompleteAttemptBody,
    responses(
        (status = 200, description = "Attempt scored and submitted", body = CompleteAttemptResponse),
        (status = 400, description = "Attempt already submitted", body = ErrorResponse),
        (status = 403, description = "Attempt of another user", body = ErrorResponse),
        (status = 404, description = "Attempt not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz"
)]
async fn quiz_attempt_complete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<CompleteAttemptBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let scope = open_attempt(&state, user, payload.attempt_id).await?;
    let questions = questions_of(&state, scope.config.id()).await?;

    let mut answered: HashMap<Uuid, QuestionResponse> = QuestionResponse::all_by_attempt(state.pool(), scope.attempt.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(QuestionResponse::get_resource_type(), e))?
        .into_iter()
        .map(|r| (r.question_id(), r))
        .collect();

    for answer in payload.answers {
        if answered.contains_key(&answer.question_id) {
            continue;
        }
        let Some(question) = questions.iter().find(|q| q.id() == answer.question_id) else {
            return Err(WebError::resource_bad_request(
                QuizQuestion::get_resource_type(),
                "question is not part of this quiz",
            ));
        };
        let response = record_answer(&state, user, &scope, question, answer.user_answer, answer.time_spent).await?;
        answered.insert(question.id(), response);
    }

    let total_points: f64 = questions.iter().map(QuizQuestion::points).sum();
    let earned_points: f64 = answered.values().map(QuestionResponse::points_earned).sum();
    let score = percentage(earned_points, total_points);
    let passed = is_pass(score, scope.config.passing_score());
    let duration = (Utc::now() - scope.attempt.created_at()).num_seconds().max(0);

    let attempt = scope
        .attempt
        .clone()
        .submit(
            state.pool(),
            &QuizAttemptResult {
                score,
                max_score: ATTEMPT_MAX_SCORE,
                is_pass: passed,
                duration: duration as i32,
            },
        )
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizAttempt::get_resource_type(), e))?;

    scope
        .progress
        .clone()
        .record_quiz_outcome(state.pool(), passed)
        .await
        .map_err(|e| WebError::resource_fetch_error(StudentProgress::get_resource_type(), e))?;

    let target = StatementTarget {
        page_block_id: scope.progress.page_block_id(),
        quiz_attempt_id: attempt.id(),
        h5p_content_id: None,
    };
    let result = XapiResult {
        score: Some(score),
        max_score: Some(ATTEMPT_MAX_SCORE),
        success: Some(passed),
        completion: Some(true),
        duration: Some(iso_duration(duration)),
        ..Default::default()
    };
    emit_statement(&state, user, "completed", target, result.clone()).await?;
    emit_statement(&state, user, if passed { "passed" } else { "failed" }, target, result).await?;

    let show_answers = scope.config.show_correct_answers();
    let question_results = questions
        .iter()
        .map(|q| {
            let response = answered.get(&q.id());
            QuestionResult {
                question_id: q.id(),
                question_text: q.question_text().to_string(),
                user_answer: response.map(|r| r.user_answer().clone()),
                is_correct: response.is_some_and(QuestionResponse::is_correct),
                points_earned: response.map(QuestionResponse::points_earned).unwrap_or(0.0),
                points: q.points(),
                correct_answer: if show_answers {
                    correct_answer(q.question_type(), q.metadata())
                } else {
                    None
                },
            }
        })
        .collect();

    tracing::info!(
        "attempt {} of user {} scored {:.1}% ({})",
        attempt.id(),
        user.user_id(),
        score,
        if passed { "passed" } else { "failed" }
    );

    Ok((
        StatusCode::OK,
        Json(CompleteAttemptResponse {
            attempt_id: attempt.id(),
            attempt_number: attempt.attempt_number(),
            score,
            earned_points,
            total_points,
            passing_score: scope.config.passing_score(),
            is_pass: passed,
            duration: duration as i32,
            submitted_at: attempt.submitted_at(),
            question_results,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/quiz/attempt/history/{page_block_id}",
    params(("page_block_id" = Uuid, Path, description = "Page block id")),
    responses(
        (status = 200, description = "Own attempts on this quiz, newest first", body = Vec<QuizAttempt>),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "quiz"
)]
async fn quiz_attempt_history_handler(
    ctx: RequestContext,
    Path(page_block_id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;

    let attempts = QuizAttempt::history(state.pool(), user.user_id(), page_block_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizAttempt::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(attempts)))
}
