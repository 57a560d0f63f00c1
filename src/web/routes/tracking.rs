use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use crate::{
    model::{
        ResourceTyped,
        entity::{
            ContentProgress, TrackingAnalytics, TrackingEvent, TrackingEventCreate, TrackingFilter, TrackingScope,
            calculate_user_progress,
        },
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::{tracking::TrackingCreateBody, validate_body},
        error::ErrorResponse,
        middlewares,
        routes::h5p::find_content,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", get(tracking_list_handler).post(tracking_create_handler))
        .route("/analytics", get(tracking_analytics_handler))
        .route("/progress/{user_id}", get(tracking_progress_handler))
        .route(
            "/{id}",
            get(tracking_get_handler).delete(tracking_delete_handler),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

/// Rows `user` may list given the requested filter.
async fn list_scope(state: &AppState, user: &AuthenticatedUser, filter: &TrackingFilter) -> WebResult<TrackingScope> {
    if user.is_admin() {
        return Ok(filter.user_id.map_or(TrackingScope::All, TrackingScope::Actor));
    }
    if !user.is_staff() {
        return Ok(TrackingScope::Actor(user.user_id()));
    }

    if let Some(content_id) = filter.content_id {
        let content = find_content(state, user, content_id).await?;
        if content.uploader_id() != user.user_id() {
            return Err(WebError::resource_forbidden(TrackingEvent::get_resource_type()));
        }
    }
    Ok(match filter.user_id {
        Some(user_id) => TrackingScope::Actor(user_id),
        None => TrackingScope::ContentOwner(user.user_id()),
    })
}

async fn find_event(state: &AppState, user: &AuthenticatedUser, id: Uuid) -> WebResult<TrackingEvent> {
    let event = TrackingEvent::find_by_id(state.pool(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(TrackingEvent::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(TrackingEvent::get_resource_type()))?;
    if !event.visible_to(user) {
        return Err(WebError::resource_forbidden(TrackingEvent::get_resource_type()));
    }
    Ok(event)
}

#[utoipa::path(
    post,
    path = "/api/v1/tracking",
    request_body = TrackingCreateBody,
    responses(
        (status = 201, description = "Event stored", body = TrackingEvent),
        (status = 400, description = "Statement lacks actor, verb or object", body = ErrorResponse),
        (status = 404, description = "Content not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "tracking"
)]
async fn tracking_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<TrackingCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    validate_body(&payload, TrackingEvent::get_resource_type())?;
    if !payload.statement_is_complete() {
        return Err(WebError::resource_bad_request(
            TrackingEvent::get_resource_type(),
            "statement must contain actor, verb and object",
        ));
    }
    if let Some(content_id) = payload.content_id {
        find_content(&state, user, content_id).await?;
    }

    let data = TrackingEventCreate {
        content_id: payload.content_id,
        verb: payload.verb,
        object_id: payload.object_id,
        statement: payload.statement,
        result: payload.result,
        context: payload.context,
    };
    let event = TrackingEvent::create(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(TrackingEvent::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(event)))
}

#[utoipa::path(
    get,
    path = "/api/v1/tracking",
    params(TrackingFilter),
    responses(
        (status = 200, description = "Visible events, newest first", body = Vec<TrackingEvent>),
        (status = 403, description = "Content uploaded by someone else", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "tracking"
)]
async fn tracking_list_handler(
    ctx: RequestContext,
    Query(filter): Query<TrackingFilter>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let scope = list_scope(&state, user, &filter).await?;

    let events = TrackingEvent::search(state.pool(), scope, &filter)
        .await
        .map_err(|e| WebError::resource_fetch_error(TrackingEvent::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(events)))
}

#[utoipa::path(
    get,
    path = "/api/v1/tracking/analytics",
    params(TrackingFilter),
    responses(
        (status = 200, description = "Aggregated activity", body = TrackingAnalytics),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "tracking"
)]
async fn tracking_analytics_handler(
    ctx: RequestContext,
    Query(mut filter): Query<TrackingFilter>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(TrackingEvent::get_resource_type())?;
    filter.user_id = None;
    let scope = list_scope(&state, user, &filter).await?;

    let analytics = TrackingAnalytics::compute(state.pool(), scope, &filter)
        .await
        .map_err(|e| WebError::resource_fetch_error(TrackingEvent::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(analytics)))
}

#[utoipa::path(
    get,
    path = "/api/v1/tracking/progress/{user_id}",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Progress per content", body = Vec<ContentProgress>),
        (status = 403, description = "Someone else's progress", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "tracking"
)]
async fn tracking_progress_handler(
    ctx: RequestContext,
    Path(user_id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_self_or_staff(user_id, TrackingEvent::get_resource_type())?;

    let events = TrackingEvent::all_by_user(state.pool(), user_id, None)
        .await
        .map_err(|e| WebError::resource_fetch_error(TrackingEvent::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(calculate_user_progress(&events))))
}

#[utoipa::path(
    get,
    path = "/api/v1/tracking/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event found", body = TrackingEvent),
        (status = 403, description = "Not visible to the caller", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "tracking"
)]
async fn tracking_get_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let event = find_event(&state, user, id).await?;
    Ok((StatusCode::OK, Json(event)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/tracking/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "tracking"
)]
async fn tracking_delete_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_admin(TrackingEvent::get_resource_type())?;
    let event = find_event(&state, user, id).await?;

    event
        .delete(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(TrackingEvent::get_resource_type(), e))?;

    Ok(StatusCode::NO_CONTENT)
}
