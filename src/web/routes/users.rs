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
    auth::hash_password,
    model::{
        CrudRepository, PaginatableRepository, ResourceTyped,
        entity::{UserEntity, UserEntityCreateUpdate},
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, UserRole, WebError, WebResult,
        dto::{
            users::{UserCreateBody, UserStatsResponse, UserUpdateBody},
            validate_body,
        },
        error::ErrorResponse,
        middlewares,
        routes::PaginationQuery,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", get(users_list_handler).post(users_create_handler))
        .route("/role/{role}", get(users_by_role_handler))
        .route(
            "/{id}",
            get(users_get_handler)
                .patch(users_update_handler)
                .delete(users_delete_handler),
        )
        .route("/{id}/stats", get(users_stats_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

pub(crate) async fn find_user(state: &AppState, ctx: &AuthenticatedUser, id: Uuid) -> WebResult<UserEntity> {
    UserEntity::find_by_id(state.pool(), ctx, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(UserEntity::get_resource_type()))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Page of users", body = crate::model::Page<UserEntity>),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
async fn users_list_handler(
    ctx: RequestContext,
    Query(page): Query<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(UserEntity::get_resource_type())?;

    let (limit, offset) = page.bounds();
    let users = UserEntity::page(state.pool(), user, limit, offset)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(users)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/role/{role}",
    params(("role" = String, Path, description = "ADMIN, TEACHER or STUDENT")),
    responses(
        (status = 200, description = "Users holding the role", body = Vec<UserEntity>),
        (status = 400, description = "Unknown role", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
async fn users_by_role_handler(
    ctx: RequestContext,
    Path(role): Path<String>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(UserEntity::get_resource_type())?;

    let role = UserRole::parse(&role).ok_or_else(|| {
        WebError::resource_bad_request(UserEntity::get_resource_type(), format!("unknown role '{role}'"))
    })?;

    let users = UserEntity::all_by_role(state.pool(), user, role)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(users)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserEntity),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
async fn users_get_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(UserEntity::get_resource_type())?;

    let found = find_user(&state, user, id).await?;
    Ok((StatusCode::OK, Json(found)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/stats",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Profile with activity counters", body = UserStatsResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
async fn users_stats_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(UserEntity::get_resource_type())?;

    let found = find_user(&state, user, id).await?;
    let stats = found
        .stats(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(UserStatsResponse { user: found, stats })))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = UserCreateBody,
    responses(
        (status = 201, description = "User created", body = UserEntity),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 409, description = "Email already in use", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
async fn users_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<UserCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_admin(UserEntity::get_resource_type())?;
    validate_body(&payload, UserEntity::get_resource_type())?;

    let found = UserEntity::find_by_email(state.pool(), user, &payload.email)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;
    if found.is_some() {
        return Err(WebError::registration_conflict());
    }

    let hash = hash_password(&payload.password).map_err(WebError::server_crypt_error)?;
    let data = UserEntityCreateUpdate {
        email: payload.email,
        password_hash: hash,
        first_name: payload.first_name,
        last_name: payload.last_name,
        role: payload.role.unwrap_or(UserRole::Student),
        is_active: true,
        avatar: payload.avatar,
    };

    let created = UserEntity::create(state.pool(), user, data).await.map_err(|e| {
        if e.is_unique_violation() {
            WebError::registration_conflict()
        } else {
            WebError::resource_fetch_error(UserEntity::get_resource_type(), e)
        }
    })?;

    tracing::info!("user {} created {} as {}", user.user_id(), created.id(), created.role());
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateBody,
    responses(
        (status = 200, description = "User updated", body = UserEntity),
        (status = 403, description = "Only the user themself or an admin; role and status are admin only", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Email already in use", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
async fn users_update_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<UserUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    if !user.is_admin() && user.user_id() != id {
        return Err(WebError::resource_forbidden(UserEntity::get_resource_type()));
    }
    if !user.is_admin() && payload.touches_admin_fields() {
        return Err(WebError::resource_forbidden(UserEntity::get_resource_type()));
    }
    validate_body(&payload, UserEntity::get_resource_type())?;

    let mut found = find_user(&state, user, id).await?;

    if let Some(email) = payload.email.as_deref() {
        let taken = UserEntity::find_by_email(state.pool(), user, email)
            .await
            .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?
            .is_some_and(|other| other.id() != id);
        if taken {
            return Err(WebError::registration_conflict());
        }
    }

    if let Some(password) = payload.password.as_deref() {
        let hash = hash_password(password).map_err(WebError::server_crypt_error)?;
        found
            .set_password(state.pool(), hash)
            .await
            .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;
    }

    let mut data = UserEntityCreateUpdate::from(&found);
    if let Some(email) = payload.email {
        data.email = email;
    }
    if let Some(first_name) = payload.first_name {
        data.first_name = Some(first_name);
    }
    if let Some(last_name) = payload.last_name {
        data.last_name = Some(last_name);
    }
    if let Some(avatar) = payload.avatar {
        data.avatar = Some(avatar);
    }
    if let Some(role) = payload.role {
        data.role = role;
    }
    if let Some(is_active) = payload.is_active {
        data.is_active = is_active;
    }

    let updated = found.update(state.pool(), user, data).await.map_err(|e| {
        if e.is_unique_violation() {
            WebError::registration_conflict()
        } else {
            WebError::resource_fetch_error(UserEntity::get_resource_type(), e)
        }
    })?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
async fn users_delete_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_admin(UserEntity::get_resource_type())?;

    let found = find_user(&state, user, id).await?;
    found
        .delete(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    Ok(StatusCode::NO_CONTENT)
}
