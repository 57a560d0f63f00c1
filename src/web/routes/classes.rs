use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    model::{
        CrudRepository, ResourceType, ResourceTyped,
        entity::{
            Book, BookFilter, ClassMemberRow, ClassMembership, ClassSummaryRow, SchoolClass,
            SchoolClassCreateUpdate, UserEntity,
        },
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, UserRole, WebError, WebResult,
        dto::{
            classes::{AddStudentBody, ClassCreateUpdateBody},
            validate_body,
        },
        error::ErrorResponse,
        middlewares,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", get(classes_list_handler).post(classes_create_handler))
        .route(
            "/{id}",
            get(classes_get_handler)
                .put(classes_update_handler)
                .delete(classes_delete_handler),
        )
        .route("/{id}/members", get(classes_members_handler))
        .route("/{id}/books", get(classes_books_handler))
        .route("/{id}/available-students", get(classes_available_students_handler))
        .route("/{id}/students", post(classes_add_student_handler))
        .route("/{id}/students/{user_id}", delete(classes_remove_student_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

pub(crate) async fn find_class(state: &AppState, user: &AuthenticatedUser, id: Uuid) -> WebResult<SchoolClass> {
    SchoolClass::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(SchoolClass::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(SchoolClass::get_resource_type()))
}

/// Another class already using `grade_level`, if any.
async fn grade_taken(state: &AppState, grade_level: i32, except: Option<Uuid>) -> WebResult<bool> {
    let existing = SchoolClass::find_by_grade(state.pool(), grade_level)
        .await
        .map_err(|e| WebError::resource_fetch_error(SchoolClass::get_resource_type(), e))?;
    Ok(existing.is_some_and(|class| Some(class.id()) != except))
}

#[utoipa::path(
    post,
    path = "/api/v1/classes",
    request_body = ClassCreateUpdateBody,
    responses(
        (status = 201, description = "Class created", body = SchoolClass),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 409, description = "A class for this grade already exists", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "classes"
)]
async fn classes_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<ClassCreateUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(SchoolClass::get_resource_type())?;
    validate_body(&payload, SchoolClass::get_resource_type())?;

    if grade_taken(&state, payload.grade_level, None).await? {
        return Err(WebError::resource_conflict(
            SchoolClass::get_resource_type(),
            format!("a class for grade {} already exists", payload.grade_level),
        ));
    }

    let data = SchoolClassCreateUpdate {
        name: payload.name,
        grade_level: payload.grade_level,
        description: payload.description,
    };
    let created = SchoolClass::create(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(SchoolClass::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/classes",
    responses(
        (status = 200, description = "Classes ordered by grade", body = Vec<ClassSummaryRow>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "classes"
)]
async fn classes_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?;

    let classes = ClassSummaryRow::all(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(SchoolClass::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(classes)))
}

#[utoipa::path(
    get,
    path = "/api/v1/classes/{id}",
    params(("id" = Uuid, Path, description = "Class id")),
    responses(
        (status = 200, description = "Class with counters", body = ClassSummaryRow),
        (status = 404, description = "Class not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "classes"
)]
async fn classes_get_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?;

    let class = ClassSummaryRow::find_by_id(state.pool(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(SchoolClass::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(SchoolClass::get_resource_type()))?;

    Ok((StatusCode::OK, Json(class)))
}

#[utoipa::path(
    get,
    path = "/api/v1/classes/{id}/members",
    params(("id" = Uuid, Path, description = "Class id")),
    responses(
        (status = 200, description = "Members of the class", body = Vec<ClassMemberRow>),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Class not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "classes"
)]
async fn classes_members_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(ResourceType::ClassMembership)?;
    let class = find_class(&state, user, id).await?;

    let members = ClassMembership::members(state.pool(), class.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(ResourceType::ClassMembership, e))?;

    Ok((StatusCode::OK, Json(members)))
}

#[utoipa::path(
    get,
    path = "/api/v1/classes/{id}/books",
    params(("id" = Uuid, Path, description = "Class id")),
    responses(
        (status = 200, description = "Books assigned to the class", body = Vec<Book>),
        (status = 404, description = "Class not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "classes"
)]
async fn classes_books_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let class = find_class(&state, user, id).await?;

    let filter = BookFilter {
        class_id: Some(class.id()),
        ..Default::default()
    };
    let books = Book::search(state.pool(), &filter)
        .await
        .map_err(|e| WebError::resource_fetch_error(Book::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(books)))
}

#[utoipa::path(
    get,
    path = "/api/v1/classes/{id}/available-students",
    params(("id" = Uuid, Path, description = "Class id")),
    responses(
        (status = 200, description = "Active students not yet in the class", body = Vec<UserEntity>),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Class not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "classes"
)]
async fn classes_available_students_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(ResourceType::ClassMembership)?;
    let class = find_class(&state, user, id).await?;

    let students = UserEntity::available_students(state.pool(), user, class.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(students)))
}

#[utoipa::path(
    put,
    path = "/api/v1/classes/{id}",
    params(("id" = Uuid, Path, description = "Class id")),
    request_body = ClassCreateUpdateBody,
    responses(
        (status = 200, description = "Class updated", body = SchoolClass),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Class not found", body = ErrorResponse),
        (status = 409, description = "Grade used by another class", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "classes"
)]
async fn classes_update_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ClassCreateUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(SchoolClass::get_resource_type())?;
    validate_body(&payload, SchoolClass::get_resource_type())?;
    let class = find_class(&state, user, id).await?;

    if grade_taken(&state, payload.grade_level, Some(class.id())).await? {
        return Err(WebError::resource_conflict(
            SchoolClass::get_resource_type(),
            format!("a class for grade {} already exists", payload.grade_level),
        ));
    }

    let data = SchoolClassCreateUpdate {
        name: payload.name,
        grade_level: payload.grade_level,
        description: payload.description,
    };
    let updated = class
        .update(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(SchoolClass::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/classes/{id}",
    params(("id" = Uuid, Path, description = "Class id")),
    responses(
        (status = 204, description = "Class deleted"),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 404, description = "Class not found", body = ErrorResponse),
        (status = 409, description = "Books are still assigned", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "classes"
)]
async fn classes_delete_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_admin(SchoolClass::get_resource_type())?;
    let class = find_class(&state, user, id).await?;

    let books = class
        .count_books(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(SchoolClass::get_resource_type(), e))?;
    if books > 0 {
        return Err(WebError::resource_conflict(
            SchoolClass::get_resource_type(),
            format!("{books} book(s) are still assigned to this class"),
        ));
    }

    class
        .delete(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(SchoolClass::get_resource_type(), e))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/classes/{id}/students",
    params(("id" = Uuid, Path, description = "Class id")),
    request_body = AddStudentBody,
    responses(
        (status = 201, description = "Student added", body = ClassMembership),
        (status = 400, description = "User is not a student", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Class or user not found", body = ErrorResponse),
        (status = 409, description = "Already a member", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "classes"
)]
async fn classes_add_student_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<AddStudentBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(ResourceType::ClassMembership)?;
    let class = find_class(&state, user, id).await?;

    let student = UserEntity::find_by_id(state.pool(), user, payload.user_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(UserEntity::get_resource_type()))?;
    if student.role() != UserRole::Student {
        return Err(WebError::resource_bad_request(
            ResourceType::ClassMembership,
            "only students can join a class",
        ));
    }

    let existing = ClassMembership::find(state.pool(), class.id(), student.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(ResourceType::ClassMembership, e))?;
    if existing.is_some() {
        return Err(WebError::resource_conflict(
            ResourceType::ClassMembership,
            "student is already a member of this class",
        ));
    }

    let membership = ClassMembership::create(state.pool(), class.id(), student.id())
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                WebError::resource_conflict(
                    ResourceType::ClassMembership,
                    "student is already a member of this class",
                )
            } else {
                WebError::resource_fetch_error(ResourceType::ClassMembership, e)
            }
        })?;

    Ok((StatusCode::CREATED, Json(membership)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/classes/{id}/students/{user_id}",
    params(
        ("id" = Uuid, Path, description = "Class id"),
        ("user_id" = Uuid, Path, description = "Student id"),
    ),
    responses(
        (status = 204, description = "Student removed"),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Not a member", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "classes"
)]
async fn classes_remove_student_handler(
    ctx: RequestContext,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(ResourceType::ClassMembership)?;

    let membership = ClassMembership::find(state.pool(), id, user_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(ResourceType::ClassMembership, e))?
        .ok_or_else(|| {
            WebError::resource_not_found_with(ResourceType::ClassMembership, "student is not a member of this class")
        })?;

    membership
        .delete(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(ResourceType::ClassMembership, e))?;

    Ok(StatusCode::NO_CONTENT)
}
