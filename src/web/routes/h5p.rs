use std::path::Path as FsPath;

use axum::{
    Json, Router,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde_json::json;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::{
    Config,
    h5p::{self, H5pError, H5pPackage, InstallReport, PackageInfo, PackageValidation},
    model::{
        CrudRepository, PaginatableRepository, ResourceType, ResourceTyped, check_access,
        entity::{
            ContentScope, H5pContent, H5pContentCreateUpdate, H5pContentTypeRow, H5pLibrary, H5pTemporaryFile,
            H5pTemporaryFileCreate, TemporaryFileStats,
        },
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::{
            h5p::{CleanupResponse, ExtendQuery, H5pContentCreateBody, H5pContentUpdateBody, HealthResponse},
            validate_body,
        },
        error::ErrorResponse,
        middlewares,
        routes::PaginationQuery,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/content", get(h5p_content_list_handler).post(h5p_content_create_handler))
        .route(
            "/content/{id}",
            get(h5p_content_get_handler)
                .put(h5p_content_update_handler)
                .delete(h5p_content_delete_handler),
        )
        .route("/page-block/{id}/content", get(h5p_page_block_content_handler))
        .route("/page/{id}/content", get(h5p_page_content_handler))
        .route("/lesson/{id}/content", get(h5p_lesson_content_handler))
        .route("/book/{id}/content", get(h5p_book_content_handler))
        .route("/class/{id}/content", get(h5p_class_content_handler))
        .route("/libraries", get(h5p_libraries_handler))
        .route("/content-types", get(h5p_content_types_handler))
        .route("/files", get(h5p_files_list_handler).post(h5p_files_upload_handler))
        .route("/files/cleanup", post(h5p_files_cleanup_handler))
        .route(
            "/files/{id}",
            get(h5p_files_download_handler).delete(h5p_files_delete_handler),
        )
        .route("/files/{id}/extend", patch(h5p_files_extend_handler))
        .route("/files-stats", get(h5p_files_stats_handler))
        .route("/upload", post(h5p_upload_handler))
        .route("/package-info", post(h5p_package_info_handler))
        .route("/validate", post(h5p_validate_handler))
        .route("/export/{id}", get(h5p_export_handler))
        .route("/health", get(h5p_health_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

/// A file received through a multipart form.
struct Upload {
    filename: String,
    mimetype: String,
    bytes: Vec<u8>,
}

/// Reads the first file field of the form, rejecting files above the configured limit.
async fn read_upload(mut multipart: Multipart, r#type: ResourceType) -> WebResult<Upload> {
    let max = Config::get_or_init(false).await.h5p().max_file_size();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WebError::resource_bad_request(r#type, format!("invalid multipart body: {e}")))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mimetype = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| WebError::resource_bad_request(r#type, format!("unable to read upload: {e}")))?;

        if bytes.len() > max {
            return Err(WebError::h5p_error(H5pError::TooLarge {
                size: bytes.len(),
                max,
            }));
        }

        return Ok(Upload {
            filename,
            mimetype,
            bytes: bytes.to_vec(),
        });
    }

    Err(WebError::resource_bad_request(r#type, "no file was uploaded"))
}

async fn max_extracted() -> usize {
    Config::get_or_init(false).await.h5p().max_extracted_size()
}

pub(crate) async fn find_content(state: &AppState, user: &AuthenticatedUser, id: Uuid) -> WebResult<H5pContent> {
    H5pContent::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(H5pContent::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(H5pContent::get_resource_type()))
}

fn can_view(user: &AuthenticatedUser, content: &H5pContent) -> bool {
    user.is_staff() || content.is_public() || content.uploader_id() == user.user_id()
}

async fn find_temp_file(state: &AppState, id: Uuid) -> WebResult<H5pTemporaryFile> {
    H5pTemporaryFile::find_by_id(state.pool(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(H5pTemporaryFile::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(H5pTemporaryFile::get_resource_type()))
}

async fn contents_in_scope(state: &AppState, scope: ContentScope) -> WebResult<Vec<H5pContent>> {
    H5pContent::all_in_scope(state.pool(), scope)
        .await
        .map_err(|e| WebError::resource_fetch_error(H5pContent::get_resource_type(), e))
}

#[utoipa::path(
    post,
    path = "/api/v1/h5p/content",
    request_body = H5pContentCreateBody,
    responses(
        (status = 201, description = "Content created", body = H5pContent),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_content_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<H5pContentCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(H5pContent::get_resource_type())?;
    validate_body(&payload, H5pContent::get_resource_type())?;

    let data = H5pContentCreateUpdate {
        title: payload.title,
        library: payload.library,
        params: payload.params,
        metadata: payload.metadata.unwrap_or_else(|| json!({})),
        is_public: payload.is_public,
    };
    let created = H5pContent::create(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(H5pContent::get_resource_type(), e))?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/h5p/content",
    params(PaginationQuery),
    description = "Public content and own uploads; staff see everything",
    responses(
        (status = 200, description = "Page of contents", body = crate::model::Page<H5pContent>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_content_list_handler(
    ctx: RequestContext,
    Query(page): Query<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;

    let (limit, offset) = page.bounds();
    let contents = H5pContent::page(state.pool(), user, limit, offset)
        .await
        .map_err(|e| WebError::resource_fetch_error(H5pContent::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(contents)))
}

#[utoipa::path(
    get,
    path = "/api/v1/h5p/content/{id}",
    params(("id" = Uuid, Path, description = "Content id")),
    responses(
        (status = 200, description = "Content found", body = H5pContent),
        (status = 403, description = "Private content of another user", body = ErrorResponse),
        (status = 404, description = "Content not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_content_get_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let content = find_content(&state, user, id).await?;
    if !can_view(user, &content) {
        return Err(WebError::resource_forbidden(H5pContent::get_resource_type()));
    }

    Ok((StatusCode::OK, Json(content)))
}

#[utoipa::path(
    put,
    path = "/api/v1/h5p/content/{id}",
    params(("id" = Uuid, Path, description = "Content id")),
    request_body = H5pContentUpdateBody,
    responses(
        (status = 200, description = "Content updated", body = H5pContent),
        (status = 403, description = "Only the uploader or an admin", body = ErrorResponse),
        (status = 404, description = "Content not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_content_update_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<H5pContentUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    validate_body(&payload, H5pContent::get_resource_type())?;
    let content = find_content(&state, user, id).await?;
    check_access(state.pool(), user, &content)
        .await
        .map_err(|e| WebError::resource_access_error(H5pContent::get_resource_type(), e))?;

    let mut data = H5pContentCreateUpdate::from(&content);
    if let Some(title) = payload.title {
        data.title = title;
    }
    if let Some(library) = payload.library {
        data.library = library;
    }
    if let Some(params) = payload.params {
        data.params = params;
    }
    if let Some(metadata) = payload.metadata {
        data.metadata = metadata;
    }
    if let Some(is_public) = payload.is_public {
        data.is_public = is_public;
    }

    let updated = content
        .update(state.pool(), user, data)
        .await
        .map_err(|e| WebError::resource_fetch_error(H5pContent::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/h5p/content/{id}",
    params(("id" = Uuid, Path, description = "Content id")),
    responses(
        (status = 204, description = "Content and its files deleted"),
        (status = 403, description = "Only the uploader or an admin", body = ErrorResponse),
        (status = 404, description = "Content not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_content_delete_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let content = find_content(&state, user, id).await?;
    check_access(state.pool(), user, &content)
        .await
        .map_err(|e| WebError::resource_access_error(H5pContent::get_resource_type(), e))?;

    let content_id = content.id();
    content
        .delete(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(H5pContent::get_resource_type(), e))?;
    state
        .storage()
        .remove_content(content_id)
        .await
        .map_err(WebError::h5p_error)?;

    tracing::info!("user {} deleted h5p content {content_id}", user.user_id());
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/h5p/page-block/{id}/content",
    params(("id" = Uuid, Path, description = "Page block id")),
    responses((status = 200, description = "Contents used by the block", body = Vec<H5pContent>)),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_page_block_content_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?;
    let contents = contents_in_scope(&state, ContentScope::PageBlock(id)).await?;
    Ok((StatusCode::OK, Json(contents)))
}

#[utoipa::path(
    get,
    path = "/api/v1/h5p/page/{id}/content",
    params(("id" = Uuid, Path, description = "Page id")),
    responses((status = 200, description = "Contents used on the page", body = Vec<H5pContent>)),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_page_content_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?;
    let contents = contents_in_scope(&state, ContentScope::Page(id)).await?;
    Ok((StatusCode::OK, Json(contents)))
}

#[utoipa::path(
    get,
    path = "/api/v1/h5p/lesson/{id}/content",
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses((status = 200, description = "Contents used in the lesson", body = Vec<H5pContent>)),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_lesson_content_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?;
    let contents = contents_in_scope(&state, ContentScope::Lesson(id)).await?;
    Ok((StatusCode::OK, Json(contents)))
}

#[utoipa::path(
    get,
    path = "/api/v1/h5p/book/{id}/content",
    params(("id" = Uuid, Path, description = "Book id")),
    responses((status = 200, description = "Contents used in the book", body = Vec<H5pContent>)),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_book_content_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?;
    let contents = contents_in_scope(&state, ContentScope::Book(id)).await?;
    Ok((StatusCode::OK, Json(contents)))
}

#[utoipa::path(
    get,
    path = "/api/v1/h5p/class/{id}/content",
    params(("id" = Uuid, Path, description = "Class id")),
    responses((status = 200, description = "Contents used in the books of the class", body = Vec<H5pContent>)),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_class_content_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?;
    let contents = contents_in_scope(&state, ContentScope::Class(id)).await?;
    Ok((StatusCode::OK, Json(contents)))
}

#[utoipa::path(
    get,
    path = "/api/v1/h5p/libraries",
    responses(
        (status = 200, description = "Installed libraries", body = Vec<H5pLibrary>),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_libraries_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(H5pLibrary::get_resource_type())?;

    let libraries = H5pLibrary::all(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(H5pLibrary::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(libraries)))
}

#[utoipa::path(
    get,
    path = "/api/v1/h5p/content-types",
    responses(
        (status = 200, description = "Latest version of every runnable library", body = Vec<H5pContentTypeRow>),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_content_types_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(H5pLibrary::get_resource_type())?;

    let types = H5pLibrary::content_types(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(H5pLibrary::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(types)))
}

#[utoipa::path(
    post,
    path = "/api/v1/h5p/files",
    request_body(content_type = "multipart/form-data", description = "A single file field"),
    responses(
        (status = 201, description = "File stored", body = H5pTemporaryFile),
        (status = 400, description = "No file or file too large", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_files_upload_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    multipart: Multipart,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(H5pTemporaryFile::get_resource_type())?;
    let upload = read_upload(multipart, H5pTemporaryFile::get_resource_type()).await?;

    let path = state
        .storage()
        .store_temp(&upload.filename, &upload.bytes)
        .await
        .map_err(WebError::h5p_error)?;

    let data = H5pTemporaryFileCreate {
        filename: upload.filename,
        path: path.to_string_lossy().into_owned(),
        size: upload.bytes.len() as i64,
        mimetype: upload.mimetype,
        expiration_hours: Config::get_or_init(false).await.h5p().temp_expiration_hours(),
    };
    let created = match H5pTemporaryFile::create(state.pool(), user, data).await {
        Ok(created) => created,
        Err(e) => {
            if let Err(cleanup) = state.storage().remove_file(&path).await {
                tracing::warn!("unable to remove orphaned upload {}: {cleanup}", path.display());
            }
            return Err(WebError::resource_fetch_error(H5pTemporaryFile::get_resource_type(), e));
        }
    };

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/h5p/files",
    responses(
        (status = 200, description = "Own files that have not expired", body = Vec<H5pTemporaryFile>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_files_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;

    let files = H5pTemporaryFile::all_active_by_user(state.pool(), user.user_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(H5pTemporaryFile::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(files)))
}

#[utoipa::path(
    get,
    path = "/api/v1/h5p/files/{id}",
    params(("id" = Uuid, Path, description = "Temporary file id")),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 404, description = "File not found or expired", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_files_download_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?;
    let file = find_temp_file(&state, id).await?;
    if file.is_expired() {
        return Err(WebError::resource_not_found_with(
            H5pTemporaryFile::get_resource_type(),
            "file has expired",
        ));
    }

    let handle = tokio::fs::File::open(file.path())
        .await
        .map_err(WebError::server_io_error)?;
    let body = Body::from_stream(ReaderStream::new(handle));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.mimetype().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename()),
            ),
        ],
        body,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/h5p/files/{id}",
    params(("id" = Uuid, Path, description = "Temporary file id")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 403, description = "Only the uploader or an admin", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_files_delete_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let file = find_temp_file(&state, id).await?;
    check_access(state.pool(), user, &file)
        .await
        .map_err(|e| WebError::resource_access_error(H5pTemporaryFile::get_resource_type(), e))?;

    let path = file.path().to_string();
    file.delete(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(H5pTemporaryFile::get_resource_type(), e))?;
    state
        .storage()
        .remove_file(FsPath::new(&path))
        .await
        .map_err(WebError::h5p_error)?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    patch,
    path = "/api/v1/h5p/files/{id}/extend",
    params(("id" = Uuid, Path, description = "Temporary file id"), ExtendQuery),
    responses(
        (status = 200, description = "Expiry pushed back", body = H5pTemporaryFile),
        (status = 400, description = "Hours must be positive", body = ErrorResponse),
        (status = 403, description = "Only the uploader or an admin", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_files_extend_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Query(query): Query<ExtendQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let hours = match query.hours {
        Some(hours) => hours,
        None => Config::get_or_init(false).await.h5p().temp_expiration_hours(),
    };
    if hours <= 0 {
        return Err(WebError::resource_bad_request(
            H5pTemporaryFile::get_resource_type(),
            "hours must be positive",
        ));
    }

    let file = find_temp_file(&state, id).await?;
    check_access(state.pool(), user, &file)
        .await
        .map_err(|e| WebError::resource_access_error(H5pTemporaryFile::get_resource_type(), e))?;

    let extended = file
        .extend(state.pool(), hours)
        .await
        .map_err(|e| WebError::resource_fetch_error(H5pTemporaryFile::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(extended)))
}

#[utoipa::path(
    get,
    path = "/api/v1/h5p/files-stats",
    responses(
        (status = 200, description = "Temporary file counters", body = TemporaryFileStats),
        (status = 403, description = "Admin only", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_files_stats_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_admin(H5pTemporaryFile::get_resource_type())?;

    let stats = H5pTemporaryFile::stats(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(H5pTemporaryFile::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(stats)))
}

#[utoipa::path(
    post,
    path = "/api/v1/h5p/files/cleanup",
    responses(
        (status = 200, description = "Expired files removed", body = CleanupResponse),
        (status = 403, description = "Admin only", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_files_cleanup_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_admin(H5pTemporaryFile::get_resource_type())?;

    let expired = H5pTemporaryFile::all_expired(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(H5pTemporaryFile::get_resource_type(), e))?;

    let mut removed_files = 0;
    for file in expired {
        let path = file.path().to_string();
        if let Err(e) = state.storage().remove_file(FsPath::new(&path)).await {
            tracing::warn!("unable to remove expired file {path}: {e}");
            continue;
        }
        file.delete(state.pool())
            .await
            .map_err(|e| WebError::resource_fetch_error(H5pTemporaryFile::get_resource_type(), e))?;
        removed_files += 1;
    }

    tracing::info!("removed {removed_files} expired temporary files");
    Ok((StatusCode::OK, Json(CleanupResponse { removed_files })))
}

#[utoipa::path(
    post,
    path = "/api/v1/h5p/upload",
    request_body(content_type = "multipart/form-data", description = "An .h5p package"),
    responses(
        (status = 201, description = "Libraries installed and content created", body = InstallReport),
        (status = 400, description = "Not a valid H5P package", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_upload_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    multipart: Multipart,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(ResourceType::H5pPackage)?;
    let upload = read_upload(multipart, ResourceType::H5pPackage).await?;

    let report = h5p::install_package(state.pool(), state.storage(), user, &upload.bytes, max_extracted().await)
        .await
        .map_err(WebError::h5p_error)?;

    tracing::info!(
        "user {} uploaded {}: {} libraries installed, {} errors",
        user.user_id(),
        upload.filename,
        report.libraries_installed,
        report.errors.len()
    );
    Ok((StatusCode::CREATED, Json(report)))
}

#[utoipa::path(
    post,
    path = "/api/v1/h5p/package-info",
    request_body(content_type = "multipart/form-data", description = "An .h5p package"),
    responses(
        (status = 200, description = "Package metadata", body = PackageInfo),
        (status = 400, description = "Not a readable H5P package", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_package_info_handler(
    ctx: RequestContext,
    multipart: Multipart,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(ResourceType::H5pPackage)?;
    let upload = read_upload(multipart, ResourceType::H5pPackage).await?;

    let info = H5pPackage::from_bytes(&upload.bytes, max_extracted().await)
        .and_then(|package| package.info())
        .map_err(WebError::h5p_error)?;

    Ok((StatusCode::OK, Json(info)))
}

#[utoipa::path(
    post,
    path = "/api/v1/h5p/validate",
    request_body(content_type = "multipart/form-data", description = "An .h5p package"),
    responses(
        (status = 200, description = "Validation outcome", body = PackageValidation),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_validate_handler(
    ctx: RequestContext,
    multipart: Multipart,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(ResourceType::H5pPackage)?;
    let upload = read_upload(multipart, ResourceType::H5pPackage).await?;

    let errors = match H5pPackage::from_bytes(&upload.bytes, max_extracted().await) {
        Ok(package) => package.validate(),
        Err(e) => vec![format!("Invalid package archive: {e}")],
    };

    Ok((
        StatusCode::OK,
        Json(PackageValidation {
            valid: errors.is_empty(),
            errors,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/h5p/export/{id}",
    params(("id" = Uuid, Path, description = "Content id")),
    responses(
        (status = 200, description = "The content as an .h5p package", content_type = "application/zip"),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Content not found", body = ErrorResponse),
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "h5p"
)]
async fn h5p_export_handler(
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_staff(ResourceType::H5pPackage)?;
    let content = find_content(&state, user, id).await?;

    let archive = h5p::export_content(state.storage(), &content)
        .await
        .map_err(WebError::h5p_error)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"content-{}.h5p\"", content.id()),
            ),
        ],
        archive,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/h5p/health",
    responses(
        (status = 200, description = "Service status with library and content counts", body = HealthResponse),
    ),
    tag = "h5p"
)]
async fn h5p_health_handler(State(state): State<AppState>) -> WebResult<impl IntoResponse> {
    let libraries = H5pLibrary::count_all(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(H5pLibrary::get_resource_type(), e))?;
    let contents = H5pContent::count_all(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(H5pContent::get_resource_type(), e))?;

    Ok((
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            libraries,
            contents,
        }),
    ))
}
