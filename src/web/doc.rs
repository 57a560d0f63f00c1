use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::web::routes;

/// Registers the two ways a token can be sent: `Authorization: Bearer` and the `SID` cookie.
pub struct AuthSchemesModifier;

impl Modify for AuthSchemesModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(schema) = openapi.components.as_mut() {
            schema.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            schema.add_security_scheme(
                "cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "SID",
                    "JWT token for current user",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "tieuhoc", description = "Elementary school e-learning API"),
    paths(
        routes::auth::auth_register_handler,
        routes::auth::auth_login_handler,
        routes::auth::auth_me_handler,
        routes::users::users_list_handler,
        routes::users::users_by_role_handler,
        routes::users::users_get_handler,
        routes::users::users_stats_handler,
        routes::users::users_create_handler,
        routes::users::users_update_handler,
        routes::users::users_delete_handler,
        routes::classes::classes_create_handler,
        routes::classes::classes_list_handler,
        routes::classes::classes_get_handler,
        routes::classes::classes_members_handler,
        routes::classes::classes_books_handler,
        routes::classes::classes_available_students_handler,
        routes::classes::classes_update_handler,
        routes::classes::classes_delete_handler,
        routes::classes::classes_add_student_handler,
        routes::classes::classes_remove_student_handler,
        routes::books::books_create_handler,
        routes::books::books_list_handler,
        routes::books::books_by_class_handler,
        routes::books::books_by_subject_grade_handler,
        routes::books::books_get_handler,
        routes::books::books_content_handler,
        routes::books::books_update_handler,
        routes::books::books_publish_handler,
        routes::books::books_delete_handler,
        routes::chapters::chapters_create_handler,
        routes::chapters::chapters_by_book_handler,
        routes::chapters::chapters_get_handler,
        routes::chapters::chapters_update_handler,
        routes::chapters::chapters_delete_handler,
        routes::lessons::lessons_create_handler,
        routes::lessons::lessons_search_handler,
        routes::lessons::lessons_by_book_handler,
        routes::lessons::lessons_by_chapter_handler,
        routes::lessons::lessons_get_handler,
        routes::lessons::lessons_pages_handler,
        routes::lessons::lessons_navigation_handler,
        routes::lessons::lessons_update_handler,
        routes::lessons::lessons_delete_handler,
        routes::lessons::lessons_reorder_handler,
        routes::pages::pages_create_handler,
        routes::pages::pages_by_lesson_handler,
        routes::pages::pages_get_handler,
        routes::pages::pages_update_handler,
        routes::pages::pages_delete_handler,
        routes::page_blocks::page_blocks_create_handler,
        routes::page_blocks::page_blocks_by_page_handler,
        routes::page_blocks::page_blocks_search_handler,
        routes::page_blocks::page_blocks_statistics_handler,
        routes::page_blocks::page_blocks_get_handler,
        routes::page_blocks::page_blocks_update_handler,
        routes::page_blocks::page_blocks_delete_handler,
        routes::page_blocks::page_blocks_reorder_handler,
        routes::page_blocks::page_blocks_duplicate_handler,
        routes::h5p::h5p_content_create_handler,
        routes::h5p::h5p_content_list_handler,
        routes::h5p::h5p_content_get_handler,
        routes::h5p::h5p_content_update_handler,
        routes::h5p::h5p_content_delete_handler,
        routes::h5p::h5p_page_block_content_handler,
        routes::h5p::h5p_page_content_handler,
        routes::h5p::h5p_lesson_content_handler,
        routes::h5p::h5p_book_content_handler,
        routes::h5p::h5p_class_content_handler,
        routes::h5p::h5p_libraries_handler,
        routes::h5p::h5p_content_types_handler,
        routes::h5p::h5p_files_upload_handler,
        routes::h5p::h5p_files_list_handler,
        routes::h5p::h5p_files_download_handler,
        routes::h5p::h5p_files_delete_handler,
        routes::h5p::h5p_files_extend_handler,
        routes::h5p::h5p_files_stats_handler,
        routes::h5p::h5p_files_cleanup_handler,
        routes::h5p::h5p_upload_handler,
        routes::h5p::h5p_package_info_handler,
        routes::h5p::h5p_validate_handler,
        routes::h5p::h5p_export_handler,
        routes::h5p::h5p_health_handler,
        routes::quiz::quiz_config_create_handler,
        routes::quiz::quiz_config_by_block_handler,
        routes::quiz::quiz_config_update_handler,
        routes::quiz::quiz_config_delete_handler,
        routes::quiz::quiz_question_create_handler,
        routes::quiz::quiz_question_by_config_handler,
        routes::quiz::quiz_question_update_handler,
        routes::quiz::quiz_question_delete_handler,
        routes::quiz::quiz_attempt_start_handler,
        routes::quiz::quiz_attempt_submit_answer_handler,
        routes::quiz::quiz_attempt_complete_handler,
        routes::quiz::quiz_attempt_history_handler,
        routes::quiz_analytics::analytics_quiz_handler,
        routes::quiz_analytics::analytics_questions_handler,
        routes::quiz_analytics::analytics_students_handler,
        routes::quiz_analytics::analytics_class_handler,
        routes::quiz_analytics::analytics_calculate_handler,
        routes::progress::progress_upsert_handler,
        routes::progress::progress_by_user_handler,
        routes::progress::progress_mine_handler,
        routes::progress::progress_summary_handler,
        routes::progress::progress_by_lesson_handler,
        routes::progress::progress_get_handler,
        routes::progress::progress_update_handler,
        routes::progress::progress_delete_handler,
        routes::progress::progress_record_attempt_handler,
        routes::progress::progress_attempts_handler,
        routes::tracking::tracking_create_handler,
        routes::tracking::tracking_list_handler,
        routes::tracking::tracking_analytics_handler,
        routes::tracking::tracking_progress_handler,
        routes::tracking::tracking_get_handler,
        routes::tracking::tracking_delete_handler,
        routes::tts::tts_generate_handler,
        routes::tts::tts_get_handler,
    ),
    modifiers(&AuthSchemesModifier),
)]
pub struct ApiDoc;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn document_lists_routes_and_schemes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/quiz/attempt/start"));
        assert!(doc.paths.paths.contains_key("/api/v1/h5p/upload"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
        assert!(components.security_schemes.contains_key("cookie"));
    }
}
