use crate::{
    Config,
    web::{AppState, doc::ApiDoc},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
};
use serde::Deserialize;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, services::ServeDir};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod books;
pub mod chapters;
pub mod classes;
pub mod h5p;
pub mod lessons;
pub mod page_blocks;
pub mod pages;
pub mod progress;
pub mod quiz;
pub mod quiz_analytics;
pub mod tracking;
pub mod tts;
pub mod users;

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl PaginationQuery {
    /// Limit clamped to 1..=200, offset to non-negative.
    pub fn bounds(&self) -> (i64, i64) {
        (self.limit.clamp(1, 200), self.offset.max(0))
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    match config.app().frontend_url().parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]),
        Err(_) => {
            tracing::warn!("frontend_url is not a valid origin, falling back to a permissive CORS policy");
            CorsLayer::very_permissive()
        }
    }
}

pub fn build_app<S: Send + Sync + Clone + 'static>(state: AppState, config: &'static Config) -> Router<S> {
    let h5p_body_limit = DefaultBodyLimit::max(config.h5p().max_file_size());

    let mut router = Router::new()
        .nest("/api/v1/auth", auth::routes(state.clone()))
        .nest("/api/v1/users", users::routes(state.clone()))
        .nest("/api/v1/classes", classes::routes(state.clone()))
        .nest("/api/v1/books", books::routes(state.clone()))
        .nest("/api/v1/chapters", chapters::routes(state.clone()))
        .nest("/api/v1/lessons", lessons::routes(state.clone()))
        .nest("/api/v1/pages", pages::routes(state.clone()))
        .nest("/api/v1/page-blocks", page_blocks::routes(state.clone()))
        .nest("/api/v1/h5p", h5p::routes(state.clone()).layer(h5p_body_limit))
        .nest("/api/v1/quiz", quiz::routes(state.clone()))
        .nest("/api/v1/quiz-analytics", quiz_analytics::routes(state.clone()))
        .nest("/api/v1/student-progress", progress::routes(state.clone()))
        .nest("/api/v1/tracking", tracking::routes(state.clone()))
        .nest("/api/v1/tts", tts::routes(state.clone()))
        .nest_service("/uploads", ServeDir::new(config.app().uploads_dir()))
        .layer(CookieManagerLayer::default())
        .layer(cors_layer(config))
        .with_state(state);

    if config.app().docs() {
        let openapi = ApiDoc::openapi();

        router = router.merge(SwaggerUi::new("/api/v1/docs").url("/api-doc/openapi.json", openapi));
    }

    router
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pagination_bounds_are_clamped() {
        let query = PaginationQuery { limit: 10_000, offset: -5 };
        assert_eq!(query.bounds(), (200, 0));

        let query: PaginationQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.bounds(), (50, 0));
    }
}
