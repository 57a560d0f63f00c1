//! Request and response bodies of the REST API.

use validator::Validate;

use crate::{
    model::ResourceType,
    web::{WebError, WebResult},
};

pub mod auth;
pub mod books;
pub mod classes;
pub mod h5p;
pub mod lessons;
pub mod pages;
pub mod progress;
pub mod quiz;
pub mod tracking;
pub mod tts;
pub mod users;

/// Runs the `validator` rules of a request body.
pub fn validate_body<T: Validate>(body: &T, r#type: ResourceType) -> WebResult<()> {
    body.validate()
        .map_err(|errors| WebError::invalid_body(r#type, errors))
}
