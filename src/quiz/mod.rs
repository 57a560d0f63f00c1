//! Quiz scoring, answer-key handling, analytics aggregation and xAPI statements.

pub mod analytics;
pub mod scoring;
pub mod xapi;

pub use scoring::{AnswerCheck, StudentQuestion, check_answer, iso_duration, percentage, sanitize_questions};
