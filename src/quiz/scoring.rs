use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::model::entity::QuizQuestion;

pub const MULTIPLE_CHOICE: &str = "multiple-choice";
pub const TRUE_FALSE: &str = "true-false";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerCheck {
    pub is_correct: bool,
    pub points_earned: f64,
}

/// Scores `user_answer` against the answer key stored in `metadata`.
///
/// Multiple choice compares `selectedOption` with the id of the option flagged
/// `isCorrect`; true/false compares `answer` with `correctAnswer`. Unknown
/// question types are never correct.
pub fn check_answer(question_type: &str, metadata: &Value, points: f64, user_answer: &Value) -> AnswerCheck {
    let is_correct = match question_type {
        MULTIPLE_CHOICE => match correct_option(metadata) {
            Some(correct) => user_answer.get("selectedOption") == Some(correct),
            None => false,
        },
        TRUE_FALSE => match (user_answer.get("answer"), metadata.get("correctAnswer")) {
            (Some(given), Some(expected)) => given == expected,
            _ => false,
        },
        _ => false,
    };

    AnswerCheck {
        is_correct,
        points_earned: if is_correct { points } else { 0.0 },
    }
}

fn correct_option(metadata: &Value) -> Option<&Value> {
    metadata
        .get("options")?
        .as_array()?
        .iter()
        .find(|opt| opt.get("isCorrect").and_then(Value::as_bool).unwrap_or(false))?
        .get("id")
}

/// The answer key of a question, shown after completion when allowed.
pub fn correct_answer(question_type: &str, metadata: &Value) -> Option<Value> {
    match question_type {
        MULTIPLE_CHOICE => correct_option(metadata).cloned(),
        TRUE_FALSE => metadata.get("correctAnswer").cloned(),
        _ => None,
    }
}

/// A question as handed to a student: no answer key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentQuestion {
    pub id: Uuid,
    pub question_text: String,
    pub question_type: String,
    pub order: i32,
    pub points: f64,
    pub h5p_content_id: Option<Uuid>,
    pub metadata: Value,
}

/// Strips the answer key from `metadata`. Multiple-choice options keep only `id` and `text`;
/// `correctAnswer` is always removed.
pub fn strip_answer_key(question_type: &str, metadata: &Value) -> Value {
    let mut metadata = metadata.clone();
    if let Some(map) = metadata.as_object_mut() {
        map.remove("correctAnswer");
        let options = map
            .get("options")
            .and_then(Value::as_array)
            .filter(|_| question_type == MULTIPLE_CHOICE)
            .map(|options| {
                options
                    .iter()
                    .map(|opt| json!({ "id": opt.get("id"), "text": opt.get("text") }))
                    .collect::<Vec<_>>()
            });
        if let Some(options) = options {
            map.insert("options".to_string(), Value::Array(options));
        }
    }
    metadata
}

pub fn sanitize_questions(questions: &[QuizQuestion], shuffle: bool) -> Vec<StudentQuestion> {
    let mut sanitized: Vec<StudentQuestion> = questions
        .iter()
        .map(|q| StudentQuestion {
            id: q.id(),
            question_text: q.question_text().to_string(),
            question_type: q.question_type().to_string(),
            order: q.order(),
            points: q.points(),
            h5p_content_id: q.h5p_content_id(),
            metadata: strip_answer_key(q.question_type(), q.metadata()),
        })
        .collect();

    if shuffle {
        sanitized.shuffle(&mut rand::rng());
    }
    sanitized
}

/// Earned points as a percentage of the maximum; 0 when nothing can be earned.
pub fn percentage(earned: f64, max: f64) -> f64 {
    if max > 0.0 { earned / max * 100.0 } else { 0.0 }
}

pub fn is_pass(percentage: f64, passing_score: f64) -> bool {
    percentage >= passing_score
}

/// ISO-8601 duration of `seconds`, e.g. `PT1H2M5S`; zero parts are omitted and
/// a zero duration is `PT0S`.
pub fn iso_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if seconds == 0 {
        return "PT0S".to_string();
    }

    let mut out = String::from("PT");
    if h > 0 {
        out.push_str(&format!("{h}H"));
    }
    if m > 0 {
        out.push_str(&format!("{m}M"));
    }
    if s > 0 {
        out.push_str(&format!("{s}S"));
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    fn mc_metadata() -> Value {
        json!({
            "options": [
                { "id": "a", "text": "2", "isCorrect": false },
                { "id": "b", "text": "4", "isCorrect": true },
            ],
            "explanation": "2 + 2 = 4"
        })
    }

    #[test]
    fn multiple_choice_scoring() {
        let metadata = mc_metadata();
        let right = check_answer(MULTIPLE_CHOICE, &metadata, 2.0, &json!({ "selectedOption": "b" }));
        assert_eq!(right, AnswerCheck { is_correct: true, points_earned: 2.0 });

        let wrong = check_answer(MULTIPLE_CHOICE, &metadata, 2.0, &json!({ "selectedOption": "a" }));
        assert_eq!(wrong, AnswerCheck { is_correct: false, points_earned: 0.0 });

        let missing = check_answer(MULTIPLE_CHOICE, &metadata, 2.0, &json!({}));
        assert!(!missing.is_correct);
    }

    #[test]
    fn true_false_scoring() {
        let metadata = json!({ "correctAnswer": false });
        assert!(check_answer(TRUE_FALSE, &metadata, 1.0, &json!({ "answer": false })).is_correct);
        assert!(!check_answer(TRUE_FALSE, &metadata, 1.0, &json!({ "answer": true })).is_correct);
    }

    #[test]
    fn unknown_type_is_never_correct() {
        let check = check_answer("fill-in", &json!({ "correctAnswer": "x" }), 1.0, &json!({ "answer": "x" }));
        assert!(!check.is_correct);
        assert_eq!(check.points_earned, 0.0);
    }

    #[test]
    fn answer_key_is_stripped() {
        let stripped = strip_answer_key(MULTIPLE_CHOICE, &mc_metadata());
        assert_eq!(
            stripped["options"],
            json!([{ "id": "a", "text": "2" }, { "id": "b", "text": "4" }])
        );
        assert_eq!(stripped["explanation"], "2 + 2 = 4");

        let stripped = strip_answer_key(TRUE_FALSE, &json!({ "correctAnswer": true }));
        assert!(stripped.get("correctAnswer").is_none());
    }

    #[test]
    fn correct_answer_lookup() {
        assert_eq!(correct_answer(MULTIPLE_CHOICE, &mc_metadata()), Some(json!("b")));
        assert_eq!(correct_answer(TRUE_FALSE, &json!({ "correctAnswer": true })), Some(json!(true)));
        assert_eq!(correct_answer("essay", &json!({})), None);
    }

    #[test]
    fn percentage_and_pass() {
        assert_eq!(percentage(3.0, 4.0), 75.0);
        assert_eq!(percentage(0.0, 0.0), 0.0);
        assert!(is_pass(70.0, 70.0));
        assert!(!is_pass(69.9, 70.0));
    }

    #[test]
    fn iso_durations() {
        assert_eq!(iso_duration(0), "PT0S");
        assert_eq!(iso_duration(45), "PT45S");
        assert_eq!(iso_duration(60), "PT1M");
        assert_eq!(iso_duration(3725), "PT1H2M5S");
        assert_eq!(iso_duration(7200), "PT2H");
    }
}
