use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::model::entity::{AttemptWithStudentRow, QuestionResponse, QuizAnalyticsUpsert, QuizQuestion};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnalytics {
    pub question_id: Uuid,
    pub question_text: String,
    pub total_responses: i64,
    pub correct_responses: i64,
    pub incorrect_responses: i64,
    pub correct_rate: f64,
    pub average_time_spent: f64,
    pub answer_distribution: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentPerformance {
    pub student_id: Uuid,
    pub student_name: String,
    pub total_attempts: i64,
    pub best_score: f64,
    pub average_score: f64,
    pub last_attempt_score: f64,
    pub is_passed: bool,
    pub total_time_spent: i64,
    pub last_attempt_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassQuizAnalytics {
    pub quiz_id: Uuid,
    pub quiz_title: String,
    pub total_students: i64,
    pub students_attempted: i64,
    pub students_passed: i64,
    pub pass_rate: f64,
    pub average_score: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
    pub student_performances: Vec<StudentPerformance>,
    pub question_analytics: Vec<QuestionAnalytics>,
}

/// Bucket of a response in the answer distribution.
fn answer_key(answer: &Value) -> String {
    let picked = answer.get("selectedOption").or_else(|| answer.get("answer"));
    match picked {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "unknown".to_string(),
        Some(other) => other.to_string(),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub fn question_analytics(questions: &[QuizQuestion], responses: &[QuestionResponse]) -> Vec<QuestionAnalytics> {
    questions
        .iter()
        .map(|question| {
            let answered: Vec<&QuestionResponse> =
                responses.iter().filter(|r| r.question_id() == question.id()).collect();
            let total = answered.len() as i64;
            let correct = answered.iter().filter(|r| r.is_correct()).count() as i64;
            let time: i64 = answered.iter().map(|r| r.time_spent() as i64).sum();

            let mut answer_distribution = BTreeMap::new();
            for response in &answered {
                *answer_distribution.entry(answer_key(response.user_answer())).or_insert(0) += 1;
            }

            QuestionAnalytics {
                question_id: question.id(),
                question_text: question.question_text().to_string(),
                total_responses: total,
                correct_responses: correct,
                incorrect_responses: total - correct,
                correct_rate: if total > 0 { correct as f64 / total as f64 * 100.0 } else { 0.0 },
                average_time_spent: if total > 0 { time as f64 / total as f64 } else { 0.0 },
                answer_distribution,
            }
        })
        .collect()
}

fn display_name(row: &AttemptWithStudentRow) -> String {
    let name = [row.first_name.as_deref(), row.last_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() { row.email.clone() } else { name }
}

/// One entry per student; `rows` may come in any order.
pub fn student_performances(rows: &[AttemptWithStudentRow]) -> Vec<StudentPerformance> {
    let mut by_student: BTreeMap<Uuid, Vec<&AttemptWithStudentRow>> = BTreeMap::new();
    for row in rows {
        by_student.entry(row.user_id).or_default().push(row);
    }

    by_student
        .into_values()
        .filter_map(|mut attempts| {
            attempts.sort_by_key(|a| a.attempt_number);
            let last = *attempts.last()?;
            let scores: Vec<f64> = attempts.iter().map(|a| a.score.unwrap_or(0.0)).collect();

            Some(StudentPerformance {
                student_id: last.user_id,
                student_name: display_name(last),
                total_attempts: attempts.len() as i64,
                best_score: scores.iter().copied().fold(0.0, f64::max),
                average_score: mean(&scores),
                last_attempt_score: last.score.unwrap_or(0.0),
                is_passed: last.is_pass,
                total_time_spent: attempts.iter().map(|a| a.duration.unwrap_or(0) as i64).sum(),
                last_attempt_date: last.submitted_at,
            })
        })
        .collect()
}

/// Class view of a quiz, restricted to `members`.
pub fn class_analytics(
    quiz_id: Uuid,
    quiz_title: &str,
    members: &HashSet<Uuid>,
    performances: Vec<StudentPerformance>,
    question_analytics: Vec<QuestionAnalytics>,
) -> ClassQuizAnalytics {
    let student_performances: Vec<StudentPerformance> = performances
        .into_iter()
        .filter(|p| members.contains(&p.student_id))
        .collect();

    let attempted: Vec<&StudentPerformance> =
        student_performances.iter().filter(|p| p.total_attempts > 0).collect();
    let students_attempted = attempted.len() as i64;
    let students_passed = attempted.iter().filter(|p| p.is_passed).count() as i64;
    let best: Vec<f64> = attempted.iter().map(|p| p.best_score).collect();

    ClassQuizAnalytics {
        quiz_id,
        quiz_title: quiz_title.to_string(),
        total_students: members.len() as i64,
        students_attempted,
        students_passed,
        pass_rate: if students_attempted > 0 {
            students_passed as f64 / students_attempted as f64 * 100.0
        } else {
            0.0
        },
        average_score: mean(&best),
        highest_score: best.iter().copied().reduce(f64::max).unwrap_or(0.0),
        lowest_score: best.iter().copied().reduce(f64::min).unwrap_or(0.0),
        student_performances,
        question_analytics,
    }
}

/// Aggregate stored in `quiz_analytics`; `None` when there is no attempt.
pub fn summarize_attempts(rows: &[AttemptWithStudentRow]) -> Option<QuizAnalyticsUpsert> {
    if rows.is_empty() {
        return None;
    }

    let scores: Vec<f64> = rows.iter().map(|r| r.score.unwrap_or(0.0)).collect();
    let durations: Vec<f64> = rows
        .iter()
        .filter_map(|r| r.duration)
        .filter(|d| *d > 0)
        .map(f64::from)
        .collect();
    let passed = rows.iter().filter(|r| r.is_pass).count();

    Some(QuizAnalyticsUpsert {
        total_attempts: rows.len() as i32,
        average_score: mean(&scores),
        highest_score: scores.iter().copied().reduce(f64::max).unwrap_or(0.0),
        lowest_score: scores.iter().copied().reduce(f64::min).unwrap_or(0.0),
        pass_rate: passed as f64 / rows.len() as f64 * 100.0,
        average_time_spent: (!durations.is_empty()).then(|| mean(&durations)),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn attempt(user_id: Uuid, number: i32, score: f64, is_pass: bool, duration: i32) -> AttemptWithStudentRow {
        AttemptWithStudentRow {
            user_id,
            email: "hs@truong.vn".to_string(),
            first_name: Some("An".to_string()),
            last_name: Some("Nguyễn".to_string()),
            attempt_number: number,
            score: Some(score),
            is_pass,
            duration: Some(duration),
            submitted_at: None,
        }
    }

    #[test]
    fn performances_use_last_attempt_for_pass_state() {
        let student = Uuid::new_v4();
        let rows = vec![attempt(student, 2, 40.0, false, 30), attempt(student, 1, 90.0, true, 60)];

        let perf = student_performances(&rows);
        assert_eq!(perf.len(), 1);
        let p = &perf[0];
        assert_eq!(p.student_name, "An Nguyễn");
        assert_eq!(p.total_attempts, 2);
        assert_eq!(p.best_score, 90.0);
        assert_eq!(p.average_score, 65.0);
        assert_eq!(p.last_attempt_score, 40.0);
        assert!(!p.is_passed);
        assert_eq!(p.total_time_spent, 90);
    }

    #[test]
    fn class_view_ignores_non_members() {
        let (a, b, outsider) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let rows = vec![
            attempt(a, 1, 80.0, true, 10),
            attempt(b, 1, 50.0, false, 10),
            attempt(outsider, 1, 100.0, true, 10),
        ];
        let members: HashSet<Uuid> = [a, b, Uuid::new_v4()].into_iter().collect();

        let view = class_analytics(Uuid::nil(), "Ôn tập", &members, student_performances(&rows), Vec::new());
        assert_eq!(view.total_students, 3);
        assert_eq!(view.students_attempted, 2);
        assert_eq!(view.students_passed, 1);
        assert_eq!(view.pass_rate, 50.0);
        assert_eq!(view.highest_score, 80.0);
        assert_eq!(view.lowest_score, 50.0);
        assert_eq!(view.average_score, 65.0);
    }

    #[test]
    fn summary_of_attempts() {
        let user = Uuid::new_v4();
        let rows = vec![attempt(user, 1, 60.0, false, 0), attempt(user, 2, 100.0, true, 40)];
        let summary = summarize_attempts(&rows).unwrap();
        assert_eq!(summary.total_attempts, 2);
        assert_eq!(summary.average_score, 80.0);
        assert_eq!(summary.highest_score, 100.0);
        assert_eq!(summary.lowest_score, 60.0);
        assert_eq!(summary.pass_rate, 50.0);
        assert_eq!(summary.average_time_spent, Some(40.0));

        assert!(summarize_attempts(&[]).is_none());
    }

    #[test]
    fn answer_buckets() {
        assert_eq!(answer_key(&serde_json::json!({ "selectedOption": "b" })), "b");
        assert_eq!(answer_key(&serde_json::json!({ "answer": true })), "true");
        assert_eq!(answer_key(&serde_json::json!({})), "unknown");
    }
}
