// answers.rs
//
// Validates one respondent's full answer set against the survey's question
// set and persists it as a single event. Submissions are append-only.
use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ApiError, FieldErrors};
use crate::models::{Answer, AnswerSubmission, QuestionAnswer};
use crate::questions;

/// Stored string form of one answer value: scalars as-is, sequences as
/// serialized JSON.
fn render_value(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Array(_) => {
            serde_json::to_string(value).map_err(|_| "The answer could not be serialized".to_string())
        }
        Value::Null => Err("The answer may not be null".to_string()),
        Value::Object(_) => Err("The answer must be a scalar or a list".to_string()),
    }
}

/// Check every entry against the survey's question set and render the
/// stored values. Any entry referencing a question outside the survey
/// rejects the whole submission.
pub fn prepare_entries(
    question_ids: &HashSet<Uuid>,
    answers: &HashMap<Uuid, Value>,
) -> Result<Vec<(Uuid, String)>, ApiError> {
    if answers.is_empty() {
        return Err(ApiError::Validation(FieldErrors::of(
            "answers",
            "The answers field is required",
        )));
    }

    let mut errors = FieldErrors::new();
    let mut entries = Vec::with_capacity(answers.len());
    for (question_id, value) in answers {
        if !question_ids.contains(question_id) {
            errors.add(
                format!("answers.{question_id}"),
                "The question does not belong to this survey",
            );
            continue;
        }
        match render_value(value) {
            Ok(rendered) => entries.push((*question_id, rendered)),
            Err(message) => errors.add(format!("answers.{question_id}"), message),
        }
    }

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    entries.sort_by_key(|(id, _)| *id);
    Ok(entries)
}

/// Persist a submission in one transaction: either the session row and
/// every entry land together, or nothing does.
pub async fn store_answer(
    pool: &PgPool,
    survey_id: Uuid,
    submission: &AnswerSubmission,
) -> Result<Answer, ApiError> {
    let known: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM surveys WHERE id = $1)")
        .bind(survey_id)
        .fetch_one(pool)
        .await?;
    if !known {
        return Err(ApiError::NotFound);
    }

    let question_ids = questions::ids_for_survey(pool, survey_id).await?;
    let entries = prepare_entries(&question_ids, &submission.answers)?;

    let now = Utc::now();

    let mut tx = pool.begin().await?;
    let answer = sqlx::query_as::<_, Answer>(
        "INSERT INTO answers (id, survey_id, start_date, end_date)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(survey_id)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    for (question_id, rendered) in entries {
        let row = QuestionAnswer {
            id: Uuid::new_v4(),
            question_id,
            answer_id: answer.id,
            answer: rendered,
        };
        sqlx::query(
            "INSERT INTO question_answers (id, question_id, answer_id, answer) VALUES ($1, $2, $3, $4)",
        )
        .bind(row.id)
        .bind(row.question_id)
        .bind(row.answer_id)
        .bind(&row.answer)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question_set(ids: &[Uuid]) -> HashSet<Uuid> {
        ids.iter().copied().collect()
    }

    #[test]
    fn scalar_and_sequence_values_render() {
        let q1 = Uuid::new_v4();
        let q2 = Uuid::new_v4();
        let answers = HashMap::from([
            (q1, json!("hello")),
            (q2, json!(["A"])),
        ]);

        let entries = prepare_entries(&question_set(&[q1, q2]), &answers).unwrap();
        assert_eq!(entries.len(), 2);

        let by_id: HashMap<Uuid, String> = entries.into_iter().collect();
        assert_eq!(by_id[&q1], "hello");
        assert_eq!(by_id[&q2], "[\"A\"]");
    }

    #[test]
    fn numbers_and_bools_are_stringified() {
        let q = Uuid::new_v4();
        let entries =
            prepare_entries(&question_set(&[q]), &HashMap::from([(q, json!(42))])).unwrap();
        assert_eq!(entries[0].1, "42");

        let entries =
            prepare_entries(&question_set(&[q]), &HashMap::from([(q, json!(true))])).unwrap();
        assert_eq!(entries[0].1, "true");
    }

    #[test]
    fn foreign_question_rejects_whole_submission() {
        let own = Uuid::new_v4();
        let foreign = Uuid::new_v4();
        let answers = HashMap::from([
            (own, json!("fine")),
            (foreign, json!("should not matter")),
        ]);

        let err = prepare_entries(&question_set(&[own]), &answers).unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains(&format!("answers.{foreign}")));
    }

    #[test]
    fn empty_submission_is_rejected() {
        let err = prepare_entries(&question_set(&[]), &HashMap::new()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn null_and_object_values_are_rejected() {
        let q = Uuid::new_v4();
        assert!(prepare_entries(&question_set(&[q]), &HashMap::from([(q, json!(null))])).is_err());
        assert!(
            prepare_entries(&question_set(&[q]), &HashMap::from([(q, json!({"nested": 1}))]))
                .is_err()
        );
    }

    #[test]
    fn entries_come_back_in_stable_order() {
        let mut ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let answers: HashMap<Uuid, Value> =
            ids.iter().map(|id| (*id, json!("v"))).collect();

        let entries = prepare_entries(&ids.iter().copied().collect(), &answers).unwrap();
        ids.sort();
        let got: Vec<Uuid> = entries.into_iter().map(|(id, _)| id).collect();
        assert_eq!(got, ids);
    }
}
