// questions.rs
//
// Reconciles a survey's persisted question set against a submitted list.
// Questions missing from the submission are deleted; unknown ids become
// new rows; ids present on both sides are updated in place.
use std::collections::HashSet;

use serde_json::{json, Value};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{ApiError, FieldErrors};
use crate::models::{Question, QuestionInput, QuestionType};

/// Three-way partition of a submitted question list against the persisted
/// id set. Indices refer to positions in the submitted sequence.
#[derive(Debug, PartialEq, Eq)]
pub struct SyncPlan {
    pub to_delete: Vec<Uuid>,
    pub to_create: Vec<usize>,
    pub to_update: Vec<usize>,
}

pub fn partition(existing: &HashSet<Uuid>, submitted_ids: &[Option<Uuid>]) -> SyncPlan {
    let submitted: HashSet<Uuid> = submitted_ids.iter().flatten().copied().collect();

    let mut to_delete: Vec<Uuid> = existing.difference(&submitted).copied().collect();
    to_delete.sort();

    let mut to_create = Vec::new();
    let mut to_update = Vec::new();
    for (index, id) in submitted_ids.iter().enumerate() {
        match id {
            Some(id) if existing.contains(id) => to_update.push(index),
            // client-generated ids unknown to storage mean "create"
            _ => to_create.push(index),
        }
    }

    SyncPlan {
        to_delete,
        to_create,
        to_update,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuestion {
    pub question_type: QuestionType,
    pub title: String,
    pub description: Option<String>,
    pub data: Value,
}

fn field(index: usize, name: &str) -> String {
    format!("questions[{index}].{name}")
}

/// Collapse a submitted `data` payload into its stored form: an
/// `{"options": [...]}` object for choice types, `{}` for everything else.
/// Payloads that arrive as already-serialized JSON strings are unwrapped
/// first.
fn normalize_data(question_type: QuestionType, raw: &Value) -> Result<Value, String> {
    if !question_type.has_options() {
        return Ok(json!({}));
    }

    let structured = match raw {
        Value::String(s) if s.trim().is_empty() => Value::Null,
        Value::String(s) => serde_json::from_str(s)
            .map_err(|_| "The data field must be valid JSON".to_string())?,
        other => other.clone(),
    };

    let options = match &structured {
        Value::Null => Vec::new(),
        Value::Object(map) => match map.get("options") {
            None => Vec::new(),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(s) => out.push(s.to_string()),
                        None => return Err("The data options must be strings".to_string()),
                    }
                }
                out
            }
            Some(_) => return Err("The data options must be a list".to_string()),
        },
        _ => return Err("The data field must be an object".to_string()),
    };

    Ok(json!({ "options": options }))
}

fn validate_question(
    input: &QuestionInput,
    index: usize,
    errors: &mut FieldErrors,
) -> Option<ValidatedQuestion> {
    let title = match input.title.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => Some(t.to_string()),
        _ => {
            errors.add(field(index, "title"), "The title field is required");
            None
        }
    };

    let question_type = match input.question_type.as_deref() {
        Some(raw) => match QuestionType::parse(raw) {
            Some(qt) => Some(qt),
            None => {
                errors.add(field(index, "type"), format!("Invalid question type \"{raw}\""));
                None
            }
        },
        None => {
            errors.add(field(index, "type"), "The type field is required");
            None
        }
    };

    let data = match (&input.data, question_type) {
        (None, _) => {
            errors.add(field(index, "data"), "The data field must be present");
            None
        }
        (Some(raw), Some(question_type)) => match normalize_data(question_type, raw) {
            Ok(data) => Some(data),
            Err(message) => {
                errors.add(field(index, "data"), message);
                None
            }
        },
        // without a type the payload cannot be normalized
        (Some(_), None) => None,
    };

    Some(ValidatedQuestion {
        title: title?,
        question_type: question_type?,
        description: input.description.clone(),
        data: data?,
    })
}

/// Validate every submitted question up front. Any failure rejects the
/// whole list, with messages for every offending field.
pub fn validate_questions(submitted: &[QuestionInput]) -> Result<Vec<ValidatedQuestion>, ApiError> {
    let mut errors = FieldErrors::new();
    let validated: Vec<Option<ValidatedQuestion>> = submitted
        .iter()
        .enumerate()
        .map(|(index, input)| validate_question(input, index, &mut errors))
        .collect();

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    // no errors were recorded, so every entry validated
    Ok(validated.into_iter().flatten().collect())
}

/// Apply a full synchronization inside the caller's transaction. Created
/// rows get fresh server-side ids; submitted client ids are never reused.
pub async fn sync_questions(
    tx: &mut Transaction<'_, Postgres>,
    survey_id: Uuid,
    existing: &HashSet<Uuid>,
    submitted: &[QuestionInput],
) -> Result<(), ApiError> {
    let validated = validate_questions(submitted)?;
    let submitted_ids: Vec<Option<Uuid>> = submitted.iter().map(|q| q.id).collect();
    let plan = partition(existing, &submitted_ids);

    if !plan.to_delete.is_empty() {
        let answered: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM question_answers WHERE question_id = ANY($1)",
        )
        .bind(&plan.to_delete)
        .fetch_one(&mut **tx)
        .await?;
        if answered > 0 {
            return Err(ApiError::Validation(FieldErrors::of(
                "questions",
                "Questions with recorded answers cannot be removed",
            )));
        }

        sqlx::query("DELETE FROM questions WHERE survey_id = $1 AND id = ANY($2)")
            .bind(survey_id)
            .bind(&plan.to_delete)
            .execute(&mut **tx)
            .await?;
    }

    for &index in &plan.to_create {
        let question = &validated[index];
        sqlx::query(
            "INSERT INTO questions (id, survey_id, question_type, title, description, data)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(survey_id)
        .bind(question.question_type)
        .bind(&question.title)
        .bind(&question.description)
        .bind(&question.data)
        .execute(&mut **tx)
        .await?;
    }

    for &index in &plan.to_update {
        let Some(id) = submitted_ids[index] else {
            continue;
        };
        let question = &validated[index];
        sqlx::query(
            "UPDATE questions SET question_type = $1, title = $2, description = $3, data = $4
             WHERE id = $5 AND survey_id = $6",
        )
        .bind(question.question_type)
        .bind(&question.title)
        .bind(&question.description)
        .bind(&question.data)
        .bind(id)
        .bind(survey_id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

pub async fn ids_for_survey<'e, E>(executor: E, survey_id: Uuid) -> Result<HashSet<Uuid>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM questions WHERE survey_id = $1")
        .bind(survey_id)
        .fetch_all(executor)
        .await?;
    Ok(ids.into_iter().collect())
}

/// Questions in stable insertion order.
pub async fn list_for_survey(pool: &PgPool, survey_id: Uuid) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(
        "SELECT * FROM questions WHERE survey_id = $1 ORDER BY seq",
    )
    .bind(survey_id)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(
        id: Option<Uuid>,
        question_type: &str,
        title: &str,
        data: Option<Value>,
    ) -> QuestionInput {
        QuestionInput {
            id,
            question_type: Some(question_type.to_string()),
            title: Some(title.to_string()),
            description: None,
            data,
        }
    }

    #[test]
    fn partition_of_worked_example() {
        // existing {q1, q2}; submitted [q2, brand-new] =>
        // delete {q1}, update {q2}, create {new}
        let q1 = Uuid::new_v4();
        let q2 = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        let existing: HashSet<Uuid> = [q1, q2].into();

        let plan = partition(&existing, &[Some(q2), Some(fresh)]);

        assert_eq!(plan.to_delete, vec![q1]);
        assert_eq!(plan.to_update, vec![0]);
        assert_eq!(plan.to_create, vec![1]);
    }

    #[test]
    fn partition_treats_missing_ids_as_create() {
        let existing = HashSet::new();
        let plan = partition(&existing, &[None, None]);
        assert!(plan.to_delete.is_empty());
        assert!(plan.to_update.is_empty());
        assert_eq!(plan.to_create, vec![0, 1]);
    }

    #[test]
    fn partition_empty_submission_deletes_everything() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let existing: HashSet<Uuid> = [a, b].into();
        let plan = partition(&existing, &[]);
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(plan.to_delete, expected);
        assert!(plan.to_create.is_empty());
        assert!(plan.to_update.is_empty());
    }

    #[test]
    fn partition_is_idempotent_on_identical_sets() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let existing: HashSet<Uuid> = [a, b].into();
        let plan = partition(&existing, &[Some(a), Some(b)]);
        assert!(plan.to_delete.is_empty());
        assert!(plan.to_create.is_empty());
        assert_eq!(plan.to_update, vec![0, 1]);
    }

    #[test]
    fn partition_tolerates_any_submission_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let existing: HashSet<Uuid> = [a, b].into();
        let plan = partition(&existing, &[Some(b), Some(a)]);
        assert!(plan.to_delete.is_empty());
        assert_eq!(plan.to_update, vec![0, 1]);
    }

    #[test]
    fn validation_collects_errors_per_question_field() {
        let submitted = vec![
            QuestionInput {
                id: None,
                question_type: None,
                title: None,
                description: None,
                data: None,
            },
            input(None, "slider", "Valid title", Some(json!({}))),
        ];

        let err = validate_questions(&submitted).unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains("questions[0].title"));
        assert!(errors.contains("questions[0].type"));
        assert!(errors.contains("questions[0].data"));
        assert!(errors.contains("questions[1].type"));
    }

    #[test]
    fn whitespace_title_is_rejected() {
        let submitted = vec![input(None, "text", "   ", Some(json!({})))];
        assert!(validate_questions(&submitted).is_err());
    }

    #[test]
    fn choice_data_keeps_options() {
        let submitted = vec![input(
            None,
            "select",
            "Pick one",
            Some(json!({ "options": ["A", "B"] })),
        )];
        let validated = validate_questions(&submitted).unwrap();
        assert_eq!(validated[0].data, json!({ "options": ["A", "B"] }));
    }

    #[test]
    fn string_encoded_data_is_unwrapped() {
        let submitted = vec![input(
            None,
            "checkbox",
            "Pick many",
            Some(json!("{\"options\":[\"X\"]}")),
        )];
        let validated = validate_questions(&submitted).unwrap();
        assert_eq!(validated[0].data, json!({ "options": ["X"] }));
    }

    #[test]
    fn empty_structure_is_allowed_for_choice_types() {
        let submitted = vec![input(None, "radio", "Pick", Some(json!({})))];
        let validated = validate_questions(&submitted).unwrap();
        assert_eq!(validated[0].data, json!({ "options": [] }));
    }

    #[test]
    fn text_data_normalizes_to_empty_object() {
        let submitted = vec![input(
            None,
            "text",
            "Free form",
            Some(json!({ "options": ["ignored"] })),
        )];
        let validated = validate_questions(&submitted).unwrap();
        assert_eq!(validated[0].data, json!({}));
    }

    #[test]
    fn non_string_options_are_rejected() {
        let submitted = vec![input(
            None,
            "select",
            "Pick",
            Some(json!({ "options": [1, 2] })),
        )];
        let err = validate_questions(&submitted).unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains("questions[0].data"));
    }

    #[test]
    fn garbage_string_data_is_rejected_for_choice_types() {
        let submitted = vec![input(None, "select", "Pick", Some(json!("not json")))];
        assert!(validate_questions(&submitted).is_err());
    }
}
