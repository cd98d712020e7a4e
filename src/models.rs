// models.rs
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Closed set of question types a survey may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum QuestionType {
    Text,
    Textarea,
    Select,
    Radio,
    Checkbox,
    Date,
}

impl QuestionType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "textarea" => Some(Self::Textarea),
            "select" => Some(Self::Select),
            "radio" => Some(Self::Radio),
            "checkbox" => Some(Self::Checkbox),
            "date" => Some(Self::Date),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Select => "select",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::Date => "date",
        }
    }

    /// Types whose `data` payload carries an options list.
    pub fn has_options(&self) -> bool {
        matches!(self, Self::Select | Self::Radio | Self::Checkbox)
    }
}

// no Serialize on purpose: the password hash never leaves the server,
// responses go through UserResource
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Survey {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub slug: String,
    pub status: bool,
    pub description: Option<String>,
    pub image: Option<String>,
    pub expire_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub question_type: QuestionType,
    pub title: String,
    pub description: Option<String>,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Answer {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuestionAnswer {
    pub id: Uuid,
    pub question_id: Uuid,
    pub answer_id: Uuid,
    pub answer: String,
}

// ---- request payloads ----

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// One submitted question. Fields are loosely typed on purpose: validation
/// reports per-field messages instead of failing JSON deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionInput {
    pub id: Option<Uuid>,
    #[serde(rename = "type")]
    pub question_type: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct SurveyPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub status: bool,
    /// Either absent (keep the current image) or a base64 data URI.
    pub image: Option<String>,
    pub expire_date: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerSubmission {
    #[serde(default)]
    pub answers: HashMap<Uuid, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
}

// ---- responses ----

#[derive(Debug, Serialize)]
pub struct UserResource {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<User> for UserResource {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResource,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct QuestionResource {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub title: String,
    pub description: Option<String>,
    pub data: Value,
}

impl From<Question> for QuestionResource {
    fn from(question: Question) -> Self {
        Self {
            id: question.id,
            question_type: question.question_type,
            title: question.title,
            description: question.description,
            data: question.data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SurveyResource {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub status: bool,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub expire_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub questions: Vec<QuestionResource>,
}

impl SurveyResource {
    pub fn from_parts(survey: Survey, questions: Vec<Question>) -> Self {
        Self {
            id: survey.id,
            title: survey.title,
            slug: survey.slug,
            status: survey.status,
            description: survey.description,
            image_url: survey.image.map(|path| format!("/{path}")),
            expire_date: survey.expire_date,
            created_at: survey.created_at,
            updated_at: survey.updated_at,
            questions: questions.into_iter().map(QuestionResource::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_type_round_trips_through_str() {
        for raw in ["text", "textarea", "select", "radio", "checkbox", "date"] {
            let parsed = QuestionType::parse(raw).unwrap();
            assert_eq!(parsed.as_str(), raw);
        }
        assert!(QuestionType::parse("slider").is_none());
        assert!(QuestionType::parse("Text").is_none());
    }

    #[test]
    fn option_bearing_types() {
        assert!(QuestionType::Select.has_options());
        assert!(QuestionType::Radio.has_options());
        assert!(QuestionType::Checkbox.has_options());
        assert!(!QuestionType::Text.has_options());
        assert!(!QuestionType::Date.has_options());
    }

    #[test]
    fn answer_submission_accepts_uuid_keyed_map() {
        let id = Uuid::new_v4();
        let body = serde_json::json!({ "answers": { id.to_string(): ["A", "B"] } });
        let submission: AnswerSubmission = serde_json::from_value(body).unwrap();
        assert_eq!(submission.answers.len(), 1);
        assert!(submission.answers[&id].is_array());
    }
}
