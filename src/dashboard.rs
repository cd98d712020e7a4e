// dashboard.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Survey, SurveyResource};
use crate::questions;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LatestAnswer {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub survey_title: String,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub total_surveys: i64,
    pub latest_survey: Option<SurveyResource>,
    pub total_answers: i64,
    pub latest_answers: Vec<LatestAnswer>,
}

/// Owner-scoped aggregates for the dashboard view.
pub async fn overview(pool: &PgPool, owner_id: Uuid) -> Result<Dashboard, ApiError> {
    let total_surveys: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM surveys WHERE user_id = $1")
        .bind(owner_id)
        .fetch_one(pool)
        .await?;

    let latest = sqlx::query_as::<_, Survey>(
        "SELECT * FROM surveys WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(owner_id)
    .fetch_optional(pool)
    .await?;

    let latest_survey = match latest {
        Some(survey) => {
            let question_list = questions::list_for_survey(pool, survey.id).await?;
            Some(SurveyResource::from_parts(survey, question_list))
        }
        None => None,
    };

    let total_answers: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM answers a JOIN surveys s ON s.id = a.survey_id WHERE s.user_id = $1",
    )
    .bind(owner_id)
    .fetch_one(pool)
    .await?;

    let latest_answers = sqlx::query_as::<_, LatestAnswer>(
        "SELECT a.id, a.survey_id, s.title AS survey_title, a.end_date
         FROM answers a
         JOIN surveys s ON s.id = a.survey_id
         WHERE s.user_id = $1
         ORDER BY a.end_date DESC
         LIMIT 5",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(Dashboard {
        total_surveys,
        latest_survey,
        total_answers,
        latest_answers,
    })
}
