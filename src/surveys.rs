// surveys.rs
//
// Survey lifecycle: CRUD with ownership checks, image handling, slug
// derivation, and the publish/expire visibility window for public access.
use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ApiError, FieldErrors};
use crate::models::{PageMeta, Paginated, Question, Survey, SurveyPayload, SurveyResource};
use crate::questions;
use crate::storage;

pub const PER_PAGE: u32 = 10;

#[derive(Debug, PartialEq, Eq)]
struct SurveyFields {
    title: String,
    description: Option<String>,
    status: bool,
    expire_date: Option<NaiveDate>,
}

fn validate_payload(payload: &SurveyPayload) -> Result<SurveyFields, ApiError> {
    let mut errors = FieldErrors::new();

    let title = match payload.title.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => {
            errors.add("title", "The title field is required");
            String::new()
        }
    };

    let expire_date = match payload.expire_date.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                errors.add("expire_date", "The expire date must be a valid date");
                None
            }
        },
    };

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    Ok(SurveyFields {
        title,
        description: payload.description.clone(),
        status: payload.status,
        expire_date,
    })
}

pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c.to_ascii_lowercase());
            pending_hyphen = false;
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        "survey".to_string()
    } else {
        slug
    }
}

async fn unique_slug(pool: &PgPool, base: &str) -> Result<String, ApiError> {
    let mut candidate = base.to_string();
    let mut n = 1u32;
    loop {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM surveys WHERE slug = $1)")
                .bind(&candidate)
                .fetch_one(pool)
                .await?;
        if !taken {
            return Ok(candidate);
        }
        n += 1;
        candidate = format!("{base}-{n}");
    }
}

/// Draft and expired surveys are publicly indistinguishable from missing
/// ones; only published and unexpired surveys are visible.
pub fn publicly_visible(status: bool, expire_date: Option<NaiveDate>, today: NaiveDate) -> bool {
    status && expire_date.is_none_or(|expire| today <= expire)
}

async fn fetch_survey(pool: &PgPool, survey_id: Uuid) -> Result<Survey, ApiError> {
    sqlx::query_as::<_, Survey>("SELECT * FROM surveys WHERE id = $1")
        .bind(survey_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound)
}

fn owned_by(survey: &Survey, requester_id: Uuid) -> Result<(), ApiError> {
    if survey.user_id == requester_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

async fn load_resource(pool: &PgPool, survey_id: Uuid) -> Result<SurveyResource, ApiError> {
    let survey = fetch_survey(pool, survey_id).await?;
    let question_list = questions::list_for_survey(pool, survey_id).await?;
    Ok(SurveyResource::from_parts(survey, question_list))
}

fn decode_submitted_image(
    images_dir: &Path,
    image: Option<&str>,
) -> Result<Option<String>, ApiError> {
    match image {
        Some(uri) if !uri.is_empty() => {
            let decoded = storage::parse_data_uri(uri)?;
            Ok(Some(storage::save_image(images_dir, &decoded)?))
        }
        _ => Ok(None),
    }
}

pub async fn create(
    pool: &PgPool,
    images_dir: &Path,
    owner_id: Uuid,
    payload: SurveyPayload,
) -> Result<SurveyResource, ApiError> {
    let fields = validate_payload(&payload)?;
    // reject invalid questions before the image blob is written
    questions::validate_questions(&payload.questions)?;

    let image = decode_submitted_image(images_dir, payload.image.as_deref())?;
    let survey_id = Uuid::new_v4();
    let slug = unique_slug(pool, &slugify(&fields.title)).await?;

    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO surveys (id, user_id, title, slug, status, description, image, expire_date)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(survey_id)
    .bind(owner_id)
    .bind(&fields.title)
    .bind(&slug)
    .bind(fields.status)
    .bind(&fields.description)
    .bind(&image)
    .bind(fields.expire_date)
    .execute(&mut *tx)
    .await?;

    questions::sync_questions(&mut tx, survey_id, &HashSet::new(), &payload.questions).await?;
    tx.commit().await?;

    load_resource(pool, survey_id).await
}

pub async fn read(
    pool: &PgPool,
    survey_id: Uuid,
    requester_id: Uuid,
) -> Result<SurveyResource, ApiError> {
    let survey = fetch_survey(pool, survey_id).await?;
    owned_by(&survey, requester_id)?;

    let question_list = questions::list_for_survey(pool, survey_id).await?;
    Ok(SurveyResource::from_parts(survey, question_list))
}

pub async fn update(
    pool: &PgPool,
    images_dir: &Path,
    survey_id: Uuid,
    requester_id: Uuid,
    payload: SurveyPayload,
) -> Result<SurveyResource, ApiError> {
    let survey = fetch_survey(pool, survey_id).await?;
    owned_by(&survey, requester_id)?;

    let fields = validate_payload(&payload)?;
    questions::validate_questions(&payload.questions)?;

    let new_image = decode_submitted_image(images_dir, payload.image.as_deref())?;
    let image = new_image.clone().or_else(|| survey.image.clone());

    let mut tx = pool.begin().await?;
    sqlx::query(
        "UPDATE surveys
         SET title = $1, status = $2, description = $3, image = $4, expire_date = $5,
             updated_at = now()
         WHERE id = $6",
    )
    .bind(&fields.title)
    .bind(fields.status)
    .bind(&fields.description)
    .bind(&image)
    .bind(fields.expire_date)
    .bind(survey_id)
    .execute(&mut *tx)
    .await?;

    let existing = questions::ids_for_survey(&mut *tx, survey_id).await?;
    questions::sync_questions(&mut tx, survey_id, &existing, &payload.questions).await?;
    tx.commit().await?;

    // the old blob goes only after the commit; a crash in between leaks a
    // file rather than losing the referenced one
    if new_image.is_some() {
        if let Some(old) = &survey.image {
            storage::delete_image(images_dir, old);
        }
    }

    load_resource(pool, survey_id).await
}

pub async fn delete(
    pool: &PgPool,
    images_dir: &Path,
    survey_id: Uuid,
    requester_id: Uuid,
) -> Result<(), ApiError> {
    let survey = fetch_survey(pool, survey_id).await?;
    owned_by(&survey, requester_id)?;

    // questions and answers go with the survey via FK cascade
    sqlx::query("DELETE FROM surveys WHERE id = $1")
        .bind(survey_id)
        .execute(pool)
        .await?;

    if let Some(image) = &survey.image {
        storage::delete_image(images_dir, image);
    }

    Ok(())
}

pub async fn get_public(pool: &PgPool, slug: &str) -> Result<SurveyResource, ApiError> {
    let survey = sqlx::query_as::<_, Survey>("SELECT * FROM surveys WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !publicly_visible(survey.status, survey.expire_date, Utc::now().date_naive()) {
        return Err(ApiError::NotFound);
    }

    let question_list = questions::list_for_survey(pool, survey.id).await?;
    Ok(SurveyResource::from_parts(survey, question_list))
}

/// Newest-created-first slice of the requester's surveys.
pub async fn list_owned(
    pool: &PgPool,
    owner_id: Uuid,
    page: u32,
) -> Result<Paginated<SurveyResource>, ApiError> {
    let page = page.max(1);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM surveys WHERE user_id = $1")
        .bind(owner_id)
        .fetch_one(pool)
        .await?;

    let surveys = sqlx::query_as::<_, Survey>(
        "SELECT * FROM surveys WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(owner_id)
    .bind(PER_PAGE as i64)
    .bind((page as i64 - 1) * PER_PAGE as i64)
    .fetch_all(pool)
    .await?;

    // one query for every page's question lists instead of one per survey
    let ids: Vec<Uuid> = surveys.iter().map(|s| s.id).collect();
    let rows = sqlx::query_as::<_, Question>(
        "SELECT * FROM questions WHERE survey_id = ANY($1) ORDER BY seq",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut by_survey: HashMap<Uuid, Vec<Question>> = HashMap::new();
    for question in rows {
        by_survey.entry(question.survey_id).or_default().push(question);
    }

    let data = surveys
        .into_iter()
        .map(|survey| {
            let question_list = by_survey.remove(&survey.id).unwrap_or_default();
            SurveyResource::from_parts(survey, question_list)
        })
        .collect();

    Ok(Paginated {
        data,
        meta: PageMeta {
            page,
            per_page: PER_PAGE,
            total,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionInput;

    fn payload(title: Option<&str>, expire_date: Option<&str>) -> SurveyPayload {
        SurveyPayload {
            title: title.map(String::from),
            description: None,
            status: false,
            image: None,
            expire_date: expire_date.map(String::from),
            questions: Vec::<QuestionInput>::new(),
        }
    }

    #[test]
    fn slugify_basics() {
        assert_eq!(slugify("My First Survey"), "my-first-survey");
        assert_eq!(slugify("  Weird -- punctuation!! "), "weird-punctuation");
        assert_eq!(slugify("Déjà vu 2024"), "d-j-vu-2024");
        assert_eq!(slugify("!!!"), "survey");
    }

    #[test]
    fn validate_requires_title() {
        let err = validate_payload(&payload(None, None)).unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains("title"));

        assert!(validate_payload(&payload(Some("   "), None)).is_err());
    }

    #[test]
    fn validate_parses_expire_date() {
        let fields = validate_payload(&payload(Some("t"), Some("2026-12-01"))).unwrap();
        assert_eq!(
            fields.expire_date,
            Some(NaiveDate::from_ymd_opt(2026, 12, 1).unwrap())
        );

        // empty string means "no expiry", like an absent field
        let fields = validate_payload(&payload(Some("t"), Some(""))).unwrap();
        assert_eq!(fields.expire_date, None);

        assert!(validate_payload(&payload(Some("t"), Some("12/01/2026"))).is_err());
    }

    #[test]
    fn visibility_window() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let tomorrow = today.succ_opt().unwrap();
        let yesterday = today.pred_opt().unwrap();

        // draft is never public, whatever the date says
        assert!(!publicly_visible(false, Some(tomorrow), today));
        assert!(!publicly_visible(false, None, today));

        assert!(publicly_visible(true, Some(tomorrow), today));
        assert!(publicly_visible(true, Some(today), today));
        assert!(publicly_visible(true, None, today));

        assert!(!publicly_visible(true, Some(yesterday), today));
    }
}
