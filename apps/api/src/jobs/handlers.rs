//! Axum route handlers for the job board API.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::extract::{AppPath, AppQuery};
use crate::jobs::filters::{JobFilters, JobQuery};
use crate::jobs::recommend::{profile_from_parts, Recommendation, DEFAULT_LIMIT, MAX_LIMIT};
use crate::models::job::{Job, JobType, WorkType};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationQuery {
    pub limit: Option<i64>,
    /// Comma-separated.
    pub skills: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    pub work_type: Option<String>,
    pub min_salary: Option<f64>,
}

/// GET /api/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<JobQuery>,
) -> Result<Json<Vec<Job>>, AppError> {
    let filters = JobFilters::try_from(query)?;
    let jobs = state.catalog.list(&filters);
    tracing::debug!("Job listing matched {} of {}", jobs.len(), state.catalog.len());
    Ok(Json(jobs))
}

/// GET /api/jobs/recommendations
///
/// Without profile parameters the ranking is the catalog's own match percentage.
pub async fn handle_recommendations(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<RecommendationQuery>,
) -> Result<Json<Vec<Recommendation>>, AppError> {
    let limit = validate_limit(query.limit)?;
    let job_type = parse_optional::<JobType>(query.job_type)?;
    let work_type = parse_optional::<WorkType>(query.work_type)?;
    let profile = profile_from_parts(
        query.skills.as_deref(),
        query.location,
        job_type,
        work_type,
        query.min_salary,
    );

    let recommendations = state
        .recommender
        .recommend(state.catalog.all(), profile.as_ref(), limit);
    Ok(Json(recommendations))
}

/// GET /api/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> Result<Json<Job>, AppError> {
    state
        .catalog
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

fn validate_limit(limit: Option<i64>) -> Result<usize, AppError> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(n) if (1..=MAX_LIMIT as i64).contains(&n) => Ok(n as usize),
        Some(n) => Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_LIMIT}, got {n}"
        ))),
    }
}

fn parse_optional<T>(raw: Option<String>) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr<Err = String>,
{
    raw.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>())
        .transpose()
        .map_err(AppError::Validation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_limit() {
        assert_eq!(validate_limit(None).unwrap(), DEFAULT_LIMIT);
        assert_eq!(validate_limit(Some(1)).unwrap(), 1);
        assert_eq!(validate_limit(Some(50)).unwrap(), 50);
        assert!(matches!(validate_limit(Some(0)), Err(AppError::Validation(_))));
        assert!(matches!(validate_limit(Some(51)), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_parse_optional_enum() {
        assert_eq!(
            parse_optional::<JobType>(Some("full-time".to_string())).unwrap(),
            Some(JobType::FullTime)
        );
        assert_eq!(parse_optional::<JobType>(Some("  ".to_string())).unwrap(), None);
        assert!(parse_optional::<WorkType>(Some("moon".to_string())).is_err());
    }
}
