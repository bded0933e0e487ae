//! Job listing filters, parsed from the `GET /jobs` query string.

use serde::Deserialize;

use crate::errors::AppError;
use crate::models::job::{Job, JobType, WorkType};

/// Raw query parameters as the browser sends them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQuery {
    pub search: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    pub work_type: Option<String>,
    /// Comma-separated.
    pub tags: Option<String>,
    pub min_salary: Option<f64>,
    pub max_salary: Option<f64>,
}

/// Validated, normalized filters. Every set field narrows the result.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct JobFilters {
    pub search: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<JobType>,
    pub work_type: Option<WorkType>,
    pub tags: Vec<String>,
    pub min_salary: Option<f64>,
    pub max_salary: Option<f64>,
}

impl TryFrom<JobQuery> for JobFilters {
    type Error = AppError;

    fn try_from(query: JobQuery) -> Result<Self, Self::Error> {
        let job_type = non_empty(query.job_type)
            .map(|t| t.parse::<JobType>())
            .transpose()
            .map_err(AppError::Validation)?;
        let work_type = non_empty(query.work_type)
            .map(|t| t.parse::<WorkType>())
            .transpose()
            .map_err(AppError::Validation)?;

        // Zero bounds mean "no bound".
        let min_salary = query.min_salary.filter(|v| *v > 0.0);
        let max_salary = query.max_salary.filter(|v| *v > 0.0);
        if let (Some(min), Some(max)) = (min_salary, max_salary) {
            if min > max {
                return Err(AppError::Validation(format!(
                    "minSalary ({min}) cannot exceed maxSalary ({max})"
                )));
            }
        }

        Ok(JobFilters {
            search: non_empty(query.search).map(|s| s.to_lowercase()),
            location: non_empty(query.location).map(|s| s.to_lowercase()),
            job_type,
            work_type,
            tags: query
                .tags
                .as_deref()
                .map(split_csv)
                .unwrap_or_default(),
            min_salary,
            max_salary,
        })
    }
}

impl JobFilters {
    pub fn matches(&self, job: &Job) -> bool {
        if let Some(search) = &self.search {
            let hit = job.title.to_lowercase().contains(search)
                || job.company.to_lowercase().contains(search)
                || job.description.to_lowercase().contains(search);
            if !hit {
                return false;
            }
        }

        if let Some(location) = &self.location {
            if !job.location.to_lowercase().contains(location) {
                return false;
            }
        }

        if self.job_type.is_some_and(|t| t != job.job_type) {
            return false;
        }

        if self.work_type.is_some_and(|w| w != job.work_type) {
            return false;
        }

        if !self.tags.is_empty() {
            let job_tags: Vec<String> = job.tags.iter().map(|t| t.to_lowercase()).collect();
            if !self.tags.iter().any(|t| job_tags.contains(t)) {
                return false;
            }
        }

        if let Some(min) = self.min_salary {
            match &job.salary {
                Some(salary) if salary.min.map_or(true, |m| m >= min) => {}
                _ => return false,
            }
        }

        if let Some(max) = self.max_salary {
            match &job.salary {
                Some(salary) if salary.max.map_or(true, |m| m <= max) => {}
                _ => return false,
            }
        }

        true
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Splits a comma-separated list into lowercased, trimmed, non-empty items.
pub fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(query: JobQuery) -> JobFilters {
        JobFilters::try_from(query).unwrap()
    }

    #[test]
    fn test_empty_query_has_no_constraints() {
        assert_eq!(filters(JobQuery::default()), JobFilters::default());
    }

    #[test]
    fn test_blank_strings_are_ignored() {
        let f = filters(JobQuery {
            search: Some("   ".to_string()),
            job_type: Some("".to_string()),
            ..Default::default()
        });
        assert!(f.search.is_none());
        assert!(f.job_type.is_none());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = JobFilters::try_from(JobQuery {
            job_type: Some("gig".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_inverted_salary_bounds_are_rejected() {
        let result = JobFilters::try_from(JobQuery {
            min_salary: Some(200_000.0),
            max_salary: Some(100_000.0),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_salary_bound_is_dropped() {
        let f = filters(JobQuery {
            min_salary: Some(0.0),
            ..Default::default()
        });
        assert!(f.min_salary.is_none());
    }

    #[test]
    fn test_tags_are_split_and_lowercased() {
        assert_eq!(split_csv("React, Python ,,AI"), vec!["react", "python", "ai"]);
    }
}
