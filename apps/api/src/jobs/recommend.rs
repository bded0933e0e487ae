//! Job recommendations: pluggable, trait-based scorer over the static catalog.
//!
//! Default: `ProfileRecommender` (pure-Rust, deterministic, no external calls).
//! `AppState` holds an `Arc<dyn Recommender>`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::jobs::filters::split_csv;
use crate::models::job::{Job, JobType, MatchBreakdown, WorkType};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// What the candidate told us about themselves. Empty fields are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateProfile {
    pub skills: Vec<String>,
    pub location: Option<String>,
    pub job_type: Option<JobType>,
    pub work_type: Option<WorkType>,
    pub min_salary: Option<f64>,
}

impl CandidateProfile {
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
            && self.location.is_none()
            && self.job_type.is_none()
            && self.work_type.is_none()
            && self.min_salary.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub job: Job,
    pub score: f64, // 0.0 – 1.0
    pub reason: String,
    pub matched_skills: Vec<String>,
    pub match_breakdown: Option<MatchBreakdown>,
    pub fit_explanation: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

pub trait Recommender: Send + Sync {
    fn recommend(
        &self,
        jobs: &[Job],
        profile: Option<&CandidateProfile>,
        limit: usize,
    ) -> Vec<Recommendation>;
}

// ────────────────────────────────────────────────────────────────────────────
// ProfileRecommender
// ────────────────────────────────────────────────────────────────────────────

/// Weighted relevance scorer.
///
/// Algorithm:
/// 1. baseline = matchPercentage / 100 (0 when unknown)
/// 2. without a profile, score = baseline
/// 3. with a profile, score = 0.4 × baseline + 0.6 × profile_fit, where
///    profile_fit averages skills (0.5), location (0.15), work type (0.15)
///    and salary (0.2) over the dimensions the profile actually sets;
///    a profile with no weighted dimension keeps score = baseline
/// 4. a requested job type is a hard filter, never a weighted dimension
/// 5. sort by score descending, then job id ascending
pub struct ProfileRecommender;

const BASELINE_WEIGHT: f64 = 0.4;
const PROFILE_WEIGHT: f64 = 0.6;

const SKILLS_WEIGHT: f64 = 0.5;
const LOCATION_WEIGHT: f64 = 0.15;
const WORK_TYPE_WEIGHT: f64 = 0.15;
const SALARY_WEIGHT: f64 = 0.2;

const TOP_MATCH_THRESHOLD: f64 = 0.9;

impl Recommender for ProfileRecommender {
    fn recommend(
        &self,
        jobs: &[Job],
        profile: Option<&CandidateProfile>,
        limit: usize,
    ) -> Vec<Recommendation> {
        let profile = profile.filter(|p| !p.is_empty());

        let mut scored: Vec<Recommendation> = jobs
            .iter()
            .filter(|job| {
                // A requested job type is a hard constraint, not a preference.
                profile
                    .and_then(|p| p.job_type)
                    .map_or(true, |t| t == job.job_type)
            })
            .map(|job| score_job(job, profile))
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.job.id.cmp(&b.job.id))
        });
        scored.truncate(limit);
        scored
    }
}

fn score_job(job: &Job, profile: Option<&CandidateProfile>) -> Recommendation {
    let baseline = (job.match_percentage.unwrap_or(0.0) / 100.0).clamp(0.0, 1.0);

    let (score, matched_skills) = match profile {
        None => (baseline, Vec::new()),
        Some(profile) => match profile_fit(job, profile) {
            (Some(fit), matched) => (
                (BASELINE_WEIGHT * baseline + PROFILE_WEIGHT * fit).clamp(0.0, 1.0),
                matched,
            ),
            // Only hard constraints were set; nothing to weigh against the baseline.
            (None, matched) => (baseline, matched),
        },
    };

    // Round to 4 places so equal-looking scores compare equal.
    let score = (score * 10_000.0).round() / 10_000.0;

    Recommendation {
        job: job.clone(),
        score,
        reason: build_reason(job, score),
        matched_skills,
        match_breakdown: job.match_breakdown.clone(),
        fit_explanation: job.fit_explanation.clone(),
    }
}

/// Returns (fit in 0..=1, matched skills in profile order).
/// The fit is `None` when the profile sets no weighted dimension.
fn profile_fit(job: &Job, profile: &CandidateProfile) -> (Option<f64>, Vec<String>) {
    let mut weight_sum = 0.0;
    let mut total = 0.0;
    let mut matched = Vec::new();

    if !profile.skills.is_empty() {
        let terms: Vec<String> = job.skill_terms().collect();
        for skill in &profile.skills {
            let skill = skill.to_lowercase();
            if terms.iter().any(|t| t == &skill || t.contains(&skill)) {
                matched.push(skill);
            }
        }
        weight_sum += SKILLS_WEIGHT;
        total += SKILLS_WEIGHT * (matched.len() as f64 / profile.skills.len() as f64);
    }

    if let Some(location) = &profile.location {
        let hit = job.work_type == WorkType::Remote
            || job.location.to_lowercase().contains(&location.to_lowercase());
        weight_sum += LOCATION_WEIGHT;
        total += if hit { LOCATION_WEIGHT } else { 0.0 };
    }

    if let Some(work_type) = profile.work_type {
        weight_sum += WORK_TYPE_WEIGHT;
        total += if job.work_type == work_type {
            WORK_TYPE_WEIGHT
        } else {
            0.0
        };
    }

    if let Some(desired) = profile.min_salary {
        weight_sum += SALARY_WEIGHT;
        total += SALARY_WEIGHT * salary_fit(job, desired);
    }

    if weight_sum == 0.0 {
        return (None, matched);
    }
    (Some((total / weight_sum).clamp(0.0, 1.0)), matched)
}

/// 1.0 if the top of the range reaches the desired salary, scaled down otherwise.
fn salary_fit(job: &Job, desired: f64) -> f64 {
    let top = job
        .salary
        .as_ref()
        .and_then(|s| s.max.or(s.min));
    match top {
        Some(top) if desired <= 0.0 || top >= desired => 1.0,
        Some(top) => (top / desired).clamp(0.0, 1.0),
        None => 0.0,
    }
}

fn build_reason(job: &Job, score: f64) -> String {
    if job.featured {
        "Featured job".to_string()
    } else if score >= TOP_MATCH_THRESHOLD {
        "Top matched".to_string()
    } else {
        "Good match".to_string()
    }
}

/// Parses the recommendation query into a profile. Returns `None` if nothing was set.
pub fn profile_from_parts(
    skills: Option<&str>,
    location: Option<String>,
    job_type: Option<JobType>,
    work_type: Option<WorkType>,
    min_salary: Option<f64>,
) -> Option<CandidateProfile> {
    let profile = CandidateProfile {
        skills: skills.map(split_csv).unwrap_or_default(),
        location: location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()),
        job_type,
        work_type,
        min_salary: min_salary.filter(|s| *s > 0.0),
    };
    (!profile.is_empty()).then_some(profile)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::catalog::JobCatalog;

    fn jobs() -> Vec<Job> {
        JobCatalog::builtin().unwrap().all().to_vec()
    }

    fn ids(recs: &[Recommendation]) -> Vec<&str> {
        recs.iter().map(|r| r.job.id.as_str()).collect()
    }

    #[test]
    fn test_baseline_orders_by_match_percentage() {
        let recs = ProfileRecommender.recommend(&jobs(), None, DEFAULT_LIMIT);
        // 93 (2, 4), 88, 85, 82, 79, 75, 64, ties by id
        assert_eq!(ids(&recs), vec!["2", "4", "5", "8", "3", "7", "6", "1"]);
        assert!((recs[0].score - 0.93).abs() < 1e-9);
    }

    #[test]
    fn test_limit_truncates() {
        let recs = ProfileRecommender.recommend(&jobs(), None, 3);
        assert_eq!(recs.len(), 3);
    }

    #[test]
    fn test_ordering_is_deterministic() {
        let profile = CandidateProfile {
            skills: vec!["python".to_string(), "react".to_string()],
            location: Some("Austin".to_string()),
            ..Default::default()
        };
        let first = ProfileRecommender.recommend(&jobs(), Some(&profile), MAX_LIMIT);
        for _ in 0..5 {
            let again = ProfileRecommender.recommend(&jobs(), Some(&profile), MAX_LIMIT);
            assert_eq!(ids(&first), ids(&again));
        }
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut reversed = jobs();
        reversed.reverse();
        let a = ProfileRecommender.recommend(&jobs(), None, MAX_LIMIT);
        let b = ProfileRecommender.recommend(&reversed, None, MAX_LIMIT);
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn test_skills_profile_promotes_matching_jobs() {
        let profile = CandidateProfile {
            skills: vec!["ux".to_string(), "user research".to_string()],
            ..Default::default()
        };
        let recs = ProfileRecommender.recommend(&jobs(), Some(&profile), MAX_LIMIT);
        assert_eq!(recs[0].job.id, "4");
        assert_eq!(recs[0].matched_skills, vec!["ux", "user research"]);
    }

    #[test]
    fn test_remote_jobs_satisfy_any_location() {
        let job = jobs().into_iter().find(|j| j.id == "7").unwrap();
        let profile = CandidateProfile {
            location: Some("Berlin".to_string()),
            ..Default::default()
        };
        let (fit, _) = profile_fit(&job, &profile);
        assert_eq!(fit, Some(1.0));
    }

    #[test]
    fn test_job_type_is_a_hard_filter() {
        let profile = CandidateProfile {
            job_type: Some(JobType::Internship),
            ..Default::default()
        };
        assert!(ProfileRecommender
            .recommend(&jobs(), Some(&profile), MAX_LIMIT)
            .is_empty());
    }

    #[test]
    fn test_type_only_profile_keeps_baseline_scores() {
        let baseline = ProfileRecommender.recommend(&jobs(), None, MAX_LIMIT);
        let profile = profile_from_parts(None, None, Some(JobType::FullTime), None, None).unwrap();
        let typed = ProfileRecommender.recommend(&jobs(), Some(&profile), MAX_LIMIT);

        assert!(!typed.is_empty());
        for rec in &typed {
            let plain = baseline.iter().find(|r| r.job.id == rec.job.id).unwrap();
            assert_eq!(rec.score, plain.score);
            assert_eq!(rec.reason, plain.reason);
        }
    }

    #[test]
    fn test_salary_fit_scales_below_desired() {
        let job = jobs().into_iter().find(|j| j.id == "1").unwrap();
        assert!((salary_fit(&job, 140_000.0) - 0.5).abs() < 1e-9);
        assert_eq!(salary_fit(&job, 60_000.0), 1.0);
    }

    #[test]
    fn test_scores_are_bounded() {
        let profile = CandidateProfile {
            skills: vec!["python".to_string()],
            min_salary: Some(1.0),
            work_type: Some(WorkType::Remote),
            location: Some("ny".to_string()),
            job_type: None,
        };
        for rec in ProfileRecommender.recommend(&jobs(), Some(&profile), MAX_LIMIT) {
            assert!((0.0..=1.0).contains(&rec.score));
        }
    }

    #[test]
    fn test_reason_featured_wins() {
        let recs = ProfileRecommender.recommend(&jobs(), None, MAX_LIMIT);
        let by_id = |id: &str| recs.iter().find(|r| r.job.id == id).unwrap();
        assert_eq!(by_id("2").reason, "Featured job");
        assert_eq!(by_id("4").reason, "Top matched");
        assert_eq!(by_id("1").reason, "Good match");
    }

    #[test]
    fn test_empty_profile_parts_yield_none() {
        assert!(profile_from_parts(Some(" , "), Some("  ".to_string()), None, None, Some(0.0)).is_none());
        let profile = profile_from_parts(Some("Rust"), None, None, None, None).unwrap();
        assert_eq!(profile.skills, vec!["rust"]);
    }
}
