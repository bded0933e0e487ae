//! In-memory job catalog, seeded from JSON at startup.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::info;

use crate::jobs::filters::JobFilters;
use crate::models::job::Job;

const BUILTIN_SEED: &str = include_str!("../../data/jobs.json");

/// Seed records carry a relative age; absolute dates are derived at load time.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedJob {
    #[serde(flatten)]
    job: Job,
    #[serde(default)]
    posted_hours_ago: i64,
}

#[derive(Debug, Clone)]
pub struct JobCatalog {
    jobs: Vec<Job>,
}

impl JobCatalog {
    /// Parses a seed document. Fails on malformed JSON, duplicate ids or
    /// percentages outside 0..=100.
    pub fn from_seed(json: &str, now: DateTime<Utc>) -> Result<Self> {
        let seeds: Vec<SeedJob> = serde_json::from_str(json).context("invalid job seed JSON")?;

        let mut seen = HashSet::new();
        let mut jobs = Vec::with_capacity(seeds.len());
        for seed in seeds {
            if !seen.insert(seed.job.id.clone()) {
                bail!("duplicate job id '{}' in seed data", seed.job.id);
            }
            check_percentages(&seed.job)?;
            let hours = seed.posted_hours_ago.max(0);
            let mut job = seed.job;
            job.posted_date = now - Duration::hours(hours);
            job.time_posted = format_time_ago(hours);
            jobs.push(job);
        }

        Ok(Self { jobs })
    }

    pub fn builtin() -> Result<Self> {
        Self::from_seed(BUILTIN_SEED, Utc::now())
    }

    /// Loads the catalog from `path` when given, otherwise the builtin dataset.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let catalog = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read jobs file {}", path.display()))?;
                Self::from_seed(&raw, Utc::now())?
            }
            None => Self::builtin()?,
        };
        info!("Job catalog loaded with {} jobs", catalog.len());
        Ok(catalog)
    }

    pub fn all(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns the jobs matching `filters`, in catalog order.
    pub fn list(&self, filters: &JobFilters) -> Vec<Job> {
        self.jobs
            .iter()
            .filter(|job| filters.matches(job))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }
}

fn check_percentages(job: &Job) -> Result<()> {
    let in_range = |v: f64| (0.0..=100.0).contains(&v);

    if let Some(pct) = job.match_percentage {
        if !in_range(pct) {
            bail!("job '{}': matchPercentage {pct} is outside 0..=100", job.id);
        }
    }
    if let Some(breakdown) = &job.match_breakdown {
        for (name, value) in breakdown.dimensions() {
            if !in_range(value) {
                bail!("job '{}': matchBreakdown.{name} {value} is outside 0..=100", job.id);
            }
        }
    }
    Ok(())
}

/// Human-readable age of a posting, e.g. "3 hours ago" or "2 days ago".
pub fn format_time_ago(hours: i64) -> String {
    match hours {
        h if h <= 0 => "Today".to_string(),
        1 => "1 hour ago".to_string(),
        h if h < 24 => format!("{h} hours ago"),
        h if h < 48 => "1 day ago".to_string(),
        h => format!("{} days ago", h / 24),
    }
}
