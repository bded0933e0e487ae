use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
    Internship,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FullTime => "full-time",
            JobType::PartTime => "part-time",
            JobType::Contract => "contract",
            JobType::Internship => "internship",
        }
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full-time" => Ok(JobType::FullTime),
            "part-time" => Ok(JobType::PartTime),
            "contract" => Ok(JobType::Contract),
            "internship" => Ok(JobType::Internship),
            other => Err(format!(
                "unknown job type '{other}' (expected full-time, part-time, contract or internship)"
            )),
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkType {
    #[default]
    OnSite,
    Remote,
    Hybrid,
}

impl FromStr for WorkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on-site" | "onsite" => Ok(WorkType::OnSite),
            "remote" => Ok(WorkType::Remote),
            "hybrid" => Ok(WorkType::Hybrid),
            other => Err(format!(
                "unknown work type '{other}' (expected on-site, remote or hybrid)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Per-dimension match percentages (0 – 100) shown on the job card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchBreakdown {
    pub education: f64,
    pub skills: f64,
    pub work_exp: f64,
    pub exp_level: f64,
}

impl MatchBreakdown {
    /// Wire name and value of every dimension.
    pub fn dimensions(&self) -> [(&'static str, f64); 4] {
        [
            ("education", self.education),
            ("skills", self.skills),
            ("workExp", self.work_exp),
            ("expLevel", self.exp_level),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    #[serde(default)]
    pub work_type: WorkType,
    pub salary: Option<SalaryRange>,
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    pub logo: Option<String>,
    /// Derived when the catalog is loaded.
    #[serde(default)]
    pub posted_date: DateTime<Utc>,
    #[serde(default)]
    pub time_posted: String,
    pub match_percentage: Option<f64>,
    pub match_breakdown: Option<MatchBreakdown>,
    pub skills_match: Option<String>,
    pub experience_level: Option<String>,
    pub applicant_count: Option<u32>,
    #[serde(default)]
    pub is_matched: bool,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub is_applied: bool,
    pub fit_explanation: Option<String>,
}

impl Job {
    /// Tags and requirements, lowercased. Used by filtering and scoring.
    pub fn skill_terms(&self) -> impl Iterator<Item = String> + '_ {
        self.tags
            .iter()
            .chain(self.requirements.iter())
            .map(|t| t.to_lowercase())
    }
}
