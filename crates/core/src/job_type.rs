//! Supported analysis kinds.
//!
//! The snake_case name doubles as the artifact path prefix and the value
//! stored in `jobs.job_type`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    PoissonFactorization,
    SurvivalAnalysis,
    NrrDecomposition,
    PropensityModel,
}

pub const ALL_JOB_TYPES: [JobType; 4] = [
    JobType::PoissonFactorization,
    JobType::SurvivalAnalysis,
    JobType::NrrDecomposition,
    JobType::PropensityModel,
];

impl JobType {
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        ALL_JOB_TYPES
            .into_iter()
            .find(|t| t.as_str() == name)
            .ok_or_else(|| {
                let valid: Vec<&str> = ALL_JOB_TYPES.iter().map(|t| t.as_str()).collect();
                CoreError::Validation(format!(
                    "Unknown job type '{name}'. Must be one of: {valid:?}"
                ))
            })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PoissonFactorization => "poisson_factorization",
            Self::SurvivalAnalysis => "survival_analysis",
            Self::NrrDecomposition => "nrr_decomposition",
            Self::PropensityModel => "propensity_model",
        }
    }

    /// Human-readable label reported in results.
    pub fn label(self) -> &'static str {
        match self {
            Self::PoissonFactorization => "Poisson Factorization",
            Self::SurvivalAnalysis => "Survival Analysis",
            Self::NrrDecomposition => "NRR Decomposition",
            Self::PropensityModel => "Propensity Model",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
