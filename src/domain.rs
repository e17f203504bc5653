use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RetrieveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Whole sequencing run, with per-sample FASTQ folders aggregated.
    FullRun,
    /// Single sample folder copied as-is.
    Sample,
}

impl RetrievalMode {
    pub fn is_full_run(self) -> bool {
        matches!(self, RetrievalMode::FullRun)
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalMode::FullRun => write!(f, "run"),
            RetrievalMode::Sample => write!(f, "sample"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Timestamp-derived id for jobs started without an explicit one.
    pub fn generate() -> Self {
        Self(format!(
            "job-{}",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%3f")
        ))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = RetrieveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().any(|ch| ch.is_whitespace()) {
            return Err(RetrieveError::InvalidJobId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// A pseudonym token and the real identifier it stands in for.
///
/// Both sides are matched as literal substrings, never as patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PseudonymPair {
    pub pseudonym: String,
    pub real_id: String,
}

impl PseudonymPair {
    pub fn new(pseudonym: impl Into<String>, real_id: impl Into<String>) -> Self {
        Self {
            pseudonym: pseudonym.into(),
            real_id: real_id.into(),
        }
    }
}

impl fmt::Display for PseudonymPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.pseudonym, self.real_id)
    }
}

impl FromStr for PseudonymPair {
    type Err = RetrieveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (pseudonym, real_id) = value
            .trim()
            .split_once('=')
            .ok_or_else(|| RetrieveError::InvalidPair(value.to_string()))?;
        let pseudonym = pseudonym.trim();
        let real_id = real_id.trim();
        if pseudonym.is_empty() || real_id.is_empty() {
            return Err(RetrieveError::InvalidPair(value.to_string()));
        }
        Ok(Self::new(pseudonym, real_id))
    }
}

/// Zips positionally matched pseudonym and real-id lists into pair records.
pub fn pairs_from_lists(
    pseudonyms: &[String],
    real_ids: &[String],
) -> Result<Vec<PseudonymPair>, RetrieveError> {
    if pseudonyms.len() != real_ids.len() {
        return Err(RetrieveError::PairCountMismatch {
            pseudonyms: pseudonyms.len(),
            real_ids: real_ids.len(),
        });
    }
    Ok(pseudonyms
        .iter()
        .zip(real_ids)
        .map(|(pseudonym, real_id)| PseudonymPair::new(pseudonym.as_str(), real_id.as_str()))
        .collect())
}

/// Rejects pair sets where one substitution could feed into another.
///
/// A pseudonym must be non-empty, unique, not contained in any other
/// pseudonym, and not contained in any real id (including its own, which
/// would make a second pass rename again).
pub fn validate_token_set(pairs: &[PseudonymPair]) -> Result<(), RetrieveError> {
    for (i, pair) in pairs.iter().enumerate() {
        if pair.pseudonym.is_empty() || pair.real_id.is_empty() {
            return Err(RetrieveError::InvalidPair(pair.to_string()));
        }
        for (j, other) in pairs.iter().enumerate() {
            if i != j && other.pseudonym.contains(&pair.pseudonym) {
                return Err(RetrieveError::AmbiguousTokenSet(format!(
                    "pseudonym {} is contained in pseudonym {}",
                    pair.pseudonym, other.pseudonym
                )));
            }
            if other.real_id.contains(&pair.pseudonym) {
                return Err(RetrieveError::AmbiguousTokenSet(format!(
                    "pseudonym {} is contained in real id {}",
                    pair.pseudonym, other.real_id
                )));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct RenameJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub pairs: Vec<PseudonymPair>,
    pub mode: RetrievalMode,
    pub job_id: JobId,
}

impl RenameJob {
    pub fn from_lists(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        pseudonyms: &[String],
        real_ids: &[String],
        mode: RetrievalMode,
        job_id: JobId,
    ) -> Result<Self, RetrieveError> {
        Ok(Self {
            source: source.into(),
            destination: destination.into(),
            pairs: pairs_from_lists(pseudonyms, real_ids)?,
            mode,
            job_id,
        })
    }
}

/// Two-digit sequencing year, as used in the `20YY` run archive folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SequencingYear(u8);

impl SequencingYear {
    pub fn two_digit(&self) -> String {
        format!("{:02}", self.0)
    }

    pub fn folder_name(&self) -> String {
        format!("20{:02}", self.0)
    }
}

impl fmt::Display for SequencingYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl FromStr for SequencingYear {
    type Err = RetrieveError;

    /// Accepts a bare `YY` or a predictive number ending in `-YY`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let suffix = trimmed.rsplit('-').next().unwrap_or(trimmed);
        let is_valid = suffix.len() == 2 && suffix.chars().all(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(RetrieveError::InvalidYear(value.to_string()));
        }
        suffix
            .parse::<u8>()
            .map(Self)
            .map_err(|_| RetrieveError::InvalidYear(value.to_string()))
    }
}
