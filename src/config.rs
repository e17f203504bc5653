use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::PseudonymPair;
use crate::error::RetrieveError;

pub const DEFAULT_MANIFEST: &str = "seq-retrieve.json";

/// On-disk job manifest listing runs and samples to retrieve.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub runs_root: Option<Utf8PathBuf>,
    #[serde(default)]
    pub retrieved_root: Option<Utf8PathBuf>,
    #[serde(default)]
    pub runs: Vec<RunEntry>,
    #[serde(default)]
    pub samples: Vec<SampleEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PairEntry {
    Shorthand(String),
    Detailed(PseudonymPair),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RunEntry {
    pub run_path: Utf8PathBuf,
    #[serde(default)]
    pub pairs: Vec<PairEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SampleEntry {
    pub path: Utf8PathBuf,
    pub pseudonym: String,
    pub real_id: String,
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub run_path: Utf8PathBuf,
    pub pairs: Vec<PseudonymPair>,
}

#[derive(Debug, Clone)]
pub struct SampleRequest {
    pub path: Utf8PathBuf,
    pub pair: PseudonymPair,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub runs_root: Option<Utf8PathBuf>,
    pub retrieved_root: Option<Utf8PathBuf>,
    pub runs: Vec<RunRequest>,
    pub samples: Vec<SampleRequest>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, RetrieveError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_MANIFEST),
        };

        if path.is_none() && !config_path.exists() {
            return Err(RetrieveError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| RetrieveError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| RetrieveError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, RetrieveError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let runs = config
            .runs
            .into_iter()
            .map(|entry| {
                let pairs = entry
                    .pairs
                    .into_iter()
                    .map(|pair| match pair {
                        PairEntry::Shorthand(value) => value.parse(),
                        PairEntry::Detailed(pair) => Ok(pair),
                    })
                    .collect::<Result<Vec<_>, RetrieveError>>()?;
                Ok(RunRequest {
                    run_path: entry.run_path,
                    pairs,
                })
            })
            .collect::<Result<Vec<_>, RetrieveError>>()?;

        let samples = config
            .samples
            .into_iter()
            .map(|entry| SampleRequest {
                path: entry.path,
                pair: PseudonymPair::new(entry.pseudonym, entry.real_id),
            })
            .collect();

        Ok(ResolvedConfig {
            schema_version,
            runs_root: config.runs_root,
            retrieved_root: config.retrieved_root,
            runs,
            samples,
        })
    }
}
