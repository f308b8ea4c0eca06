//! Batch files: several merge jobs described in one JSON document

use crate::error::{Error, Result};
use crate::merger::{merge, MergeConfig};
use crate::report::MergeReport;
use crate::scanner::expand_inputs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One merge to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeJob {
    /// Input files or directories
    pub inputs: Vec<PathBuf>,
    /// Output file
    pub output: PathBuf,
    /// Merge settings; missing fields take their defaults
    #[serde(default)]
    pub config: MergeConfig,
}

impl MergeJob {
    /// Expand the inputs and run the merge
    pub fn run(&self) -> Result<MergeReport> {
        let inputs = expand_inputs(&self.inputs)?;
        merge(&inputs, &self.output, &self.config)
    }
}

/// A batch file containing multiple merge jobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchFile {
    pub jobs: Vec<MergeJob>,
}

impl BatchFile {
    /// Load a batch file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the batch file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| Error::OutputWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Delimiter;

    #[test]
    fn test_batch_file_parsing() {
        let json = r#"{
            "jobs": [
                {
                    "inputs": ["a.tsv", "more/"],
                    "output": "out.csv",
                    "config": { "unifying_field": "species", "fuzzy_merge": true, "output_format": "comma" }
                },
                { "inputs": ["b.tsv"], "output": "out2.tsv" }
            ]
        }"#;

        let batch: BatchFile = serde_json::from_str(json).unwrap();

        assert_eq!(batch.jobs.len(), 2);
        let first = &batch.jobs[0];
        assert_eq!(first.inputs, vec![PathBuf::from("a.tsv"), PathBuf::from("more/")]);
        assert_eq!(first.config.unifying_field, "species");
        assert!(first.config.fuzzy_merge);
        assert_eq!(first.config.input_format, Delimiter::Tab);
        assert_eq!(first.config.output_format, Delimiter::Comma);
        assert_eq!(batch.jobs[1].config, MergeConfig::default());
    }

    #[test]
    fn test_batch_file_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        let batch = BatchFile {
            jobs: vec![MergeJob {
                inputs: vec![PathBuf::from("a.tsv")],
                output: PathBuf::from("out.tsv"),
                config: MergeConfig::new("locality").fuzzy(true),
            }],
        };

        batch.save(&path).unwrap();
        let loaded = BatchFile::load(&path).unwrap();

        assert_eq!(loaded.jobs, batch.jobs);
    }

    #[test]
    fn test_missing_batch_file() {
        let err = BatchFile::load("does/not/exist.json").unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
