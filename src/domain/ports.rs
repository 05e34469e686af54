use crate::domain::model::{Record, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Tabular file formats understood by the extract and load stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Xlsx,
    Csv,
}

impl TableFormat {
    pub const SUPPORTED: [&'static str; 2] = ["xlsx", "csv"];

    pub fn extension(self) -> &'static str {
        match self {
            TableFormat::Xlsx => "xlsx",
            TableFormat::Csv => "csv",
        }
    }

    /// Picks the format from a file name's extension, case-insensitively.
    pub fn from_path(path: &str) -> Option<Self> {
        std::path::Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl FromStr for TableFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xlsx" => Ok(TableFormat::Xlsx),
            "csv" => Ok(TableFormat::Csv),
            other => Err(format!(
                "unsupported format '{}', expected one of: {}",
                other,
                Self::SUPPORTED.join(", ")
            )),
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// What to do with a row whose identifier cannot be corrected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidRowPolicy {
    /// Leave the row out of the output and list it in the failure report.
    #[default]
    Skip,
    /// Fail the whole run on the first bad row.
    Abort,
}

impl FromStr for InvalidRowPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(InvalidRowPolicy::Skip),
            "abort" => Ok(InvalidRowPolicy::Abort),
            other => Err(format!("unknown policy '{}', expected skip or abort", other)),
        }
    }
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn sheet_name(&self) -> Option<&str>;
    fn input_column(&self) -> &str;
    fn output_column(&self) -> &str;
    fn output_suffix(&self) -> &str;
    fn output_format(&self) -> TableFormat;
    fn output_dir(&self) -> Option<&str>;
    fn invalid_row_policy(&self) -> InvalidRowPolicy;
    fn bundle(&self) -> bool;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<Record>>;
    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
