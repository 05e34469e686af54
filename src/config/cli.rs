use super::{DEFAULT_INPUT_COLUMN, DEFAULT_OUTPUT_COLUMN, DEFAULT_SUFFIX};
use crate::domain::ports::{ConfigProvider, InvalidRowPolicy, TableFormat};
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "imei-etl")]
#[command(about = "Recompute IMEI check digits for every row of a spreadsheet")]
pub struct CliConfig {
    /// Input file (.xlsx or .csv)
    pub input: String,

    #[arg(long, default_value = DEFAULT_INPUT_COLUMN, help = "Header of the identifier column")]
    pub column: String,

    #[arg(long, default_value = DEFAULT_OUTPUT_COLUMN, help = "Header of the output column")]
    pub output_column: String,

    #[arg(long, help = "Worksheet to read (default: first sheet)")]
    pub sheet: Option<String>,

    #[arg(long, default_value = DEFAULT_SUFFIX, help = "Appended to the input file name")]
    pub suffix: String,

    #[arg(long, default_value = "xlsx", help = "Output format: xlsx or csv")]
    pub format: TableFormat,

    #[arg(long, help = "Write outputs here instead of next to the input")]
    pub output_dir: Option<String>,

    #[arg(long, default_value = "skip", help = "skip: report bad rows; abort: fail on the first one")]
    pub on_invalid_row: InvalidRowPolicy,

    #[arg(long, help = "Pack outputs, failure report and summary into one zip")]
    pub bundle: bool,

    #[arg(long, help = "Only report which rows already carry a valid check digit")]
    pub verify: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

impl CliConfig {
    /// Defaults for everything but the input path.
    pub fn for_input(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            column: DEFAULT_INPUT_COLUMN.to_string(),
            output_column: DEFAULT_OUTPUT_COLUMN.to_string(),
            sheet: None,
            suffix: DEFAULT_SUFFIX.to_string(),
            format: TableFormat::Xlsx,
            output_dir: None,
            on_invalid_row: InvalidRowPolicy::Skip,
            bundle: false,
            verify: false,
            verbose: false,
            monitor: false,
            log_json: false,
        }
    }
}

impl ConfigProvider for CliConfig {
    fn input_path(&self) -> &str {
        &self.input
    }

    fn sheet_name(&self) -> Option<&str> {
        self.sheet.as_deref()
    }

    fn input_column(&self) -> &str {
        &self.column
    }

    fn output_column(&self) -> &str {
        &self.output_column
    }

    fn output_suffix(&self) -> &str {
        &self.suffix
    }

    fn output_format(&self) -> TableFormat {
        self.format
    }

    fn output_dir(&self) -> Option<&str> {
        self.output_dir.as_deref()
    }

    fn invalid_row_policy(&self) -> InvalidRowPolicy {
        self.on_invalid_row
    }

    fn bundle(&self) -> bool {
        self.bundle
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("input", &self.input)?;
        validation::validate_table_extension("input", &self.input)?;
        validation::validate_non_empty_string("column", &self.column)?;
        validation::validate_non_empty_string("output_column", &self.output_column)?;
        validation::validate_suffix("suffix", &self.suffix)?;
        if let Some(dir) = &self.output_dir {
            validation::validate_path("output_dir", dir)?;
        }
        Ok(())
    }
}
