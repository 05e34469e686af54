use super::{DEFAULT_INPUT_COLUMN, DEFAULT_OUTPUT_COLUMN, DEFAULT_SUFFIX};
use crate::domain::ports::{ConfigProvider, InvalidRowPolicy, TableFormat};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
    pub error_handling: Option<ErrorHandlingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// May be left out and supplied on the command line instead.
    pub path: Option<String>,
    pub column: Option<String>,
    pub sheet: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_column: Option<String>,
    pub suffix: Option<String>,
    pub format: Option<TableFormat>,
    pub output_dir: Option<String>,
    pub bundle: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    pub on_invalid_row: Option<InvalidRowPolicy>,
}

fn env_var_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static pattern is valid")
    })
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unknown variables are left as written.
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    /// Sets the input path, taking precedence over `source.path`.
    pub fn with_input(mut self, path: impl Into<String>) -> Self {
        self.source.path = Some(path.into());
        self
    }

    pub fn validate_config(&self) -> Result<()> {
        let input = validation::validate_required_field("source.path", &self.source.path)?;
        validation::validate_path("source.path", input)?;
        validation::validate_table_extension("source.path", input)?;
        validation::validate_non_empty_string("source.column", self.input_column())?;
        validation::validate_non_empty_string("load.output_column", self.output_column())?;
        validation::validate_suffix("load.suffix", self.output_suffix())?;
        if let Some(dir) = &self.load.output_dir {
            validation::validate_path("load.output_dir", dir)?;
        }
        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    /// `monitoring.log_level == "debug"` turns on verbose logging.
    pub fn verbose(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.log_level.as_deref())
            .map(|level| level.eq_ignore_ascii_case("debug") || level.eq_ignore_ascii_case("trace"))
            .unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn input_path(&self) -> &str {
        self.source.path.as_deref().unwrap_or_default()
    }

    fn sheet_name(&self) -> Option<&str> {
        self.source.sheet.as_deref()
    }

    fn input_column(&self) -> &str {
        self.source.column.as_deref().unwrap_or(DEFAULT_INPUT_COLUMN)
    }

    fn output_column(&self) -> &str {
        self.load
            .output_column
            .as_deref()
            .unwrap_or(DEFAULT_OUTPUT_COLUMN)
    }

    fn output_suffix(&self) -> &str {
        self.load.suffix.as_deref().unwrap_or(DEFAULT_SUFFIX)
    }

    fn output_format(&self) -> TableFormat {
        self.load.format.unwrap_or(TableFormat::Xlsx)
    }

    fn output_dir(&self) -> Option<&str> {
        self.load.output_dir.as_deref()
    }

    fn invalid_row_policy(&self) -> InvalidRowPolicy {
        self.error_handling
            .as_ref()
            .and_then(|e| e.on_invalid_row)
            .unwrap_or_default()
    }

    fn bundle(&self) -> bool {
        self.load.bundle.unwrap_or(false)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
