use thiserror::Error;

/// Why an identifier could not be turned into a body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidIdentifier {
    #[error("identifier '{value}' has {actual} characters, at least {expected} required")]
    TooShort {
        value: String,
        expected: usize,
        actual: usize,
    },

    #[error("identifier body '{value}' has {actual} characters, exactly {expected} required")]
    WrongLength {
        value: String,
        expected: usize,
        actual: usize,
    },

    #[error("identifier '{value}' has non-digit character '{found}' at position {position}")]
    NonDigit {
        value: String,
        position: usize,
        found: char,
    },
}

impl InvalidIdentifier {
    /// The raw value that was rejected.
    pub fn value(&self) -> &str {
        match self {
            Self::TooShort { value, .. }
            | Self::WrongLength { value, .. }
            | Self::NonDigit { value, .. } => value,
        }
    }

    pub(crate) fn with_value(mut self, raw: &str) -> Self {
        match &mut self {
            Self::TooShort { value, .. }
            | Self::WrongLength { value, .. }
            | Self::NonDigit { value, .. } => *value = raw.to_string(),
        }
        self
    }
}

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Invalid identifier at row {row}: {source}")]
    InvalidInput {
        row: usize,
        #[source]
        source: InvalidIdentifier,
    },

    #[error("Source unavailable: {path}: {message}")]
    SourceUnavailable { path: String, message: String },

    #[error("Source format error: {message}")]
    SourceFormat { message: String },

    #[error("Failed to write {path}: {message}")]
    DestinationWrite { path: String, message: String },

    #[error("Spreadsheet error: {message}")]
    SpreadsheetError { message: String },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Source,
    Destination,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::InvalidInput { .. } => ErrorCategory::Input,
            EtlError::SourceUnavailable { .. }
            | EtlError::SourceFormat { .. }
            | EtlError::CsvError(_) => ErrorCategory::Source,
            EtlError::DestinationWrite { .. } | EtlError::ZipError(_) => {
                ErrorCategory::Destination
            }
            EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::SpreadsheetError { .. }
            | EtlError::IoError(_)
            | EtlError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Medium,
            ErrorCategory::Source | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Destination | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::InvalidInput { row, .. } => format!(
                "Fix the identifier on row {} or rerun with --on-invalid-row skip",
                row
            ),
            EtlError::SourceUnavailable { path, .. } => {
                format!("Check that '{}' exists and is readable", path)
            }
            EtlError::SourceFormat { .. } | EtlError::CsvError(_) => {
                "Make sure the file is a valid .xlsx or .csv with a header row containing the identifier column".to_string()
            }
            EtlError::DestinationWrite { path, .. } => {
                format!("Check that the directory for '{}' is writable and the file is not open elsewhere", path)
            }
            EtlError::ZipError(_) => "Retry without --bundle".to_string(),
            EtlError::ConfigValidationError { field, .. }
            | EtlError::InvalidConfigValueError { field, .. }
            | EtlError::MissingConfigError { field } => {
                format!("Review the '{}' setting", field)
            }
            EtlError::SpreadsheetError { .. } => {
                "Retry with --format csv to bypass the spreadsheet encoder".to_string()
            }
            EtlError::IoError(_) | EtlError::SerializationError(_) => {
                "Check disk space and permissions, then retry".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::InvalidInput { row, source } => {
                format!("Row {} holds an invalid identifier: {}", row, source)
            }
            EtlError::SourceUnavailable { path, .. } => {
                format!("Input file not found or unreadable: {}", path)
            }
            EtlError::SourceFormat { message } => format!("Could not read input: {}", message),
            EtlError::DestinationWrite { path, .. } => format!("Could not save output to {}", path),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
