#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;

pub const DEFAULT_INPUT_COLUMN: &str = "IMEI";
pub const DEFAULT_OUTPUT_COLUMN: &str = "IMEI_Calculado";
pub const DEFAULT_SUFFIX: &str = "_calculado";
