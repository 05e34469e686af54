pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::storage::LocalStorage;
pub use config::toml_config::TomlConfig;
pub use core::luhn::{apply_batch, compute_check_digit, correct_identifier};
pub use core::{etl::EtlEngine, pipeline::ImeiPipeline};
pub use domain::model::{BatchResult, CheckDigit, CorrectedIdentifier, IdentifierBody};
pub use utils::error::{EtlError, InvalidIdentifier, Result};
