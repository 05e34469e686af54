use anyhow::Context;
use clap::Parser;
use imei_etl::core::Pipeline;
use imei_etl::domain::ports::ConfigProvider;
use imei_etl::utils::error::ErrorSeverity;
use imei_etl::utils::{logger, validation::Validate};
use imei_etl::{EtlEngine, ImeiPipeline, LocalStorage, TomlConfig};

#[derive(Parser)]
#[command(name = "toml-etl")]
#[command(about = "IMEI check-digit ETL driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "imei-etl.toml")]
    config: String,

    /// Input file, overriding source.path
    #[arg(short, long)]
    input: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Read and check the input without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Only report which rows already carry a valid check digit
    #[arg(long)]
    verify: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config file '{}'", args.config))?;

    logger::init_logger(args.verbose || config.verbose(), args.log_json);

    tracing::info!("📁 Loaded configuration from: {}", args.config);

    if let Some(input) = args.input.clone() {
        tracing::info!("🔧 Input overridden to: {}", input);
        config = config.with_input(input);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    display_config_summary(&config);

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    let pipeline = ImeiPipeline::new(LocalStorage::default(), config);

    if args.verify {
        let checks = pipeline.verify().await?;
        for check in &checks {
            let mark = if check.valid { "✅" } else { "❌" };
            println!("{} row {}: {}", mark, check.row, check.value);
        }
        let valid = checks.iter().filter(|c| c.valid).count();
        println!("{} of {} rows carry a valid check digit", valid, checks.len());
        return Ok(());
    }

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be written");
        return perform_dry_run(&pipeline).await;
    }

    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            println!("✅ Check digits recomputed");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig) {
    tracing::info!("📋 Pipeline: {}", config.pipeline.name);
    if let Some(description) = &config.pipeline.description {
        tracing::info!("   {}", description);
    }
    tracing::info!(
        "📥 Source: {} (column '{}', sheet {})",
        config.input_path(),
        config.input_column(),
        config.sheet_name().unwrap_or("<first>")
    );
    tracing::info!(
        "📤 Output: column '{}' as {}, suffix '{}'{}",
        config.output_column(),
        config.output_format(),
        config.output_suffix(),
        if config.bundle() { ", bundled" } else { "" }
    );
    tracing::info!("⚠️  Invalid rows: {:?}", config.invalid_row_policy());
}

async fn perform_dry_run(pipeline: &ImeiPipeline<LocalStorage, TomlConfig>) -> anyhow::Result<()> {
    let paths = pipeline.output_paths()?;
    let records = pipeline.extract().await?;
    let result = pipeline.transform(records).await?;

    println!("Rows read:        {}", result.total_rows);
    println!("Would correct:    {}", result.corrected.len());
    println!("Already valid:    {}", result.unchanged_rows);
    println!("Would reject:     {}", result.failed.len());
    for failed in &result.failed {
        println!("  row {}: {}", failed.row, failed.reason);
    }
    if pipeline.config().bundle() {
        println!("Would write:      {}", paths.bundle.display());
    } else {
        println!("Would write:      {}", paths.primary.display());
    }
    Ok(())
}
