use clap::Parser;
use imei_etl::utils::error::ErrorSeverity;
use imei_etl::utils::{logger, validation::Validate};
use imei_etl::{CliConfig, EtlEngine, EtlError, ImeiPipeline, LocalStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    logger::init_logger(config.verbose, config.log_json);

    tracing::info!("Starting imei-etl");
    tracing::debug!("CLI config: {:?}", config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let verify = config.verify;
    let storage = LocalStorage::default();
    let pipeline = ImeiPipeline::new(storage, config);

    if verify {
        if let Err(e) = print_verification(&pipeline).await {
            fail(e);
        }
        return Ok(());
    }

    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Check digits recomputed");
            println!("✅ Check digits recomputed");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => fail(e),
    }

    Ok(())
}

async fn print_verification(
    pipeline: &ImeiPipeline<LocalStorage, CliConfig>,
) -> Result<(), EtlError> {
    let checks = pipeline.verify().await?;
    for check in &checks {
        let mark = if check.valid { "✅" } else { "❌" };
        println!("{} row {}: {}", mark, check.row, check.value);
    }
    let valid = checks.iter().filter(|c| c.valid).count();
    println!("{} of {} rows carry a valid check digit", valid, checks.len());
    Ok(())
}

fn fail(e: EtlError) {
    tracing::error!(
        "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

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
